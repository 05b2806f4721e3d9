//! nixai - function dispatch and execution for a NixOS assistant.
//!
//! This library provides a registry of named, schema-described functions and
//! an engine that runs them under explicit timeout, cancellation and progress
//! reporting, always producing a structured [`result::FunctionResult`].
//!
//! # Architecture
//!
//! - [`schema`] - Parameter and function schemas, and parameter validation
//! - [`function`] - The `Function` trait, calls and per-call options
//! - [`result`] - Function results and progress events
//! - [`context`] - Cancellation and deadline propagation
//! - [`registry`] - Thread-safe catalog of functions by name
//! - [`engine`] - Executes one call against a registry
//! - [`global`] - Process-wide registry and convenience wrappers
//! - [`error`] - Error types and their classification
//! - [`provider`] - AI provider capability (Claude, mock)
//! - [`executor`] - External process execution
//! - [`functions`] - Built-in `ask` and `nix` functions
//! - [`config`] - Configuration management (API keys, timeouts)
//!
//! # Example
//!
//! ```
//! use nixai::context::Context;
//! use nixai::function::{FunctionCall, FunctionOptions};
//! use nixai::functions;
//! use nixai::provider::MockProvider;
//! use nixai::registry::Registry;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Registry::new();
//! functions::register_all(&registry);
//!
//! let call = FunctionCall::from_json("ask", json!({"question": "How do I enable SSH?"}));
//! let options = FunctionOptions::new().with_provider(Arc::new(MockProvider::new()));
//! let result = registry
//!     .execute(&Context::background(), &call, Some(options))
//!     .await
//!     .unwrap();
//!
//! assert!(result.is_success());
//! # }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod function;
pub mod functions;
pub mod global;
pub mod provider;
pub mod registry;
pub mod result;
pub mod schema;

pub use result::to_json;
