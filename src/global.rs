//! Process-wide registry for default command-line wiring.
//!
//! The shared [`Registry`] is created on first access, exactly once. Library
//! code should take a `&Registry` instead of reaching for these wrappers so
//! it stays testable without shared state.

use crate::context::Context;
use crate::error::{ExecutionFailure, FunctionError};
use crate::function::{Function, FunctionCall, FunctionOptions};
use crate::registry::Registry;
use crate::result::FunctionResult;
use crate::schema::FunctionSchema;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    GLOBAL_REGISTRY.get_or_init(|| {
        debug!("Initializing global function registry");
        Registry::new()
    })
}

pub fn register_global<F>(function: F) -> Result<(), FunctionError>
where
    F: Function + 'static,
{
    registry().register(function)
}

pub fn get_global(name: &str) -> Option<Arc<dyn Function>> {
    registry().get(name)
}

pub fn list_global() -> Vec<String> {
    registry().list()
}

pub fn function_exists(name: &str) -> bool {
    registry().has_function(name)
}

pub fn function_schema(name: &str) -> Result<FunctionSchema, FunctionError> {
    registry().schema(name)
}

pub fn all_function_schemas() -> BTreeMap<String, FunctionSchema> {
    registry().schemas()
}

pub fn list_available_functions() -> BTreeMap<String, String> {
    registry().list_available_functions()
}

pub fn validate_function(call: &FunctionCall) -> Result<(), FunctionError> {
    registry().validate_call(call)
}

pub async fn execute_global(
    ctx: &Context,
    call: &FunctionCall,
    options: Option<FunctionOptions>,
) -> Result<FunctionResult, ExecutionFailure> {
    registry().execute(ctx, call, options).await
}

/// Runs `call` under the context it carries, or a background context when it
/// carries none.
pub async fn execute_function(
    call: &FunctionCall,
    options: Option<FunctionOptions>,
) -> Result<FunctionResult, ExecutionFailure> {
    let ctx = call.context().cloned().unwrap_or_default();
    registry().execute(&ctx, call, options).await
}
