//! Error types shared by the registry, the validator and the execution engine.
//!
//! Failures fall into four kinds (see [`ErrorKind`]). Registration, lookup and
//! validation failures happen before any function body runs; execution
//! failures come out of a function body, timeouts and cancellations included.

use crate::result::FunctionResult;
use crate::schema::ParameterType;
use thiserror::Error;

/// Coarse classification of a [`FunctionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Registration,
    Lookup,
    Validation,
    Execution,
}

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("function name cannot be empty")]
    EmptyName,
    #[error("function '{0}' already registered")]
    AlreadyRegistered(String),
    #[error("function '{name}' has an invalid schema: {reason}")]
    InvalidSchema { name: String, reason: String },
    /// Returned by `unregister` for a name that was never registered.
    #[error("function '{0}' not found")]
    NotRegistered(String),
    #[error("function '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl FunctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyName
            | Self::AlreadyRegistered(_)
            | Self::InvalidSchema { .. }
            | Self::NotRegistered(_) => ErrorKind::Registration,
            Self::NotFound(_) => ErrorKind::Lookup,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Execution(_) => ErrorKind::Execution,
        }
    }
}

/// A parameter map that does not satisfy a function's schema.
///
/// `parameter` is the dotted path of the offending value, e.g. `options.port`
/// or `targets[2]` for nested object and array members.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("required parameter '{parameter}' is missing")]
    Missing { parameter: String },
    #[error("parameter '{parameter}' must be {expected}, got {actual}")]
    TypeMismatch {
        parameter: String,
        expected: ParameterType,
        actual: &'static str,
    },
    #[error("parameter '{parameter}' must be one of: {}", .allowed.join(", "))]
    NotInEnum {
        parameter: String,
        allowed: Vec<String>,
    },
    #[error("parameter '{parameter}' must be at least {minimum}")]
    BelowMinimum { parameter: String, minimum: f64 },
    #[error("parameter '{parameter}' must be at most {maximum}")]
    AboveMaximum { parameter: String, maximum: f64 },
    #[error("parameter '{parameter}' must be at least {min_length} characters long")]
    TooShort { parameter: String, min_length: usize },
    #[error("parameter '{parameter}' must be at most {max_length} characters long")]
    TooLong { parameter: String, max_length: usize },
    #[error("parameter '{parameter}' does not match required pattern: {pattern}")]
    PatternMismatch { parameter: String, pattern: String },
    #[error("parameter '{parameter}' has invalid pattern: {message}")]
    InvalidPattern { parameter: String, message: String },
    /// Function-specific rule that the declarative schema cannot express.
    #[error("parameter '{parameter}': {message}")]
    Invalid { parameter: String, message: String },
}

impl ValidationError {
    pub fn parameter(&self) -> &str {
        match self {
            Self::Missing { parameter }
            | Self::TypeMismatch { parameter, .. }
            | Self::NotInEnum { parameter, .. }
            | Self::BelowMinimum { parameter, .. }
            | Self::AboveMaximum { parameter, .. }
            | Self::TooShort { parameter, .. }
            | Self::TooLong { parameter, .. }
            | Self::PatternMismatch { parameter, .. }
            | Self::InvalidPattern { parameter, .. }
            | Self::Invalid { parameter, .. } => parameter,
        }
    }
}

/// Why a [`Context`](crate::context::Context) is done.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// An error returned by a function body.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Context(ContextError::DeadlineExceeded))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Context(ContextError::Canceled))
    }
}

/// Returned by the engine when a function body fails.
///
/// Carries the unsuccessful [`FunctionResult`] (with its duration filled in)
/// alongside the error, so callers can render the result and still decide
/// on log severity from the error.
#[derive(Debug, Error)]
#[error("function '{name}' execution failed: {source}")]
pub struct ExecutionFailure {
    pub name: String,
    pub result: FunctionResult,
    #[source]
    pub source: ExecutionError,
}

impl ExecutionFailure {
    pub fn into_result(self) -> FunctionResult {
        self.result
    }
}
