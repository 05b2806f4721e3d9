//! The contract every pluggable unit of work implements, plus the call and
//! option values the engine hands to it.

use crate::context::Context;
use crate::error::{ExecutionError, ValidationError};
use crate::provider::AiProvider;
use crate::result::{FunctionResult, Progress, ProgressCallback};
use crate::schema::{FunctionSchema, Parameters};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Timeout applied when a caller passes no options at all.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A named, schema-described unit of work.
///
/// Implementations report domain failures (bad input the caller can act on,
/// an unsupported operation, a downstream tool that failed) as
/// `Ok(FunctionResult::failure(..))`. The `Err` channel is for failures of
/// the execution itself, most notably the context being cancelled or timing
/// out.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use nixai::context::Context;
/// use nixai::error::ExecutionError;
/// use nixai::function::{Function, FunctionOptions};
/// use nixai::result::FunctionResult;
/// use nixai::schema::{FunctionParameter, FunctionSchema, Parameters};
///
/// struct Echo {
///     schema: FunctionSchema,
/// }
///
/// #[async_trait]
/// impl Function for Echo {
///     fn schema(&self) -> &FunctionSchema {
///         &self.schema
///     }
///
///     async fn execute(
///         &self,
///         _ctx: &Context,
///         params: &Parameters,
///         _options: &FunctionOptions,
///     ) -> Result<FunctionResult, ExecutionError> {
///         Ok(FunctionResult::success(params["text"].clone()))
///     }
/// }
///
/// let echo = Echo {
///     schema: FunctionSchema::new(
///         "echo",
///         "Echo the input",
///         vec![FunctionParameter::string("text", "Text to echo", true)],
///     ),
/// };
/// assert_eq!(echo.name(), "echo");
/// ```
#[async_trait]
pub trait Function: Send + Sync {
    fn schema(&self) -> &FunctionSchema;

    fn name(&self) -> &str {
        &self.schema().name
    }

    fn description(&self) -> &str {
        &self.schema().description
    }

    /// Must stay free of I/O and side effects; the engine may call it more
    /// than once per call.
    fn validate_parameters(&self, params: &Parameters) -> Result<(), ValidationError> {
        self.schema().validate(params)
    }

    async fn execute(
        &self,
        ctx: &Context,
        params: &Parameters,
        options: &FunctionOptions,
    ) -> Result<FunctionResult, ExecutionError>;
}

/// A request to run one function. Immutable once built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    name: String,
    parameters: Parameters,
    #[serde(skip)]
    context: Option<Context>,
    timestamp: DateTime<Utc>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
            context: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(ctx: Context, name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            context: Some(ctx),
            ..Self::new(name, parameters)
        }
    }

    /// Builds a call from a JSON object; anything else yields empty parameters.
    pub fn from_json(name: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Parameters::new(),
        };
        Self::new(name, parameters)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Per-call options threaded through to the function body.
#[derive(Clone)]
pub struct FunctionOptions {
    /// `Duration::ZERO` disables the deadline.
    pub timeout: Duration,
    /// Advisory only; the engine always runs the body on the caller's task.
    pub asynchronous: bool,
    pub progress: Option<ProgressCallback>,
    pub provider: Option<Arc<dyn AiProvider>>,
    pub metadata: serde_json::Map<String, Value>,
}

impl FunctionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Forwards `progress` to the installed callback, if any.
    pub fn report(&self, progress: Progress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

impl Default for FunctionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            asynchronous: false,
            progress: None,
            provider: None,
            metadata: serde_json::Map::new(),
        }
    }
}

impl fmt::Debug for FunctionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionOptions")
            .field("timeout", &self.timeout)
            .field("asynchronous", &self.asynchronous)
            .field("progress", &self.progress.is_some())
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("metadata", &self.metadata)
            .finish()
    }
}
