//! Built-in functions shipped with the `nixai` binary.

mod ask;
mod nix;

pub use ask::AskFunction;
pub use nix::NixFunction;

use crate::error::FunctionError;
use crate::function::Function;
use crate::registry::Registry;
use std::sync::Arc;

pub fn builtin() -> Vec<Arc<dyn Function>> {
    vec![Arc::new(AskFunction::new()), Arc::new(NixFunction::new())]
}

/// Registers every built-in into `registry`, returning the ones that failed.
pub fn register_all(registry: &Registry) -> Vec<FunctionError> {
    registry.register_multiple(builtin())
}
