//! Thread-safe catalog of functions keyed by unique name.
//!
//! Registration churn (`register`, `unregister`, `clear`) takes the write
//! lock; every read (`get`, `list`, `count`, `schema`, `schemas`) takes the
//! shared lock, so concurrent lookups never serialize against each other.
//! Execution lives in [`crate::engine`].

use crate::error::FunctionError;
use crate::function::Function;
use crate::schema::FunctionSchema;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct Registry {
    functions: RwLock<HashMap<String, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, function: F) -> Result<(), FunctionError>
    where
        F: Function + 'static,
    {
        self.register_arc(Arc::new(function))
    }

    /// Adds `function` under its own name. Never overwrites an existing entry.
    pub fn register_arc(&self, function: Arc<dyn Function>) -> Result<(), FunctionError> {
        let name = function.name().to_string();
        if name.is_empty() {
            return Err(FunctionError::EmptyName);
        }
        if let Some(reason) = function.schema().shape_error() {
            return Err(FunctionError::InvalidSchema { name, reason });
        }

        let mut functions = self.functions.write();
        if functions.contains_key(&name) {
            return Err(FunctionError::AlreadyRegistered(name));
        }
        functions.insert(name.clone(), function);
        drop(functions);

        info!("Registered function: {}", name);
        Ok(())
    }

    /// Registers each function in turn and collects the failures.
    pub fn register_multiple<I>(&self, functions: I) -> Vec<FunctionError>
    where
        I: IntoIterator<Item = Arc<dyn Function>>,
    {
        functions
            .into_iter()
            .filter_map(|function| self.register_arc(function).err())
            .collect()
    }

    pub fn unregister(&self, name: &str) -> Result<(), FunctionError> {
        if self.functions.write().remove(name).is_none() {
            return Err(FunctionError::NotRegistered(name.to_string()));
        }
        info!("Unregistered function: {}", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.read().get(name).cloned()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.functions.read().len()
    }

    pub fn schema(&self, name: &str) -> Result<FunctionSchema, FunctionError> {
        self.functions
            .read()
            .get(name)
            .map(|function| function.schema().clone())
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))
    }

    pub fn schemas(&self) -> BTreeMap<String, FunctionSchema> {
        self.functions
            .read()
            .iter()
            .map(|(name, function)| (name.clone(), function.schema().clone()))
            .collect()
    }

    /// Name to description, for help listings.
    pub fn list_available_functions(&self) -> BTreeMap<String, String> {
        self.functions
            .read()
            .iter()
            .map(|(name, function)| (name.clone(), function.description().to_string()))
            .collect()
    }

    /// Name, description, parameters and examples of one function as JSON.
    pub fn function_info(&self, name: &str) -> Result<Value, FunctionError> {
        let function = self
            .get(name)
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))?;
        let schema = function.schema();
        Ok(json!({
            "name": function.name(),
            "description": function.description(),
            "parameters": schema.parameters,
            "examples": schema.examples,
        }))
    }

    /// Drops every entry and returns how many there were.
    pub fn clear(&self) -> usize {
        let count = {
            let mut functions = self.functions.write();
            let count = functions.len();
            functions.clear();
            count
        };
        info!("Cleared {} functions from registry", count);
        count
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("functions", &self.list()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::{ErrorKind, ExecutionError};
    use crate::function::FunctionOptions;
    use crate::result::FunctionResult;
    use crate::schema::{FunctionParameter, Parameters};
    use async_trait::async_trait;

    struct Stub {
        schema: FunctionSchema,
        tag: &'static str,
    }

    impl Stub {
        fn new(name: &str, tag: &'static str) -> Self {
            Self {
                schema: FunctionSchema::new(name, format!("{} function", name), vec![]),
                tag,
            }
        }
    }

    #[async_trait]
    impl Function for Stub {
        fn schema(&self) -> &FunctionSchema {
            &self.schema
        }

        async fn execute(
            &self,
            _ctx: &Context,
            _params: &Parameters,
            _options: &FunctionOptions,
        ) -> Result<FunctionResult, ExecutionError> {
            Ok(FunctionResult::success(self.tag))
        }
    }

    #[test]
    fn test_register_then_get() {
        let registry = Registry::new();
        registry.register(Stub::new("ask", "first")).unwrap();

        let function = registry.get("ask").unwrap();
        assert_eq!(function.name(), "ask");
        assert!(registry.has_function("ask"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_duplicate_register_keeps_original() {
        let registry = Registry::new();
        registry.register(Stub::new("ask", "first")).unwrap();

        let err = registry.register(Stub::new("ask", "second")).unwrap_err();
        assert!(matches!(err, FunctionError::AlreadyRegistered(ref name) if name == "ask"));
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("ask").unwrap().description(), "ask function");
    }

    #[tokio::test]
    async fn test_duplicate_register_does_not_replace_behaviour() {
        let registry = Registry::new();
        registry.register(Stub::new("ask", "first")).unwrap();
        let _ = registry.register(Stub::new("ask", "second"));

        let function = registry.get("ask").unwrap();
        let result = function
            .execute(&Context::background(), &Parameters::new(), &FunctionOptions::default())
            .await
            .unwrap();
        assert_eq!(result.data().unwrap(), "first");
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry = Registry::new();
        let err = registry.register(Stub::new("", "x")).unwrap_err();
        assert!(matches!(err, FunctionError::EmptyName));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_ill_formed_schema_is_rejected() {
        let mut stub = Stub::new("broken", "x");
        let mut param = FunctionParameter::boolean("flag", "", false);
        param.enum_values = vec!["yes".into()];
        stub.schema.parameters.push(param);

        let err = Registry::new().register(stub).unwrap_err();
        assert!(matches!(err, FunctionError::InvalidSchema { .. }));
    }

    #[test]
    fn test_invalid_pattern_is_rejected_at_registration() {
        let mut stub = Stub::new("machines", "x");
        stub.schema
            .parameters
            .push(FunctionParameter::string("host", "", false).with_pattern("[a-z"));

        let registry = Registry::new();
        let err = registry.register(stub).unwrap_err();
        assert!(matches!(err, FunctionError::InvalidSchema { ref reason, .. } if reason.contains("invalid pattern")));
        assert!(!registry.has_function("machines"));
    }

    #[test]
    fn test_unregister_then_get_reports_not_found() {
        let registry = Registry::new();
        registry.register(Stub::new("logs", "x")).unwrap();
        registry.unregister("logs").unwrap();

        assert!(registry.get("logs").is_none());
        assert!(matches!(registry.schema("logs"), Err(FunctionError::NotFound(_))));
    }

    #[test]
    fn test_unregister_absent_name_fails() {
        let err = Registry::new().unregister("ghost").unwrap_err();
        assert!(matches!(err, FunctionError::NotRegistered(_)));
        assert_eq!(err.to_string(), "function 'ghost' not found");
    }

    #[test]
    fn test_list_is_sorted_and_schemas_match() {
        let registry = Registry::new();
        for name in ["machines", "ask", "logs"] {
            registry.register(Stub::new(name, "x")).unwrap();
        }

        assert_eq!(registry.list(), vec!["ask", "logs", "machines"]);
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 3);
        assert_eq!(schemas["logs"].name, "logs");
        assert_eq!(registry.schema("ask").unwrap().description, "ask function");
        assert_eq!(registry.list_available_functions()["machines"], "machines function");
    }

    #[test]
    fn test_function_info() {
        let registry = Registry::new();
        registry.register(Stub::new("ask", "x")).unwrap();

        let info = registry.function_info("ask").unwrap();
        assert_eq!(info["name"], "ask");
        assert_eq!(info["description"], "ask function");
        assert!(info["parameters"].as_array().unwrap().is_empty());
        assert!(registry.function_info("nope").is_err());
    }

    #[test]
    fn test_register_multiple_collects_errors() {
        let registry = Registry::new();
        let functions: Vec<Arc<dyn Function>> = vec![
            Arc::new(Stub::new("a", "x")),
            Arc::new(Stub::new("b", "x")),
            Arc::new(Stub::new("a", "y")),
        ];

        let errors = registry.register_multiple(functions);
        assert_eq!(errors.len(), 1);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_clear_returns_prior_count() {
        let registry = Registry::new();
        registry.register(Stub::new("a", "x")).unwrap();
        registry.register(Stub::new("b", "x")).unwrap();

        assert_eq!(registry.clear(), 2);
        assert_eq!(registry.count(), 0);
        assert!(registry.list().is_empty());
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_concurrent_registration_loses_nothing() {
        let registry = Registry::new();
        std::thread::scope(|scope| {
            for i in 0..32 {
                let registry = &registry;
                scope.spawn(move || {
                    registry.register(Stub::new(&format!("fn-{}", i), "x")).unwrap();
                });
            }
        });
        assert_eq!(registry.count(), 32);
    }
}
