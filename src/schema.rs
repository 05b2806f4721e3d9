//! Declarative parameter schemas and the validator that checks a parameter
//! map against them.
//!
//! Validation is a pure function of the schema and the map: it performs no
//! I/O, never mutates its input and always gives the same answer for the same
//! input. A JSON `null` is treated the same as an absent key.

use crate::error::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Parameters of a single function call, keyed by parameter name.
pub type Parameters = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Object => "an object",
            Self::Array => "an array",
        };
        f.write_str(name)
    }
}

/// One accepted input of a function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Members of an `object` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, FunctionParameter>>,
    /// Element shape of an `array` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FunctionParameter>>,
}

impl FunctionParameter {
    pub fn new(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required,
            default: None,
            enum_values: Vec::new(),
            pattern: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            properties: None,
            items: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, ParameterType::String, description, required)
    }

    /// A string restricted to `allowed`.
    pub fn string_enum<I, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
        allowed: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut param = Self::string(name, description, required);
        param.enum_values = allowed.into_iter().map(Into::into).collect();
        param
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, ParameterType::Number, description, required)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, ParameterType::Integer, description, required)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, ParameterType::Boolean, description, required)
    }

    pub fn object(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, ParameterType::Object, description, required)
    }

    pub fn array(
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
        items: FunctionParameter,
    ) -> Self {
        Self::new(name, ParameterType::Array, description, required).with_items(items)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_length(mut self, min_length: Option<usize>, max_length: Option<usize>) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_property(mut self, property: FunctionParameter) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(property.name.clone(), property);
        self
    }

    pub fn with_properties(self, properties: impl IntoIterator<Item = FunctionParameter>) -> Self {
        properties.into_iter().fold(self, Self::with_property)
    }

    pub fn with_items(mut self, items: FunctionParameter) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    /// Describes the first structural inconsistency in this parameter, if any:
    /// `enum` or `pattern` on a non-string, `properties` on a non-object,
    /// `items` on a non-array, or a `pattern` that is not a valid regex.
    pub fn shape_error(&self) -> Option<String> {
        if !self.enum_values.is_empty() && self.param_type != ParameterType::String {
            return Some(format!("parameter '{}': enum is only allowed on strings", self.name));
        }
        if self.properties.is_some() && self.param_type != ParameterType::Object {
            return Some(format!(
                "parameter '{}': properties are only allowed on objects",
                self.name
            ));
        }
        if self.items.is_some() && self.param_type != ParameterType::Array {
            return Some(format!("parameter '{}': items are only allowed on arrays", self.name));
        }
        if let Some(pattern) = &self.pattern {
            if self.param_type != ParameterType::String {
                return Some(format!("parameter '{}': pattern is only allowed on strings", self.name));
            }
            if let Err(e) = Regex::new(pattern) {
                return Some(format!("parameter '{}': invalid pattern: {}", self.name, e));
            }
        }
        if let Some(properties) = &self.properties {
            if let Some(err) = properties.values().find_map(FunctionParameter::shape_error) {
                return Some(err);
            }
        }
        self.items.as_ref().and_then(|items| items.shape_error())
    }

    /// Checks one present, non-null value. `path` names the value in errors.
    fn validate_value(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        self.validate_type(path, value)?;

        match value {
            Value::String(s) => self.validate_string(path, s),
            Value::Number(n) => self.validate_range(path, n.as_f64().unwrap_or(f64::NAN)),
            Value::Object(members) => match &self.properties {
                Some(properties) => validate_members(properties.values(), members, Some(path)),
                None => Ok(()),
            },
            Value::Array(elements) => match &self.items {
                Some(items) => elements
                    .iter()
                    .enumerate()
                    .filter(|(_, element)| !element.is_null())
                    .try_for_each(|(i, element)| {
                        items.validate_value(&format!("{path}[{i}]"), element)
                    }),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn validate_type(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        let matches = match self.param_type {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Object => value.is_object(),
            ParameterType::Array => value.is_array(),
        };
        if matches {
            Ok(())
        } else {
            Err(ValidationError::TypeMismatch {
                parameter: path.to_string(),
                expected: self.param_type,
                actual: json_type_name(value),
            })
        }
    }

    fn validate_string(&self, path: &str, s: &str) -> Result<(), ValidationError> {
        if !self.enum_values.is_empty() && !self.enum_values.iter().any(|allowed| allowed == s) {
            return Err(ValidationError::NotInEnum {
                parameter: path.to_string(),
                allowed: self.enum_values.clone(),
            });
        }

        let length = s.chars().count();
        if let Some(min_length) = self.min_length.filter(|min| length < *min) {
            return Err(ValidationError::TooShort {
                parameter: path.to_string(),
                min_length,
            });
        }
        if let Some(max_length) = self.max_length.filter(|max| length > *max) {
            return Err(ValidationError::TooLong {
                parameter: path.to_string(),
                max_length,
            });
        }

        if let Some(pattern) = &self.pattern {
            let regex = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
                parameter: path.to_string(),
                message: e.to_string(),
            })?;
            if !regex.is_match(s) {
                return Err(ValidationError::PatternMismatch {
                    parameter: path.to_string(),
                    pattern: pattern.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_range(&self, path: &str, n: f64) -> Result<(), ValidationError> {
        if let Some(minimum) = self.minimum.filter(|min| n < *min) {
            return Err(ValidationError::BelowMinimum {
                parameter: path.to_string(),
                minimum,
            });
        }
        if let Some(maximum) = self.maximum.filter(|max| n > *max) {
            return Err(ValidationError::AboveMaximum {
                parameter: path.to_string(),
                maximum,
            });
        }
        Ok(())
    }
}

fn validate_members<'a>(
    declared: impl IntoIterator<Item = &'a FunctionParameter>,
    members: &Parameters,
    parent: Option<&str>,
) -> Result<(), ValidationError> {
    for param in declared {
        let path = match parent {
            Some(parent) => format!("{parent}.{}", param.name),
            None => param.name.clone(),
        };
        match members.get(&param.name).filter(|value| !value.is_null()) {
            Some(value) => param.validate_value(&path, value)?,
            None if param.required => return Err(ValidationError::Missing { parameter: path }),
            None => {}
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A documented input/output pair. Never enforced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionExample {
    pub description: String,
    pub parameters: Parameters,
    pub expected: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<FunctionParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<FunctionExample>,
}

impl FunctionSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<FunctionParameter>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            examples: Vec::new(),
        }
    }

    pub fn with_example(
        mut self,
        description: impl Into<String>,
        parameters: Value,
        expected: impl Into<String>,
    ) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Parameters::new(),
        };
        self.examples.push(FunctionExample {
            description: description.into(),
            parameters,
            expected: expected.into(),
        });
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&FunctionParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Checks `params` against every declared parameter, in declaration
    /// order, and reports the first violation.
    pub fn validate(&self, params: &Parameters) -> Result<(), ValidationError> {
        validate_members(&self.parameters, params, None)
    }

    /// The caller's value for `name`, or the declared default when the caller
    /// left it out.
    pub fn param_or_default<'a>(&'a self, params: &'a Parameters, name: &str) -> Option<&'a Value> {
        params
            .get(name)
            .filter(|value| !value.is_null())
            .or_else(|| self.parameter(name).and_then(|p| p.default.as_ref()))
    }

    /// Describes the first structural problem: a duplicate parameter name or
    /// an ill-formed parameter.
    pub fn shape_error(&self) -> Option<String> {
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Some(format!("duplicate parameter '{}'", param.name));
            }
            if let Some(err) = param.shape_error() {
                return Some(err);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => panic!("test parameters must be an object"),
        }
    }

    fn build_schema() -> FunctionSchema {
        FunctionSchema::new(
            "build",
            "Build a configuration",
            vec![
                FunctionParameter::string_enum("operation", "What to do", true, ["switch", "boot", "test"]),
                FunctionParameter::integer("jobs", "Parallel jobs", false).with_range(Some(1.0), Some(64.0)),
                FunctionParameter::boolean("dry_run", "Only print", false).with_default(false),
                FunctionParameter::string("host", "Target host", false)
                    .with_pattern(r"^[a-z][a-z0-9-]*$")
                    .with_length(Some(2), Some(16)),
                FunctionParameter::object("options", "Extra options", false).with_properties([
                    FunctionParameter::string("profile", "Profile name", true),
                    FunctionParameter::number("cores", "Cores", false).with_range(Some(0.5), None),
                ]),
                FunctionParameter::array(
                    "targets",
                    "Flake targets",
                    false,
                    FunctionParameter::string("target", "A target", false),
                ),
            ],
        )
    }

    #[test]
    fn test_valid_parameters_pass() {
        let schema = build_schema();
        let result = schema.validate(&params(json!({
            "operation": "switch",
            "jobs": 4,
            "dry_run": true,
            "host": "laptop",
            "options": {"profile": "system", "cores": 2},
            "targets": [".#laptop", ".#server"]
        })));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_missing_required_names_parameter() {
        let err = build_schema().validate(&Parameters::new()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Missing {
                parameter: "operation".into()
            }
        );
        assert!(err.to_string().contains("operation"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = build_schema()
            .validate(&params(json!({"operation": null})))
            .unwrap_err();
        assert!(matches!(err, ValidationError::Missing { .. }));
    }

    #[test]
    fn test_type_mismatch_reports_expected_and_actual() {
        let err = build_schema()
            .validate(&params(json!({"operation": "switch", "dry_run": "yes"})))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'dry_run' must be a boolean, got string"
        );
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let err = build_schema()
            .validate(&params(json!({"operation": "switch", "jobs": 2.5})))
            .unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { expected: ParameterType::Integer, .. }));
    }

    #[test]
    fn test_enum_violation_lists_allowed_values() {
        let err = build_schema()
            .validate(&params(json!({"operation": "delete"})))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'operation' must be one of: switch, boot, test"
        );
    }

    #[test]
    fn test_range_violations() {
        let schema = build_schema();
        let low = schema
            .validate(&params(json!({"operation": "boot", "jobs": 0})))
            .unwrap_err();
        assert_eq!(
            low,
            ValidationError::BelowMinimum {
                parameter: "jobs".into(),
                minimum: 1.0
            }
        );
        let high = schema
            .validate(&params(json!({"operation": "boot", "jobs": 65})))
            .unwrap_err();
        assert!(matches!(high, ValidationError::AboveMaximum { .. }));
    }

    #[test]
    fn test_string_length_and_pattern() {
        let schema = build_schema();
        let short = schema
            .validate(&params(json!({"operation": "test", "host": "a"})))
            .unwrap_err();
        assert!(matches!(short, ValidationError::TooShort { min_length: 2, .. }));

        let bad = schema
            .validate(&params(json!({"operation": "test", "host": "Laptop"})))
            .unwrap_err();
        assert!(matches!(bad, ValidationError::PatternMismatch { .. }));
    }

    #[test]
    fn test_invalid_pattern_is_reported_not_panicked() {
        let schema = FunctionSchema::new(
            "broken",
            "",
            vec![FunctionParameter::string("name", "", true).with_pattern("(unclosed")],
        );
        let err = schema.validate(&params(json!({"name": "x"}))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPattern { .. }));
    }

    #[test]
    fn test_nested_object_is_validated_recursively() {
        let schema = build_schema();
        let missing = schema
            .validate(&params(json!({"operation": "switch", "options": {}})))
            .unwrap_err();
        assert_eq!(missing.parameter(), "options.profile");

        let low = schema
            .validate(&params(json!({
                "operation": "switch",
                "options": {"profile": "p", "cores": 0.1}
            })))
            .unwrap_err();
        assert_eq!(low.parameter(), "options.cores");
    }

    #[test]
    fn test_array_items_are_validated_with_index() {
        let err = build_schema()
            .validate(&params(json!({"operation": "switch", "targets": ["ok", 3]})))
            .unwrap_err();
        assert_eq!(err.parameter(), "targets[1]");
    }

    #[test]
    fn test_validation_does_not_mutate_input() {
        let input = params(json!({"operation": "switch"}));
        let before = input.clone();
        let schema = build_schema();
        assert_eq!(schema.validate(&input), schema.validate(&input));
        assert_eq!(input, before);
    }

    #[test]
    fn test_param_or_default() {
        let schema = build_schema();
        let input = params(json!({"operation": "switch"}));
        assert_eq!(schema.param_or_default(&input, "dry_run"), Some(&json!(false)));
        assert_eq!(schema.param_or_default(&input, "operation"), Some(&json!("switch")));
        assert_eq!(schema.param_or_default(&input, "host"), None);
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(build_schema().shape_error(), None);

        let mut enum_on_number = FunctionParameter::number("n", "", false);
        enum_on_number.enum_values = vec!["1".into()];
        assert!(enum_on_number.shape_error().is_some());

        let items_on_string =
            FunctionParameter::string("s", "", false).with_items(FunctionParameter::string("x", "", false));
        assert!(items_on_string.shape_error().is_some());

        let bad_pattern = FunctionParameter::string("host", "", false).with_pattern("(unclosed");
        assert!(bad_pattern.shape_error().unwrap().contains("invalid pattern"));

        let pattern_on_number = FunctionParameter::number("n", "", false).with_pattern("^1$");
        assert!(pattern_on_number.shape_error().is_some());

        let duplicate = FunctionSchema::new(
            "dup",
            "",
            vec![
                FunctionParameter::string("a", "", false),
                FunctionParameter::string("a", "", false),
            ],
        );
        assert_eq!(duplicate.shape_error(), Some("duplicate parameter 'a'".into()));
    }

    #[test]
    fn test_schema_serializes_with_json_schema_names() {
        let param = FunctionParameter::string_enum("category", "Category", false, ["nix"])
            .with_length(None, Some(10));
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["enum"], json!(["nix"]));
        assert_eq!(json["maxLength"], 10);
        assert!(json.get("items").is_none());
    }
}
