//! Typed input schemas for tools
//!
//! Every tool declares its arguments as a list of [`FieldSpec`]s. The same
//! declaration is used three ways:
//!
//! 1. Checked once at startup ([`InputSchema::check`]) so a broken table never
//!    serves traffic
//! 2. Rendered as JSON Schema for `tools/list` ([`InputSchema::to_json_schema`])
//! 3. Enforced on every call ([`InputSchema::validate`]), which also fills in
//!    defaults for omitted optional fields
//!
//! # Type Mapping
//!
//! | FieldType | JSON Schema Type | Accepted JSON values              |
//! |-----------|------------------|-----------------------------------|
//! | String    | "string"         | strings                           |
//! | Number    | "number"         | any finite number                 |
//! | Integer   | "integer"        | numbers without a fractional part |
//! | Boolean   | "boolean"        | `true` / `false`                  |
//!
//! A `null` value is treated the same as an omitted field. Fields that are not
//! declared are dropped rather than rejected.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Number, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
}

impl FieldType {
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }

    /// Check the value's type, returning it in canonical form.
    ///
    /// Integral floats such as `5.0` are accepted for integer fields and
    /// normalised to `5`.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) | (Self::Boolean, Value::Bool(_)) => {
                Some(value.clone())
            }
            (Self::Number, Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).map(|_| value.clone()),
            (Self::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    return Some(value.clone());
                }
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| Value::Number(Number::from(f as i64)))
            }
            _ => None,
        }
    }
}

/// Declaration of a single tool argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl FieldSpec {
    fn new(name: &'static str, description: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            description,
            field_type,
            required: true,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldType::String)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldType::Number)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldType::Integer)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldType::Boolean)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value applied when the caller omits the field. Implies optional.
    pub fn default_value(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    fn check_bounds(&self, value: &Value) -> Result<(), ValidationError> {
        let Some(n) = value.as_f64() else {
            return Ok(());
        };
        if let Some(minimum) = self.minimum {
            if n < minimum {
                return Err(ValidationError::BelowMinimum {
                    field: self.name.to_string(),
                    minimum,
                });
            }
        }
        if let Some(maximum) = self.maximum {
            if n > maximum {
                return Err(ValidationError::AboveMaximum {
                    field: self.name.to_string(),
                    maximum,
                });
            }
        }
        Ok(())
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.field_type.json_type()));
        schema.insert("description".to_string(), json!(self.description));
        if let Some(minimum) = self.minimum {
            schema.insert("minimum".to_string(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            schema.insert("maximum".to_string(), json!(maximum));
        }
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }
        Value::Object(schema)
    }
}

/// A call was rejected before reaching the handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be of type {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("field '{field}' must be >= {minimum}")]
    BelowMinimum { field: String, minimum: f64 },

    #[error("field '{field}' must be <= {maximum}")]
    AboveMaximum { field: String, maximum: f64 },
}

/// The schema declaration itself is inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("field '{0}' has minimum greater than maximum")]
    InvalidRange(String),

    #[error("bounds on non-numeric field '{0}'")]
    BoundsOnNonNumeric(String),

    #[error("default for field '{field}' is invalid: {reason}")]
    InvalidDefault { field: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Verify the declaration: unique names, sane bounds, defaults that would
    /// themselves pass validation.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name) {
                return Err(SchemaError::DuplicateField(field.name.to_string()));
            }

            let has_bounds = field.minimum.is_some() || field.maximum.is_some();
            if has_bounds && !field.field_type.is_numeric() {
                return Err(SchemaError::BoundsOnNonNumeric(field.name.to_string()));
            }
            if let (Some(min), Some(max)) = (field.minimum, field.maximum) {
                if min > max {
                    return Err(SchemaError::InvalidRange(field.name.to_string()));
                }
            }

            if let Some(default) = &field.default {
                let coerced = field.field_type.coerce(default).ok_or_else(|| {
                    SchemaError::InvalidDefault {
                        field: field.name.to_string(),
                        reason: format!("expected {}", field.field_type.json_type()),
                    }
                })?;
                field
                    .check_bounds(&coerced)
                    .map_err(|e| SchemaError::InvalidDefault {
                        field: field.name.to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    /// Validate raw call arguments and apply defaults.
    pub fn validate(&self, arguments: Option<&Value>) -> Result<ValidatedArgs, ValidationError> {
        let empty = Map::new();
        let raw = match arguments {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ValidationError::NotAnObject),
        };

        let mut validated = Map::new();
        for field in &self.fields {
            match raw.get(field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let value = field.field_type.coerce(value).ok_or_else(|| {
                        ValidationError::TypeMismatch {
                            field: field.name.to_string(),
                            expected: field.field_type.json_type(),
                        }
                    })?;
                    field.check_bounds(&value)?;
                    validated.insert(field.name.to_string(), value);
                }
                None if field.required => {
                    return Err(ValidationError::MissingField(field.name.to_string()));
                }
                None => {
                    if let Some(default) = &field.default {
                        validated.insert(field.name.to_string(), default.clone());
                    }
                }
            }
        }

        Ok(ValidatedArgs(validated))
    }

    pub fn to_json_schema(&self) -> Map<String, Value> {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), json!(required));
        schema
    }
}

/// Arguments that passed schema validation, with defaults applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Convert into the handler's typed argument struct.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| ToolError::Arguments(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_schema() -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::string("city_name", "City to look up"),
            FieldSpec::string("country", "Country filter").optional(),
            FieldSpec::integer("limit", "Maximum results")
                .range(1.0, 10.0)
                .default_value(json!(5)),
        ])
    }

    #[test]
    fn test_defaults_applied() {
        let args = search_schema()
            .validate(Some(&json!({"city_name": "Lyon"})))
            .unwrap();
        assert_eq!(args.get("limit"), Some(&json!(5)));
        assert_eq!(args.get("country"), None);
    }

    #[test]
    fn test_missing_required_field() {
        let err = search_schema().validate(Some(&json!({}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("city_name".into()));

        let err = search_schema()
            .validate(Some(&json!({"city_name": null})))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("city_name".into()));
    }

    #[test]
    fn test_type_mismatch() {
        let err = search_schema()
            .validate(Some(&json!({"city_name": 42})))
            .unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { expected: "string", .. }));

        let err = search_schema()
            .validate(Some(&json!({"city_name": "Lyon", "limit": 2.5})))
            .unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { expected: "integer", .. }));
    }

    #[test]
    fn test_bounds_enforced() {
        let schema = search_schema();
        assert!(matches!(
            schema.validate(Some(&json!({"city_name": "Lyon", "limit": 0}))),
            Err(ValidationError::BelowMinimum { .. })
        ));
        assert!(matches!(
            schema.validate(Some(&json!({"city_name": "Lyon", "limit": 11}))),
            Err(ValidationError::AboveMaximum { .. })
        ));
        assert!(schema
            .validate(Some(&json!({"city_name": "Lyon", "limit": 10})))
            .is_ok());
    }

    #[test]
    fn test_integral_float_normalised() {
        let args = search_schema()
            .validate(Some(&json!({"city_name": "Lyon", "limit": 3.0})))
            .unwrap();
        assert_eq!(args.get("limit"), Some(&json!(3)));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        assert_eq!(
            search_schema().validate(Some(&json!(["Lyon"]))),
            Err(ValidationError::NotAnObject)
        );
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let args = search_schema()
            .validate(Some(&json!({"city_name": "Lyon", "extra": true})))
            .unwrap();
        assert!(args.get("extra").is_none());
    }

    #[test]
    fn test_check_rejects_bad_declarations() {
        let duplicate = InputSchema::new(vec![
            FieldSpec::string("a", "a"),
            FieldSpec::string("a", "again"),
        ]);
        assert_eq!(duplicate.check(), Err(SchemaError::DuplicateField("a".into())));

        let inverted = InputSchema::new(vec![FieldSpec::integer("n", "n").range(10.0, 1.0)]);
        assert_eq!(inverted.check(), Err(SchemaError::InvalidRange("n".into())));

        let bad_default = InputSchema::new(vec![FieldSpec::integer("n", "n")
            .range(1.0, 10.0)
            .default_value(json!(50))]);
        assert!(matches!(
            bad_default.check(),
            Err(SchemaError::InvalidDefault { .. })
        ));

        assert!(search_schema().check().is_ok());
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = search_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["city_name"]));
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["properties"]["limit"]["maximum"], json!(10.0));
        assert_eq!(schema["properties"]["limit"]["default"], json!(5));
    }

    #[test]
    fn test_parse_into_typed_args() {
        #[derive(serde::Deserialize)]
        struct Args {
            city_name: String,
            limit: u32,
        }

        let args: Args = search_schema()
            .validate(Some(&json!({"city_name": "Lyon"})))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(args.city_name, "Lyon");
        assert_eq!(args.limit, 5);
    }
}
