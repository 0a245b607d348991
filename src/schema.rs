// Copyright 2025 Cowboy AI, LLC.

//! Explicit payload schemas
//!
//! A [`PayloadSchema`] is a fixed, ordered list of named, typed fields.
//! Validation is strict: every declared field must be present and non-null,
//! no undeclared field may appear, and nested records are validated
//! recursively. Schemas are assembled once at startup alongside the
//! command descriptors; the hot path only reads them.
//!
//! This is deliberately structural typing, not a JSON-Schema engine —
//! the pipeline needs shape guarantees at its payload boundaries, nothing
//! more.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::message::Payload;

/// Violation of a [`PayloadSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A declared field is absent from the payload (or explicitly null).
    #[error("missing required field `{field}`")]
    MissingField {
        /// Dotted path of the missing field.
        field: String,
    },

    /// The payload carries a field the schema does not declare.
    #[error("unexpected field `{field}`")]
    UnexpectedField {
        /// Dotted path of the undeclared field.
        field: String,
    },

    /// A declared field holds a value of the wrong JSON type.
    #[error("field `{field}` expected {expected}, got {actual}")]
    TypeMismatch {
        /// Dotted path of the offending field.
        field: String,
        /// Declared type name.
        expected: &'static str,
        /// JSON type name of the value actually present.
        actual: &'static str,
    },
}

/// Declared type of a single payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON number without a fractional part.
    Integer,
    /// JSON number with a fractional representation. Integers do not pass.
    Float,
    /// JSON boolean.
    Boolean,
    /// JSON array, elements unchecked.
    List,
    /// Nested JSON object validated against its own schema.
    Record(PayloadSchema),
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::List => "list",
            FieldType::Record(_) => "record",
        }
    }

    fn check(&self, field: &str, value: &Value) -> Result<(), SchemaError> {
        let matches = match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::List => value.is_array(),
            FieldType::Record(schema) => {
                return match value.as_object() {
                    Some(object) => schema.validate_nested(field, object),
                    None => Err(SchemaError::TypeMismatch {
                        field: field.to_string(),
                        expected: self.name(),
                        actual: json_type_name(value),
                    }),
                };
            }
        };

        if matches {
            Ok(())
        } else {
            Err(SchemaError::TypeMismatch {
                field: field.to_string(),
                expected: self.name(),
                actual: json_type_name(value),
            })
        }
    }
}

/// Ordered, required, strictly-matched field list for one payload shape.
///
/// # Examples
///
/// ```rust
/// use commandeer::{FieldType, Payload, PayloadSchema};
/// use serde_json::json;
///
/// let schema = PayloadSchema::new()
///     .field("id", FieldType::String)
///     .field("username", FieldType::String);
///
/// let payload = Payload::from([
///     ("id".to_string(), json!("u1")),
///     ("username".to_string(), json!("Alex")),
/// ]);
///
/// assert!(schema.validate(&payload).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayloadSchema {
    fields: IndexMap<String, FieldType>,
}

impl PayloadSchema {
    /// Empty schema; matches only the empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required field. Declaration order is kept for reporting.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a payload against this schema.
    ///
    /// Null values count as missing; the original field is unusable either
    /// way and the distinction only confuses callers.
    pub fn validate(&self, payload: &Payload) -> Result<(), SchemaError> {
        for (name, field_type) in &self.fields {
            let value = payload
                .get(name)
                .filter(|value| !value.is_null())
                .ok_or_else(|| SchemaError::MissingField { field: name.clone() })?;
            field_type.check(name, value)?;
        }

        for name in payload.keys() {
            if !self.fields.contains_key(name) {
                return Err(SchemaError::UnexpectedField {
                    field: name.clone(),
                });
            }
        }

        Ok(())
    }

    fn validate_nested(
        &self,
        prefix: &str,
        object: &serde_json::Map<String, Value>,
    ) -> Result<(), SchemaError> {
        for (name, field_type) in &self.fields {
            let path = format!("{prefix}.{name}");
            let value = object
                .get(name)
                .filter(|value| !value.is_null())
                .ok_or(SchemaError::MissingField { field: path.clone() })?;
            field_type.check(&path, value)?;
        }

        for name in object.keys() {
            if !self.fields.contains_key(name) {
                return Err(SchemaError::UnexpectedField {
                    field: format!("{prefix}.{name}"),
                });
            }
        }

        Ok(())
    }
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
