//! Declared input schemas, validated at the registry boundary.
//!
//! Tools declare the shape of their arguments as a [`Schema`] instead of
//! probing untyped bags at runtime. The registry validates arguments once,
//! before dispatch, so tool bodies can assume well-formed input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A structural description of accepted arguments.
///
/// Serializes to the JSON-Schema-style wire form used in discovery
/// responses (`{"type": "object", "properties": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schema {
    String,
    Number,
    Integer,
    Boolean,
    Object {
        #[serde(default)]
        properties: BTreeMap<String, Schema>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required: Vec<String>,
    },
    Array {
        items: Box<Schema>,
    },
    /// Accepts any value. Used by tools with genuinely open-ended input.
    Any,
}

/// A schema violation, qualified by the path of the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaMismatch {
    pub path: String,
    pub message: String,
}

impl Schema {
    /// Convenience constructor for object schemas.
    pub fn object<'a>(
        properties: impl IntoIterator<Item = (&'a str, Schema)>,
        required: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Schema::Object {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: required.into_iter().map(str::to_string).collect(),
        }
    }

    /// Validate a value against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaMismatch> {
        self.validate_at("$", value)
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), SchemaMismatch> {
        match self {
            Schema::Any => Ok(()),
            Schema::String => expect(path, value.is_string(), "string", value),
            Schema::Number => expect(path, value.is_number(), "number", value),
            Schema::Integer => expect(path, value.is_i64() || value.is_u64(), "integer", value),
            Schema::Boolean => expect(path, value.is_boolean(), "boolean", value),
            Schema::Array { items } => {
                let Value::Array(elements) = value else {
                    return expect(path, false, "array", value);
                };
                for (index, element) in elements.iter().enumerate() {
                    items.validate_at(&format!("{path}[{index}]"), element)?;
                }
                Ok(())
            }
            Schema::Object {
                properties,
                required,
            } => {
                let Value::Object(fields) = value else {
                    return expect(path, false, "object", value);
                };
                for name in required {
                    if !fields.contains_key(name) {
                        return Err(SchemaMismatch {
                            path: format!("{path}.{name}"),
                            message: "missing required field".to_string(),
                        });
                    }
                }
                for (name, field) in fields {
                    if let Some(schema) = properties.get(name) {
                        schema.validate_at(&format!("{path}.{name}"), field)?;
                    }
                    // Unknown fields are passed through untouched; tools that
                    // care can reject them as InvalidInput.
                }
                Ok(())
            }
        }
    }
}

fn expect(path: &str, ok: bool, expected: &str, found: &Value) -> Result<(), SchemaMismatch> {
    if ok {
        Ok(())
    } else {
        Err(SchemaMismatch {
            path: path.to_string(),
            message: format!("expected {expected}, found {}", type_name(found)),
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
