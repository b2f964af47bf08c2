//! JSON Schema for slave responses
//!
//! The schema is the contract between master and slave: five required fields,
//! nothing else, and a `data` shape that depends on `dataType`.

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use thiserror::Error;

/// Response schema, JSON Schema draft 7
pub static RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "cid": {
                "type": "integer",
                "minimum": 0,
                "maximum": 999
            },
            "server": {
                "type": "string",
                "minLength": 12,
                "maxLength": 12,
                "pattern": "^[0-9a-fA-F]+$"
            },
            "response": {
                "type": "string",
                "minLength": 2,
                "maxLength": 2,
                "pattern": "^[A-Z]+$"
            },
            "dataType": {
                "type": "string",
                "enum": ["base64", "asciihex", "ascii", "object"]
            },
            "data": {}
        },
        "required": ["cid", "server", "response", "dataType", "data"],
        "additionalProperties": false,
        "allOf": [
            {
                "if": { "properties": { "dataType": { "const": "asciihex" } } },
                "then": {
                    "properties": {
                        "data": { "type": "string", "pattern": "^[0-9a-fA-F]*$" }
                    }
                }
            },
            {
                "if": { "properties": { "dataType": { "const": "ascii" } } },
                "then": {
                    "properties": {
                        "data": { "type": "string", "pattern": "^[\\x20-\\x7E]*$" }
                    }
                }
            },
            {
                "if": { "properties": { "dataType": { "const": "base64" } } },
                "then": {
                    "properties": {
                        "data": {
                            "type": "string",
                            "pattern": "^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$"
                        }
                    }
                }
            },
            {
                "if": { "properties": { "dataType": { "const": "object" } } },
                "then": {
                    "properties": {
                        "data": { "type": "object" }
                    }
                }
            }
        ]
    })
});

/// Compiled response validator
pub struct ResponseValidator {
    validator: Validator,
}

impl ResponseValidator {
    pub fn new() -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&RESPONSE_SCHEMA)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate and collect every violation into one message
    pub fn validate(&self, instance: &Value) -> Result<(), SchemaError> {
        self.validator.validate(instance).map_err(|errors| {
            SchemaError::Invalid(
                errors
                    .map(|e| format!("At '{}': {}", e.instance_path, e))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator").finish_non_exhaustive()
    }
}

/// Schema errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema compilation error: {0}")]
    Compile(String),
    #[error("Response does not match schema: {0}")]
    Invalid(String),
}
