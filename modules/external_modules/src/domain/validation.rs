//! Key, value and config document validation

use crate::contract::FrameworkError;
use jsonschema::Validator;
use serde_json::{json, Value};

/// Limits applied to every settings write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingLimits {
    /// Maximum stored key length in bytes
    pub max_key_length: usize,
    /// Maximum serialized value size in bytes
    pub max_value_size: usize,
}

impl Default for SettingLimits {
    fn default() -> Self {
        Self {
            max_key_length: 255,
            max_value_size: 1024 * 1024,
        }
    }
}

impl From<&crate::config::Config> for SettingLimits {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            max_key_length: config.max_key_length,
            max_value_size: config.max_value_size,
        }
    }
}

/// Only lowercase characters, numbers, dashes, and underscores
pub fn is_setting_key_valid(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Validate a setting key's charset
pub fn validate_setting_key(key: &str) -> Result<(), FrameworkError> {
    if !is_setting_key_valid(key) {
        return Err(FrameworkError::validation(format!(
            "The setting key '{}' contains invalid characters. Only lowercase characters, numbers, dashes, and underscores are allowed.",
            key
        )));
    }
    Ok(())
}

/// Check the stored key length and the serialized value size
pub fn validate_setting_size(
    key: &str,
    serialized: &str,
    limits: &SettingLimits,
) -> Result<(), FrameworkError> {
    if key.len() > limits.max_key_length {
        return Err(FrameworkError::SizeLimit {
            key: key.to_string(),
            message: format!(
                "The setting key is longer than the {} character limit",
                limits.max_key_length
            ),
        });
    }

    if serialized.len() > limits.max_value_size {
        return Err(FrameworkError::SizeLimit {
            key: key.to_string(),
            message: format!(
                "The setting value is larger than the {} byte limit",
                limits.max_value_size
            ),
        });
    }

    Ok(())
}

/// JSON Schema describing a module config document
pub fn config_document_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "system-settings": { "type": "array", "items": { "$ref": "#/definitions/setting" } },
            "project-settings": { "type": "array", "items": { "$ref": "#/definitions/setting" } }
        },
        "definitions": {
            "setting": {
                "type": "object",
                "required": ["key"],
                "properties": {
                    "key": { "type": "string" },
                    "name": { "type": "string" },
                    "type": { "type": "string" },
                    "repeatable": { "type": "boolean" },
                    "sub_settings": { "type": "array", "items": { "$ref": "#/definitions/setting" } }
                }
            }
        }
    })
}

/// Validate a value against a JSON Schema
pub fn validate_against_schema(data: &Value, schema: &Value) -> Result<(), FrameworkError> {
    let validator = Validator::new(schema).map_err(|e| FrameworkError::Validation {
        message: format!("Invalid JSON Schema: {}", e),
    })?;

    if let Err(error) = validator.validate(data) {
        return Err(FrameworkError::Validation {
            message: error.to_string(),
        });
    }

    Ok(())
}
