//! Module config documents and their load-time checks
//!
//! A module declares its settings in a config document. Keys must be unique
//! across system settings, project settings and every nesting level of
//! `sub_settings` groups. A document that fails these checks prevents the
//! module from being registered at all.

use super::validation::{config_document_schema, is_setting_key_valid, validate_against_schema};
use crate::contract::FrameworkError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

const SUB_SETTINGS_TYPE: &str = "sub_settings";

/// A module's declared configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "system-settings", default)]
    pub system_settings: Vec<SettingDefinition>,
    #[serde(rename = "project-settings", default)]
    pub project_settings: Vec<SettingDefinition>,
}

/// One declared setting
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SettingDefinition {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub sub_settings: Vec<SettingDefinition>,
}

impl SettingDefinition {
    /// Plain setting with no declared type
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            kind: None,
            repeatable: false,
            sub_settings: Vec::new(),
        }
    }

    /// A `sub_settings` group owning `children`
    pub fn group(key: impl Into<String>, children: Vec<SettingDefinition>) -> Self {
        Self {
            kind: Some(SUB_SETTINGS_TYPE.to_string()),
            sub_settings: children,
            ..Self::new(key)
        }
    }

    pub fn is_sub_settings(&self) -> bool {
        self.kind.as_deref() == Some(SUB_SETTINGS_TYPE)
    }
}

impl ModuleConfig {
    /// Parse and check a raw config document for module `prefix`
    pub fn from_json(prefix: &str, document: &Value, validate_shape: bool) -> Result<Self, FrameworkError> {
        if validate_shape {
            validate_against_schema(document, &config_document_schema()).map_err(|e| {
                FrameworkError::Configuration {
                    prefix: prefix.to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        let config: ModuleConfig =
            serde_json::from_value(document.clone()).map_err(|e| FrameworkError::Configuration {
                prefix: prefix.to_string(),
                message: format!("Malformed config document: {}", e),
            })?;

        config.check(prefix)?;
        Ok(config)
    }

    /// Verify key charset and uniqueness across the whole tree
    pub fn check(&self, prefix: &str) -> Result<(), FrameworkError> {
        let mut seen = HashSet::new();
        check_settings(prefix, &self.system_settings, &mut seen)?;
        check_settings(prefix, &self.project_settings, &mut seen)?;
        Ok(())
    }

    /// Find a declaration anywhere in the tree (project settings first)
    pub fn find_setting(&self, key: &str) -> Option<&SettingDefinition> {
        find_in(&self.project_settings, key).or_else(|| find_in(&self.system_settings, key))
    }
}

fn check_settings<'a>(
    prefix: &str,
    settings: &'a [SettingDefinition],
    seen: &mut HashSet<&'a str>,
) -> Result<(), FrameworkError> {
    for setting in settings {
        let key = setting.key.as_str();
        if !is_setting_key_valid(key) {
            return Err(FrameworkError::Configuration {
                prefix: prefix.to_string(),
                message: format!(
                    "The \"{}\" module has a setting named \"{}\" that contains invalid characters. Only lowercase characters, numbers, dashes, and underscores are allowed.",
                    prefix, key
                ),
            });
        }

        if !seen.insert(key) {
            return Err(FrameworkError::Configuration {
                prefix: prefix.to_string(),
                message: format!(
                    "The \"{}\" module defines the \"{}\" setting multiple times!",
                    prefix, key
                ),
            });
        }

        if setting.is_sub_settings() {
            check_settings(prefix, &setting.sub_settings, seen)?;
        }
    }
    Ok(())
}

fn find_in<'a>(settings: &'a [SettingDefinition], key: &str) -> Option<&'a SettingDefinition> {
    settings.iter().find_map(|setting| {
        if setting.key == key {
            Some(setting)
        } else {
            find_in(&setting.sub_settings, key)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_invalid(document: Value, excerpt: &str) {
        let err = ModuleConfig::from_json("test", &document, true).unwrap_err();
        assert!(
            matches!(err, FrameworkError::Configuration { .. }),
            "unexpected error: {err:?}"
        );
        assert!(err.to_string().contains(excerpt), "{err}");
    }

    #[test]
    fn test_empty_config_is_valid() {
        assert!(ModuleConfig::from_json("test", &json!({}), true).is_ok());
    }

    #[test]
    fn test_duplicate_system_and_project_key() {
        assert_invalid(
            json!({
                "system-settings": [{ "key": "some-key" }],
                "project-settings": [{ "key": "some-key" }]
            }),
            "multiple times",
        );
    }

    #[test]
    fn test_duplicate_nested_and_top_level_key() {
        assert_invalid(
            json!({
                "project-settings": [
                    { "key": "some-key" },
                    { "key": "group", "type": "sub_settings", "sub_settings": [{ "key": "some-key" }] }
                ]
            }),
            "multiple times",
        );
    }

    #[test]
    fn test_duplicate_in_sibling_groups() {
        assert_invalid(
            json!({
                "project-settings": [
                    { "key": "group-a", "type": "sub_settings", "sub_settings": [{ "key": "child" }] },
                    { "key": "group-b", "type": "sub_settings", "sub_settings": [{ "key": "child" }] }
                ]
            }),
            "multiple times",
        );
    }

    #[test]
    fn test_duplicate_deeply_nested() {
        assert_invalid(
            json!({
                "system-settings": [{ "key": "deep" }],
                "project-settings": [
                    { "key": "outer", "type": "sub_settings", "sub_settings": [
                        { "key": "inner", "type": "sub_settings", "sub_settings": [{ "key": "deep" }] }
                    ]}
                ]
            }),
            "multiple times",
        );
    }

    #[test]
    fn test_invalid_key_chars() {
        assert_invalid(
            json!({ "system-settings": [{ "key": "A" }] }),
            "invalid characters",
        );
        assert_invalid(
            json!({ "project-settings": [
                { "key": "group", "type": "sub_settings", "sub_settings": [{ "key": "no spaces" }] }
            ]}),
            "invalid characters",
        );
    }

    #[test]
    fn test_malformed_shape_rejected() {
        assert_invalid(json!({ "project-settings": [{ "name": "missing key" }] }), "key");
    }

    #[test]
    fn test_find_setting_nested() {
        let config = ModuleConfig {
            project_settings: vec![SettingDefinition::group(
                "group",
                vec![SettingDefinition::new("child")],
            )],
            ..ModuleConfig::default()
        };
        assert!(config.find_setting("group").is_some_and(|s| s.is_sub_settings()));
        assert!(config.find_setting("child").is_some());
        assert!(config.find_setting("missing").is_none());
    }
}
