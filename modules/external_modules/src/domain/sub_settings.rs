//! Row-oriented projection of `sub_settings` groups
//!
//! The i-th element of every child key's stored list forms the i-th group
//! instance. Shorter lists pad with null. Pure read, no writes.

use super::registry::ModuleRegistry;
use super::settings::SettingsService;
use crate::contract::{FrameworkError, SettingScope, SubSettingRow};
use serde_json::Value;
use std::sync::Arc;

pub struct SubSettingsResolver {
    settings: Arc<SettingsService>,
    registry: Arc<ModuleRegistry>,
}

impl SubSettingsResolver {
    pub fn new(settings: Arc<SettingsService>, registry: Arc<ModuleRegistry>) -> Self {
        Self { settings, registry }
    }

    /// Instances of `group_key` for one project.
    ///
    /// `key_prefix` is prepended to every child key when reading storage;
    /// rows are keyed by the declared (unprefixed) child keys.
    pub async fn get_group_instances(
        &self,
        prefix: &str,
        project_id: i64,
        group_key: &str,
        key_prefix: &str,
    ) -> Result<Vec<SubSettingRow>, FrameworkError> {
        let entry = self.registry.require(prefix)?;
        let group = entry
            .config
            .find_setting(group_key)
            .filter(|setting| setting.is_sub_settings())
            .ok_or_else(|| {
                FrameworkError::validation(format!(
                    "The '{}' module does not declare a sub_settings group named '{}'",
                    prefix, group_key
                ))
            })?;

        let mut columns = Vec::with_capacity(group.sub_settings.len());
        for child in &group.sub_settings {
            let stored_key = format!("{}{}", key_prefix, child.key);
            let value = self
                .settings
                .get_setting(prefix, SettingScope::Project(project_id), &stored_key)
                .await?;
            columns.push((child.key.clone(), as_list(value)));
        }

        Ok(project_rows(columns))
    }
}

fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(values) => values,
        other => vec![other],
    }
}

fn project_rows(columns: Vec<(String, Vec<Value>)>) -> Vec<SubSettingRow> {
    let count = columns.iter().map(|(_, values)| values.len()).max().unwrap_or(0);

    (0..count)
        .map(|i| {
            columns
                .iter()
                .map(|(key, values)| (key.clone(), values.get(i).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}
