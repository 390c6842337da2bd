//! Settings service - typed key/value storage with global and project scope
//!
//! Keys arriving here are already prefixed by the caller; the prefix is
//! opaque to this layer apart from counting toward the key length limit.

use super::events::{SettingEvent, SettingEventPublisher};
use super::registry::ModuleRegistry;
use super::repository::SettingsRepository;
use super::validation::{validate_setting_size, SettingLimits};
use crate::contract::{FrameworkError, SettingScope, SettingSnapshot, SettingsMap};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Domain service for module settings
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    registry: Arc<ModuleRegistry>,
    publisher: Arc<dyn SettingEventPublisher>,
    limits: SettingLimits,
}

impl SettingsService {
    pub fn new(
        repo: Arc<dyn SettingsRepository>,
        registry: Arc<ModuleRegistry>,
        publisher: Arc<dyn SettingEventPublisher>,
        limits: SettingLimits,
    ) -> Self {
        Self {
            repo,
            registry,
            publisher,
            limits,
        }
    }

    /// Store `value` under `key`. Writing null removes the key.
    pub async fn set_setting(
        &self,
        prefix: &str,
        scope: SettingScope,
        key: &str,
        value: Value,
    ) -> Result<(), FrameworkError> {
        if value.is_null() {
            return self.remove_setting(prefix, scope, key).await;
        }

        self.check_size(key, &value)?;
        let module_id = self.registry.module_id(prefix).await?;

        let previous = self
            .repo
            .find(module_id, scope.project_id(), key)
            .await
            .map_err(FrameworkError::internal)?
            .map(|s| s.value);

        if previous.as_ref() == Some(&value) {
            tracing::debug!(prefix, key, "setting unchanged, skipping write");
            return Ok(());
        }

        self.repo
            .upsert(module_id, scope.project_id(), key, &value)
            .await
            .map_err(FrameworkError::internal)?;
        tracing::debug!(prefix, key, ?scope, "setting stored");

        if let SettingScope::Project(project_id) = scope {
            let event = SettingEvent::changed(
                prefix,
                project_id,
                key,
                previous.unwrap_or(Value::Null),
                value,
            );
            self.publish(event).await;
        }

        Ok(())
    }

    /// Resolve a setting. Project scope falls back to the global value.
    pub async fn get_setting(
        &self,
        prefix: &str,
        scope: SettingScope,
        key: &str,
    ) -> Result<Value, FrameworkError> {
        let module_id = self.registry.module_id(prefix).await?;

        if let SettingScope::Project(project_id) = scope {
            let project_value = self
                .repo
                .find(module_id, Some(project_id), key)
                .await
                .map_err(FrameworkError::internal)?;
            if let Some(setting) = project_value {
                return Ok(setting.value);
            }
        }

        Ok(self
            .repo
            .find(module_id, None, key)
            .await
            .map_err(FrameworkError::internal)?
            .map(|s| s.value)
            .unwrap_or(Value::Null))
    }

    /// Hard delete; removing a missing key is not an error
    pub async fn remove_setting(
        &self,
        prefix: &str,
        scope: SettingScope,
        key: &str,
    ) -> Result<(), FrameworkError> {
        let module_id = self.registry.module_id(prefix).await?;

        let existed = self
            .repo
            .find(module_id, scope.project_id(), key)
            .await
            .map_err(FrameworkError::internal)?
            .is_some();

        self.repo
            .delete(module_id, scope.project_id(), key)
            .await
            .map_err(FrameworkError::internal)?;
        tracing::debug!(prefix, key, ?scope, "setting removed");

        if let (SettingScope::Project(project_id), true) = (scope, existed) {
            self.publish(SettingEvent::removed(prefix, project_id, key))
                .await;
        }

        Ok(())
    }

    /// Every setting visible in `scope`, with both layers
    pub async fn get_settings_as_map(
        &self,
        prefix: &str,
        scope: SettingScope,
    ) -> Result<SettingsMap, FrameworkError> {
        let module_id = self.registry.module_id(prefix).await?;

        let mut map: SettingsMap = self
            .repo
            .find_all(module_id, None)
            .await
            .map_err(FrameworkError::internal)?
            .into_iter()
            .map(|s| {
                (
                    s.key,
                    SettingSnapshot {
                        system_value: s.value.clone(),
                        value: s.value,
                    },
                )
            })
            .collect();

        if let SettingScope::Project(project_id) = scope {
            let overrides = self
                .repo
                .find_all(module_id, Some(project_id))
                .await
                .map_err(FrameworkError::internal)?;
            for setting in overrides {
                map.entry(setting.key).or_default().value = setting.value;
            }
        }

        Ok(map)
    }

    /// Replace all project settings of the module in one transaction
    pub async fn set_project_settings(
        &self,
        prefix: &str,
        project_id: i64,
        settings: BTreeMap<String, Value>,
    ) -> Result<(), FrameworkError> {
        let settings: Vec<(String, Value)> =
            settings.into_iter().filter(|(_, v)| !v.is_null()).collect();
        for (key, value) in &settings {
            self.check_size(key, value)?;
        }

        let module_id = self.registry.module_id(prefix).await?;
        let previous: BTreeMap<String, Value> = self
            .repo
            .find_all(module_id, Some(project_id))
            .await
            .map_err(FrameworkError::internal)?
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect();

        self.repo
            .replace_project_settings(module_id, project_id, &settings)
            .await
            .map_err(FrameworkError::internal)?;
        tracing::debug!(prefix, project_id, count = settings.len(), "project settings replaced");

        for (key, value) in &settings {
            let before = previous.get(key).cloned().unwrap_or(Value::Null);
            if &before != value {
                self.publish(SettingEvent::changed(prefix, project_id, key, before, value.clone()))
                    .await;
            }
        }
        for key in previous.keys() {
            if !settings.iter().any(|(k, _)| k == key) {
                self.publish(SettingEvent::removed(prefix, project_id, key))
                    .await;
            }
        }

        Ok(())
    }

    fn check_size(&self, key: &str, value: &Value) -> Result<(), FrameworkError> {
        let serialized = serde_json::to_string(value).map_err(|e| {
            FrameworkError::validation(format!("The value for '{}' cannot be serialized: {}", key, e))
        })?;
        validate_setting_size(key, &serialized, &self.limits)
    }

    async fn publish(&self, event: SettingEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            // Log error but don't fail the operation
            tracing::warn!(error = ?e, "failed to publish settings event");
        }
    }
}
