//! Native client implementation - wraps domain services for in-process calls

use crate::contract::{
    ExternalModuleApi, FrameworkError, LogParameters, LogRow, RequestContext, SettingScope,
    SettingsMap, SubSettingRow,
};
use crate::domain::validation::validate_setting_key;
use crate::domain::{LogService, RecordAllocator, SettingsService, SubSettingsResolver};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Services shared by every module handle
#[derive(Clone)]
pub struct Services {
    pub settings: Arc<SettingsService>,
    pub sub_settings: Arc<SubSettingsResolver>,
    pub logs: Arc<LogService>,
    pub records: Arc<RecordAllocator>,
}

/// Module handle bound to one directory prefix and one request.
///
/// The setting key prefix and the bound record id are per-instance state;
/// clones share neither.
pub struct NativeModuleClient {
    prefix: String,
    ctx: RequestContext,
    services: Services,
    setting_key_prefix: RwLock<Option<String>>,
    record_id: RwLock<Option<String>>,
}

impl NativeModuleClient {
    pub fn new(prefix: impl Into<String>, ctx: RequestContext, services: Services) -> Self {
        Self {
            prefix: prefix.into(),
            ctx,
            services,
            setting_key_prefix: RwLock::new(None),
            record_id: RwLock::new(None),
        }
    }

    /// Request context this handle acts under
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Prepend `key_prefix` to every setting key read or written from now on.
    /// `None` (or an empty string) turns prefixing off.
    pub fn set_setting_key_prefix(&self, key_prefix: Option<&str>) {
        *self.setting_key_prefix.write() = key_prefix.filter(|p| !p.is_empty()).map(str::to_string);
    }

    pub fn setting_key_prefix(&self) -> Option<String> {
        self.setting_key_prefix.read().clone()
    }

    /// Bind log entries without an explicit `record` to `record_id`
    pub fn set_record_id(&self, record_id: Option<&str>) {
        *self.record_id.write() = record_id.map(str::to_string);
    }

    pub fn record_id(&self) -> Option<String> {
        self.record_id.read().clone()
    }

    fn stored_key(&self, key: &str) -> Result<String, FrameworkError> {
        validate_setting_key(key)?;
        Ok(match self.setting_key_prefix.read().as_deref() {
            Some(key_prefix) => format!("{}{}", key_prefix, key),
            None => key.to_string(),
        })
    }

    /// Keep only keys under the active prefix, with the prefix stripped
    fn unprefixed(&self, map: SettingsMap) -> SettingsMap {
        let key_prefix = self.setting_key_prefix.read().clone();
        match key_prefix {
            None => map,
            Some(key_prefix) => map
                .into_iter()
                .filter_map(|(key, snapshot)| {
                    key.strip_prefix(&key_prefix)
                        .map(|stripped| (stripped.to_string(), snapshot))
                })
                .collect(),
        }
    }

    fn project_id(&self, project_id: Option<i64>) -> Result<i64, FrameworkError> {
        project_id
            .or(self.ctx.project_id)
            .ok_or_else(|| FrameworkError::MissingParameter {
                name: "pid".to_string(),
            })
    }
}

#[async_trait]
impl ExternalModuleApi for NativeModuleClient {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn get_system_setting(&self, key: &str) -> Result<Value, FrameworkError> {
        let key = self.stored_key(key)?;
        self.services
            .settings
            .get_setting(&self.prefix, SettingScope::Global, &key)
            .await
    }

    async fn set_system_setting(&self, key: &str, value: Value) -> Result<(), FrameworkError> {
        let key = self.stored_key(key)?;
        self.services
            .settings
            .set_setting(&self.prefix, SettingScope::Global, &key, value)
            .await
    }

    async fn remove_system_setting(&self, key: &str) -> Result<(), FrameworkError> {
        let key = self.stored_key(key)?;
        self.services
            .settings
            .remove_setting(&self.prefix, SettingScope::Global, &key)
            .await
    }

    async fn get_system_settings(&self) -> Result<SettingsMap, FrameworkError> {
        let map = self
            .services
            .settings
            .get_settings_as_map(&self.prefix, SettingScope::Global)
            .await?;
        Ok(self.unprefixed(map))
    }

    async fn get_project_setting(
        &self,
        key: &str,
        project_id: Option<i64>,
    ) -> Result<Value, FrameworkError> {
        let scope = SettingScope::Project(self.project_id(project_id)?);
        let key = self.stored_key(key)?;
        self.services
            .settings
            .get_setting(&self.prefix, scope, &key)
            .await
    }

    async fn set_project_setting(
        &self,
        key: &str,
        value: Value,
        project_id: Option<i64>,
    ) -> Result<(), FrameworkError> {
        let scope = SettingScope::Project(self.project_id(project_id)?);
        let key = self.stored_key(key)?;
        self.services
            .settings
            .set_setting(&self.prefix, scope, &key, value)
            .await
    }

    async fn remove_project_setting(
        &self,
        key: &str,
        project_id: Option<i64>,
    ) -> Result<(), FrameworkError> {
        let scope = SettingScope::Project(self.project_id(project_id)?);
        let key = self.stored_key(key)?;
        self.services
            .settings
            .remove_setting(&self.prefix, scope, &key)
            .await
    }

    async fn get_project_settings(
        &self,
        project_id: Option<i64>,
    ) -> Result<SettingsMap, FrameworkError> {
        let scope = SettingScope::Project(self.project_id(project_id)?);
        let map = self
            .services
            .settings
            .get_settings_as_map(&self.prefix, scope)
            .await?;
        Ok(self.unprefixed(map))
    }

    async fn set_project_settings(
        &self,
        settings: BTreeMap<String, Value>,
        project_id: Option<i64>,
    ) -> Result<(), FrameworkError> {
        let project_id = self.project_id(project_id)?;
        let settings = settings
            .into_iter()
            .map(|(key, value)| Ok((self.stored_key(&key)?, value)))
            .collect::<Result<BTreeMap<_, _>, FrameworkError>>()?;
        self.services
            .settings
            .set_project_settings(&self.prefix, project_id, settings)
            .await
    }

    async fn get_sub_settings(
        &self,
        group_key: &str,
        project_id: Option<i64>,
    ) -> Result<Vec<SubSettingRow>, FrameworkError> {
        let project_id = self.project_id(project_id)?;
        let key_prefix = self.setting_key_prefix().unwrap_or_default();
        self.services
            .sub_settings
            .get_group_instances(&self.prefix, project_id, group_key, &key_prefix)
            .await
    }

    async fn log(&self, message: &str, parameters: LogParameters) -> Result<i64, FrameworkError> {
        let bound = self.record_id();
        self.services
            .logs
            .write(&self.prefix, message, parameters, &self.ctx, bound.as_deref())
            .await
    }

    async fn log_untrusted(
        &self,
        message: &str,
        parameters: LogParameters,
    ) -> Result<i64, FrameworkError> {
        let bound = self.record_id();
        self.services
            .logs
            .write_untrusted(&self.prefix, message, parameters, &self.ctx, bound.as_deref())
            .await
    }

    async fn query_logs(&self, query: &str) -> Result<Vec<LogRow>, FrameworkError> {
        self.services
            .logs
            .query(&self.prefix, query, self.ctx.project_id)
            .await
    }

    async fn remove_logs(&self, predicate: &str) -> Result<u64, FrameworkError> {
        self.services
            .logs
            .remove(&self.prefix, predicate, self.ctx.project_id)
            .await
    }

    async fn add_auto_numbered_record(
        &self,
        project_id: Option<i64>,
    ) -> Result<i64, FrameworkError> {
        let project_id = self.project_id(project_id)?;
        self.services
            .records
            .add_auto_numbered_record(project_id)
            .await
    }
}
