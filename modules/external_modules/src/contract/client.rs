//! Native client trait exposed to module authors
//!
//! This is the closed interface a module uses to reach its own settings and
//! its own log. Every call is scoped to the module the client was built for.

use super::{
    error::FrameworkError,
    model::{LogParameters, LogRow, SettingsMap, SubSettingRow},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Module-facing API for settings and logging
#[async_trait]
pub trait ExternalModuleApi: Send + Sync {
    /// Directory prefix of the module this client acts for
    fn prefix(&self) -> &str;

    // ===== System Settings =====

    /// Get the value stored systemwide for `key` (null when unset)
    async fn get_system_setting(&self, key: &str) -> Result<Value, FrameworkError>;

    /// Set a systemwide value (shared by all projects)
    async fn set_system_setting(&self, key: &str, value: Value) -> Result<(), FrameworkError>;

    /// Remove a systemwide value
    async fn remove_system_setting(&self, key: &str) -> Result<(), FrameworkError>;

    /// All system settings of the module
    async fn get_system_settings(&self) -> Result<SettingsMap, FrameworkError>;

    // ===== Project Settings =====

    /// Project override if present, else the system value, else null
    async fn get_project_setting(
        &self,
        key: &str,
        project_id: Option<i64>,
    ) -> Result<Value, FrameworkError>;

    /// Set a project override
    async fn set_project_setting(
        &self,
        key: &str,
        value: Value,
        project_id: Option<i64>,
    ) -> Result<(), FrameworkError>;

    /// Remove a project override
    async fn remove_project_setting(
        &self,
        key: &str,
        project_id: Option<i64>,
    ) -> Result<(), FrameworkError>;

    /// All project and system settings of the module for one project
    async fn get_project_settings(
        &self,
        project_id: Option<i64>,
    ) -> Result<SettingsMap, FrameworkError>;

    /// Replace every project setting of the module for one project
    async fn set_project_settings(
        &self,
        settings: BTreeMap<String, Value>,
        project_id: Option<i64>,
    ) -> Result<(), FrameworkError>;

    /// Instances of a sub-setting group as rows
    async fn get_sub_settings(
        &self,
        group_key: &str,
        project_id: Option<i64>,
    ) -> Result<Vec<SubSettingRow>, FrameworkError>;

    // ===== Logging =====

    /// Write a log entry from a trusted (server-side) path, returns the log id
    async fn log(&self, message: &str, parameters: LogParameters) -> Result<i64, FrameworkError>;

    /// Write a log entry on behalf of an untrusted (browser) caller
    async fn log_untrusted(
        &self,
        message: &str,
        parameters: LogParameters,
    ) -> Result<i64, FrameworkError>;

    /// Run a restricted `select ...` query against this module's log entries
    async fn query_logs(&self, query: &str) -> Result<Vec<LogRow>, FrameworkError>;

    /// Delete this module's log entries matching `predicate`
    async fn remove_logs(&self, predicate: &str) -> Result<u64, FrameworkError>;

    // ===== Records =====

    /// Allocate the next auto-numbered record id for a project
    async fn add_auto_numbered_record(
        &self,
        project_id: Option<i64>,
    ) -> Result<i64, FrameworkError>;
}
