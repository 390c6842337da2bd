//! Repository traits for data access
//!
//! These traits define the interface for data access operations.
//! Implementations are in infra/storage/repositories.rs

use crate::contract::{LogRow, NewLogEntry, StoredSetting};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Registered modules (directory prefix <-> numeric id)
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Return the id registered for `prefix`, registering it if needed
    async fn find_or_register(&self, prefix: &str) -> Result<i64>;
}

/// Repository for module settings
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Find a setting by its exact scope (no fallback)
    async fn find(
        &self,
        module_id: i64,
        project_id: Option<i64>,
        key: &str,
    ) -> Result<Option<StoredSetting>>;

    /// All settings of a module stored in exactly this scope
    async fn find_all(&self, module_id: i64, project_id: Option<i64>) -> Result<Vec<StoredSetting>>;

    /// Create or update a setting
    async fn upsert(
        &self,
        module_id: i64,
        project_id: Option<i64>,
        key: &str,
        value: &Value,
    ) -> Result<()>;

    /// Hard delete a setting (no error when absent)
    async fn delete(&self, module_id: i64, project_id: Option<i64>, key: &str) -> Result<()>;

    /// Replace every setting of a module in one project, atomically
    async fn replace_project_settings(
        &self,
        module_id: i64,
        project_id: i64,
        settings: &[(String, Value)],
    ) -> Result<()>;
}

/// Core log table, side-parameter table and user lookup
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Insert a core row plus its parameters, returns the new log id
    async fn insert(&self, entry: &NewLogEntry) -> Result<i64>;

    /// Run a translated select; `columns` lists the output aliases in order
    async fn query(&self, sql: &str, columns: &[String]) -> Result<Vec<LogRow>>;

    /// Run a translated delete, returns the number of removed entries
    async fn delete(&self, sql: &str) -> Result<u64>;
}

/// Ledger of record ids used by auto-numbering
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Highest numeric record id in the project
    async fn max_record_id(&self, project_id: i64) -> Result<Option<i64>>;

    /// Insert a ledger row, returns its row id
    async fn insert(&self, project_id: i64, record_id: i64) -> Result<i64>;

    /// Row ids holding `record_id` in the project, oldest first
    async fn rows_for(&self, project_id: i64, record_id: i64) -> Result<Vec<i64>>;

    /// Delete one ledger row
    async fn delete_row(&self, row_id: i64) -> Result<()>;
}
