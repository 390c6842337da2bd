//! SeaORM repository implementations

use crate::contract::{LogRow, NewLogEntry, StoredSetting};
use crate::domain::query::SqlDialect;
use crate::domain::repository::{
    LogRepository, ModuleRepository, RecordRepository, SettingsRepository,
};
use anyhow::Result;
use async_trait::async_trait;
use sea_orm::prelude::{DateTimeUtc, Decimal};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityName, EntityTrait, QueryFilter, QueryOrder, QueryResult, Select, Statement,
    TransactionTrait,
};
use serde_json::Value;
use std::sync::Arc;

use super::entity::{log, log_parameter, module, project_record, setting, user};
use super::mapper::{log_active_model, log_parameter_active_model, setting_active_model};

/// Query dialect matching a connection's backend
pub fn dialect_for(backend: DatabaseBackend) -> SqlDialect {
    match backend {
        DatabaseBackend::MySql => SqlDialect::MySql,
        DatabaseBackend::Postgres => SqlDialect::Postgres,
        DatabaseBackend::Sqlite => SqlDialect::Sqlite,
    }
}

// ===== Module Repository =====

pub struct SeaOrmModuleRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmModuleRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, prefix: &str) -> Result<Option<i64>> {
        Ok(module::Entity::find()
            .filter(module::Column::DirectoryPrefix.eq(prefix))
            .one(&*self.db)
            .await?
            .map(|m| m.external_module_id))
    }
}

#[async_trait]
impl ModuleRepository for SeaOrmModuleRepository {
    async fn find_or_register(&self, prefix: &str) -> Result<i64> {
        use sea_orm::ActiveValue::*;

        if let Some(id) = self.find(prefix).await? {
            return Ok(id);
        }

        let active = module::ActiveModel {
            external_module_id: NotSet,
            directory_prefix: Set(prefix.to_string()),
        };
        match active.insert(&*self.db).await {
            Ok(model) => Ok(model.external_module_id),
            // Lost a race against another registration of the same prefix
            Err(e) => self
                .find(prefix)
                .await?
                .ok_or_else(|| anyhow::anyhow!("failed to register module '{}': {}", prefix, e)),
        }
    }
}

// ===== Settings Repository =====

pub struct SeaOrmSettingsRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSettingsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn scoped_settings(module_id: i64, project_id: Option<i64>) -> Select<setting::Entity> {
    let query = setting::Entity::find().filter(setting::Column::ExternalModuleId.eq(module_id));
    match project_id {
        Some(pid) => query.filter(setting::Column::ProjectId.eq(pid)),
        None => query.filter(setting::Column::ProjectId.is_null()),
    }
}

#[async_trait]
impl SettingsRepository for SeaOrmSettingsRepository {
    async fn find(
        &self,
        module_id: i64,
        project_id: Option<i64>,
        key: &str,
    ) -> Result<Option<StoredSetting>> {
        let result = scoped_settings(module_id, project_id)
            .filter(setting::Column::Key.eq(key))
            .one(&*self.db)
            .await?;

        result.map(StoredSetting::try_from).transpose()
    }

    async fn find_all(&self, module_id: i64, project_id: Option<i64>) -> Result<Vec<StoredSetting>> {
        let results = scoped_settings(module_id, project_id)
            .order_by_asc(setting::Column::Key)
            .all(&*self.db)
            .await?;

        results
            .into_iter()
            .map(StoredSetting::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn upsert(
        &self,
        module_id: i64,
        project_id: Option<i64>,
        key: &str,
        value: &Value,
    ) -> Result<()> {
        use sea_orm::ActiveValue::Set;

        let mut active = setting_active_model(module_id, project_id, key, value)?;

        let existing = scoped_settings(module_id, project_id)
            .filter(setting::Column::Key.eq(key))
            .one(&*self.db)
            .await?;

        match existing {
            Some(row) => {
                active.id = Set(row.id);
                active.update(&*self.db).await?;
            }
            None => {
                active.insert(&*self.db).await?;
            }
        }

        Ok(())
    }

    async fn delete(&self, module_id: i64, project_id: Option<i64>, key: &str) -> Result<()> {
        let query = setting::Entity::delete_many()
            .filter(setting::Column::ExternalModuleId.eq(module_id))
            .filter(setting::Column::Key.eq(key));
        let query = match project_id {
            Some(pid) => query.filter(setting::Column::ProjectId.eq(pid)),
            None => query.filter(setting::Column::ProjectId.is_null()),
        };
        query.exec(&*self.db).await?;

        Ok(())
    }

    async fn replace_project_settings(
        &self,
        module_id: i64,
        project_id: i64,
        settings: &[(String, Value)],
    ) -> Result<()> {
        let txn = self.db.begin().await?;

        setting::Entity::delete_many()
            .filter(setting::Column::ExternalModuleId.eq(module_id))
            .filter(setting::Column::ProjectId.eq(project_id))
            .exec(&txn)
            .await?;

        for (key, value) in settings {
            setting_active_model(module_id, Some(project_id), key, value)?
                .insert(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

// ===== Log Repository =====

pub struct SeaOrmLogRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmLogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LogRepository for SeaOrmLogRepository {
    async fn insert(&self, entry: &NewLogEntry) -> Result<i64> {
        let txn = self.db.begin().await?;

        let ui_id = match &entry.username {
            Some(username) => user::Entity::find()
                .filter(user::Column::Username.eq(username.as_str()))
                .one(&txn)
                .await?
                .map(|u| u.ui_id),
            None => None,
        };

        let log_id = log_active_model(entry, ui_id).insert(&txn).await?.log_id;

        if !entry.parameters.is_empty() {
            let rows = entry
                .parameters
                .iter()
                .map(|row| log_parameter_active_model(log_id, row));
            log_parameter::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(log_id)
    }

    async fn query(&self, sql: &str, columns: &[String]) -> Result<Vec<LogRow>> {
        let backend = self.db.get_database_backend();
        let rows = self
            .db
            .query_all(Statement::from_string(backend, sql.to_owned()))
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| (column.clone(), decode_cell(row, column)))
                    .collect()
            })
            .collect())
    }

    async fn delete(&self, sql: &str) -> Result<u64> {
        let backend = self.db.get_database_backend();
        let txn = self.db.begin().await?;

        let removed = txn
            .execute(Statement::from_string(backend, sql.to_owned()))
            .await?
            .rows_affected();

        // Parameters normally go with the cascade; sweep any left behind on
        // connections without foreign key enforcement
        let orphans = format!(
            "DELETE FROM {params} WHERE log_id NOT IN (SELECT log_id FROM {log})",
            params = log_parameter::Entity.table_name(),
            log = log::Entity.table_name()
        );
        txn.execute(Statement::from_string(backend, orphans)).await?;

        txn.commit().await?;
        Ok(removed)
    }
}

/// Decode one result cell into JSON, trying the representations the
/// supported backends return
fn decode_cell(row: &QueryResult, column: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>>("", column) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>>("", column) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>>("", column) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>>("", column) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTimeUtc>>("", column) {
        return v
            .map(|ts| Value::String(ts.to_rfc3339()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Decimal>>("", column) {
        return v
            .and_then(|d| d.to_string().parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    tracing::warn!(column, "log query column has an unsupported type");
    Value::Null
}

// ===== Record Repository =====

pub struct SeaOrmRecordRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmRecordRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordRepository for SeaOrmRecordRepository {
    async fn max_record_id(&self, project_id: i64) -> Result<Option<i64>> {
        Ok(project_record::Entity::find()
            .filter(project_record::Column::ProjectId.eq(project_id))
            .order_by_desc(project_record::Column::RecordId)
            .one(&*self.db)
            .await?
            .map(|r| r.record_id))
    }

    async fn insert(&self, project_id: i64, record_id: i64) -> Result<i64> {
        use sea_orm::ActiveValue::*;

        let active = project_record::ActiveModel {
            id: NotSet,
            project_id: Set(project_id),
            record_id: Set(record_id),
        };
        Ok(active.insert(&*self.db).await?.id)
    }

    async fn rows_for(&self, project_id: i64, record_id: i64) -> Result<Vec<i64>> {
        let results = project_record::Entity::find()
            .filter(project_record::Column::ProjectId.eq(project_id))
            .filter(project_record::Column::RecordId.eq(record_id))
            .order_by_asc(project_record::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(results.into_iter().map(|r| r.id).collect())
    }

    async fn delete_row(&self, row_id: i64) -> Result<()> {
        project_record::Entity::delete_by_id(row_id)
            .exec(&*self.db)
            .await?;

        Ok(())
    }
}
