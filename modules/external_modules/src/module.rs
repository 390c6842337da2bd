//! Framework bootstrap: storage, services and module handles

use crate::api::native::{NativeModuleClient, Services};
use crate::config::Config;
use crate::contract::{FrameworkError, RequestContext};
use crate::domain::{
    LogQueryTranslator, LogService, ModuleEntry, ModuleRegistry, NoOpEventPublisher,
    RecordAllocator, SettingEventPublisher, SettingLimits, SettingsService, SubSettingsResolver,
};
use crate::infra::storage::{
    dialect_for, Migrator, SeaOrmLogRepository, SeaOrmModuleRepository, SeaOrmRecordRepository,
    SeaOrmSettingsRepository,
};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::sync::Arc;

/// Host side of the external module framework.
///
/// Owns the module registry and the domain services; hands out one
/// [`NativeModuleClient`] per module and request.
pub struct Framework {
    db: Arc<DatabaseConnection>,
    registry: Arc<ModuleRegistry>,
    services: Services,
}

impl Framework {
    /// Connect to `config.database_url`, run migrations and build services
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut options = ConnectOptions::new(config.database_url.clone());
        options.sqlx_logging(false);
        let db = Database::connect(options).await?;
        Self::from_connection(db, config).await
    }

    /// Build on an existing connection, running migrations first
    pub async fn from_connection(db: DatabaseConnection, config: &Config) -> Result<Self> {
        Self::with_publisher(db, config, Arc::new(NoOpEventPublisher)).await
    }

    /// Build with a custom setting change publisher (cache hook)
    pub async fn with_publisher(
        db: DatabaseConnection,
        config: &Config,
        publisher: Arc<dyn SettingEventPublisher>,
    ) -> Result<Self> {
        Migrator::up(&db, None).await?;
        tracing::info!("external module migrations completed");

        let db = Arc::new(db);
        let dialect = dialect_for(db.get_database_backend());

        let registry = Arc::new(ModuleRegistry::new(
            Arc::new(SeaOrmModuleRepository::new(db.clone())),
            config.validate_config_documents,
        ));

        let settings = Arc::new(SettingsService::new(
            Arc::new(SeaOrmSettingsRepository::new(db.clone())),
            registry.clone(),
            publisher,
            SettingLimits::from(config),
        ));
        let sub_settings = Arc::new(SubSettingsResolver::new(settings.clone(), registry.clone()));
        let logs = Arc::new(LogService::new(
            Arc::new(SeaOrmLogRepository::new(db.clone())),
            registry.clone(),
            LogQueryTranslator::new(dialect),
        ));
        let records = Arc::new(RecordAllocator::new(Arc::new(SeaOrmRecordRepository::new(
            db.clone(),
        ))));

        tracing::info!(?dialect, "external module framework initialized");
        Ok(Self {
            db,
            registry,
            services: Services {
                settings,
                sub_settings,
                logs,
                records,
            },
        })
    }

    /// Check and register a module's config document.
    ///
    /// A module whose document fails the check is never registered.
    pub fn register_module(
        &self,
        prefix: &str,
        document: &Value,
    ) -> Result<Arc<ModuleEntry>, FrameworkError> {
        self.registry.register(prefix, document)
    }

    /// Handle for a registered module acting under `ctx`
    pub fn module(
        &self,
        prefix: &str,
        ctx: RequestContext,
    ) -> Result<NativeModuleClient, FrameworkError> {
        let entry = self.registry.require(prefix)?;
        Ok(NativeModuleClient::new(
            entry.prefix.clone(),
            ctx,
            self.services.clone(),
        ))
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ExternalModuleApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_connect_migrates_and_detects_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_url: format!("sqlite://{}?mode=rwc", dir.path().join("em.db").display()),
            ..Config::default()
        };

        let framework = Framework::connect(&config).await.unwrap();
        assert_eq!(
            dialect_for(framework.connection().get_database_backend()),
            crate::domain::query::SqlDialect::Sqlite
        );

        framework
            .register_module("connect_check", &json!({ "system-settings": [{ "key": "a" }] }))
            .unwrap();
        let module = framework
            .module("connect_check", RequestContext::default())
            .unwrap();
        module.set_system_setting("a", json!(1)).await.unwrap();
        assert_eq!(module.get_system_setting("a").await.unwrap(), json!(1));
    }
}
