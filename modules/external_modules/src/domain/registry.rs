//! Process-wide module registry
//!
//! Holds each module's checked config and its resolved numeric id, keyed by
//! directory prefix. Entries are replaced or dropped as a whole; readers
//! holding an `Arc<ModuleEntry>` never observe a partially updated entry.
//! Module ids are resolved lazily on first use.

use super::repository::ModuleRepository;
use super::schema::ModuleConfig;
use crate::contract::FrameworkError;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// A registered module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub prefix: String,
    pub config: ModuleConfig,
}

pub struct ModuleRegistry {
    modules: Arc<dyn ModuleRepository>,
    entries: DashMap<String, Arc<ModuleEntry>>,
    ids: DashMap<String, i64>,
    validate_config_documents: bool,
}

impl ModuleRegistry {
    pub fn new(modules: Arc<dyn ModuleRepository>, validate_config_documents: bool) -> Self {
        Self {
            modules,
            entries: DashMap::new(),
            ids: DashMap::new(),
            validate_config_documents,
        }
    }

    /// Check `document` and register the module under `prefix`.
    ///
    /// Fails with [`FrameworkError::Configuration`] and leaves any previous
    /// entry untouched when the document is invalid.
    pub fn register(&self, prefix: &str, document: &Value) -> Result<Arc<ModuleEntry>, FrameworkError> {
        let config = ModuleConfig::from_json(prefix, document, self.validate_config_documents)?;
        self.register_config(prefix, config)
    }

    /// Register an already parsed config (still checked)
    pub fn register_config(
        &self,
        prefix: &str,
        config: ModuleConfig,
    ) -> Result<Arc<ModuleEntry>, FrameworkError> {
        config.check(prefix)?;
        let entry = Arc::new(ModuleEntry {
            prefix: prefix.to_string(),
            config,
        });
        self.entries.insert(prefix.to_string(), entry.clone());
        tracing::info!(prefix, "module registered");
        Ok(entry)
    }

    /// Registered entry for `prefix`
    pub fn get(&self, prefix: &str) -> Option<Arc<ModuleEntry>> {
        self.entries.get(prefix).map(|entry| entry.value().clone())
    }

    /// Registered entry for `prefix`, or a validation error
    pub fn require(&self, prefix: &str) -> Result<Arc<ModuleEntry>, FrameworkError> {
        self.get(prefix).ok_or_else(|| {
            FrameworkError::validation(format!("The '{}' module is not registered", prefix))
        })
    }

    /// Numeric module id, resolved through the module repository on first use
    pub async fn module_id(&self, prefix: &str) -> Result<i64, FrameworkError> {
        if let Some(id) = self.ids.get(prefix) {
            return Ok(*id);
        }

        let id = self
            .modules
            .find_or_register(prefix)
            .await
            .map_err(FrameworkError::internal)?;
        self.ids.insert(prefix.to_string(), id);
        tracing::debug!(prefix, module_id = id, "module id resolved");
        Ok(id)
    }

    /// Drop everything cached for one module
    pub fn invalidate(&self, prefix: &str) {
        self.entries.remove(prefix);
        self.ids.remove(prefix);
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.entries.clear();
        self.ids.clear();
    }
}
