//! Contract models for the external module framework
//!
//! These models are transport-agnostic and used for inter-module communication.
//! NO serde derives - these are pure domain models.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix that marks a placeholder record id
pub const TEMPORARY_RECORD_ID_PREFIX: &str = "external-modules-temporary-record-id-";

/// Breadth of a setting's applicability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingScope {
    /// Shared by all projects
    Global,
    /// Override for a single project
    Project(i64),
}

impl SettingScope {
    /// Project id for project scope, `None` for global scope
    pub fn project_id(&self) -> Option<i64> {
        match self {
            Self::Global => None,
            Self::Project(pid) => Some(*pid),
        }
    }
}

/// A stored setting row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSetting {
    /// Numeric module id
    pub module_id: i64,
    /// Project id (`None` for global settings)
    pub project_id: Option<i64>,
    /// Fully prefixed key
    pub key: String,
    /// Typed value
    pub value: Value,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

/// Both layers of one setting, as returned by the bulk getters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingSnapshot {
    /// Value stored globally
    pub system_value: Value,
    /// Effective value for the requested scope
    pub value: Value,
}

/// Bulk settings view keyed by setting key
pub type SettingsMap = BTreeMap<String, SettingSnapshot>;

/// One instance of a sub-setting group, child key -> value
pub type SubSettingRow = BTreeMap<String, Value>;

/// Named log parameters supplied by the caller
pub type LogParameters = BTreeMap<String, Value>;

/// One row returned by a log query, in select-list order
pub type LogRow = IndexMap<String, Value>;

/// Per-request identity and context information
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    /// Currently authenticated username
    pub username: Option<String>,
    /// Project id of the current request
    pub project_id: Option<i64>,
    /// Client IP (may contain several comma separated proxy addresses)
    pub client_ip: Option<String>,
    /// Anonymous/public submission (e.g. a public survey page)
    pub is_public_submission: bool,
    /// Placeholder record id active for this request
    pub temporary_record_id: Option<String>,
}

impl RequestContext {
    /// Context for an authenticated user
    pub fn for_user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Set the project id
    pub fn with_project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Set the client IP
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// Mark the request as an anonymous/public submission
    pub fn public_submission(mut self) -> Self {
        self.is_public_submission = true;
        self
    }

    /// Set the active temporary record id
    pub fn with_temporary_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.temporary_record_id = Some(record_id.into());
        self
    }
}

/// A fully resolved log entry, ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub timestamp: DateTime<Utc>,
    pub module_id: i64,
    pub project_id: Option<i64>,
    pub username: Option<String>,
    pub record: Option<String>,
    pub ip: Option<String>,
    pub message: String,
    /// Side-table rows
    pub parameters: Vec<LogParameterRow>,
}

/// One stored log parameter: its text form plus the JSON type it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogParameterRow {
    pub name: String,
    pub value: String,
    pub value_type: &'static str,
}

/// Type tag stored next to a serialized value
pub fn value_type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Generate a fresh placeholder record id
pub fn new_temporary_record_id() -> String {
    format!("{}{}", TEMPORARY_RECORD_ID_PREFIX, uuid::Uuid::new_v4())
}

/// Whether `record_id` is a placeholder rather than a real record id
pub fn is_temporary_record_id(record_id: &str) -> bool {
    record_id
        .strip_prefix(TEMPORARY_RECORD_ID_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_record_ids_are_recognized() {
        let id = new_temporary_record_id();
        assert!(is_temporary_record_id(&id));
        assert!(!is_temporary_record_id("42"));
        assert!(!is_temporary_record_id(TEMPORARY_RECORD_ID_PREFIX));
    }

    #[test]
    fn test_value_type_tags() {
        use serde_json::json;

        assert_eq!(value_type_tag(&json!(true)), "boolean");
        assert_eq!(value_type_tag(&json!(3)), "integer");
        assert_eq!(value_type_tag(&json!(-3)), "integer");
        assert_eq!(value_type_tag(&json!(3.5)), "float");
        assert_eq!(value_type_tag(&json!("3")), "string");
        assert_eq!(value_type_tag(&json!([1])), "array");
        assert_eq!(value_type_tag(&json!({"a": 1})), "object");
    }

    #[test]
    fn test_scope_project_id() {
        assert_eq!(SettingScope::Global.project_id(), None);
        assert_eq!(SettingScope::Project(7).project_id(), Some(7));
    }
}
