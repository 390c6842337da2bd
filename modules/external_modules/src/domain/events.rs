//! Domain events for module settings
//!
//! Project-scope writes that change the effective value publish an event so
//! that a cache layer (or anything else) can react. The default publisher
//! does nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Domain event types for settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SettingEvent {
    /// A project-scope value was written and differs from the prior one
    ProjectSettingChanged(ProjectSettingChangedEvent),
    /// A project-scope value was removed
    ProjectSettingRemoved(ProjectSettingRemovedEvent),
}

/// Event data for a changed project setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettingChangedEvent {
    /// Module directory prefix
    pub prefix: String,
    /// Project id
    pub project_id: i64,
    /// Stored (prefixed) key
    pub key: String,
    /// Value before the write (null when unset)
    pub previous: Value,
    /// Value after the write
    pub value: Value,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
}

/// Event data for a removed project setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettingRemovedEvent {
    /// Module directory prefix
    pub prefix: String,
    /// Project id
    pub project_id: i64,
    /// Stored (prefixed) key
    pub key: String,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
}

/// Event publisher trait for settings change notifications
#[async_trait::async_trait]
pub trait SettingEventPublisher: Send + Sync {
    /// Publish one settings event
    async fn publish(&self, event: SettingEvent) -> anyhow::Result<()>;
}

/// No-op event publisher for testing or when no cache layer is wired in
pub struct NoOpEventPublisher;

#[async_trait::async_trait]
impl SettingEventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: SettingEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

impl SettingEvent {
    /// Create a new ProjectSettingChanged event
    pub fn changed(prefix: &str, project_id: i64, key: &str, previous: Value, value: Value) -> Self {
        SettingEvent::ProjectSettingChanged(ProjectSettingChangedEvent {
            prefix: prefix.to_string(),
            project_id,
            key: key.to_string(),
            previous,
            value,
            timestamp: Utc::now(),
        })
    }

    /// Create a new ProjectSettingRemoved event
    pub fn removed(prefix: &str, project_id: i64, key: &str) -> Self {
        SettingEvent::ProjectSettingRemoved(ProjectSettingRemovedEvent {
            prefix: prefix.to_string(),
            project_id,
            key: key.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Module the event belongs to
    pub fn prefix(&self) -> &str {
        match self {
            SettingEvent::ProjectSettingChanged(e) => &e.prefix,
            SettingEvent::ProjectSettingRemoved(e) => &e.prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_event_creation() {
        let event = SettingEvent::changed("demo", 3, "color", Value::Null, json!("red"));

        match event {
            SettingEvent::ProjectSettingChanged(e) => {
                assert_eq!(e.prefix, "demo");
                assert_eq!(e.project_id, 3);
                assert_eq!(e.previous, Value::Null);
                assert_eq!(e.value, json!("red"));
            }
            _ => panic!("Expected ProjectSettingChanged event"),
        }
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SettingEvent::removed("demo", 3, "color");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "project_setting_removed");
        assert_eq!(event.prefix(), "demo");
    }

    #[tokio::test]
    async fn test_noop_event_publisher() {
        let publisher = NoOpEventPublisher;
        let result = publisher
            .publish(SettingEvent::removed("demo", 1, "key"))
            .await;
        assert!(result.is_ok());
    }
}
