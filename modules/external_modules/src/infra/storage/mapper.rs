//! Entity to model mappers
//!
//! Conversions between SeaORM entities and contract models

use super::entity::{log, log_parameter, setting};
use crate::contract::{value_type_tag, LogParameterRow, NewLogEntry, StoredSetting};
use serde_json::Value;

// ===== Setting Conversions =====

impl TryFrom<setting::Model> for StoredSetting {
    type Error = anyhow::Error;

    fn try_from(entity: setting::Model) -> Result<Self, Self::Error> {
        let value: Value = serde_json::from_str(&entity.value).map_err(|e| {
            anyhow::anyhow!(
                "stored value for setting '{}' ({}) is not valid JSON: {}",
                entity.key,
                entity.value_type,
                e
            )
        })?;

        Ok(Self {
            module_id: entity.external_module_id,
            project_id: entity.project_id,
            key: entity.key,
            value,
            updated_at: entity.updated_at,
        })
    }
}

pub fn setting_active_model(
    module_id: i64,
    project_id: Option<i64>,
    key: &str,
    value: &Value,
) -> anyhow::Result<setting::ActiveModel> {
    use sea_orm::ActiveValue::*;

    Ok(setting::ActiveModel {
        id: NotSet,
        external_module_id: Set(module_id),
        project_id: Set(project_id),
        key: Set(key.to_string()),
        value_type: Set(value_type_tag(value).to_string()),
        value: Set(serde_json::to_string(value)?),
        updated_at: Set(chrono::Utc::now()),
    })
}

// ===== Log Conversions =====

pub fn log_active_model(entry: &NewLogEntry, ui_id: Option<i64>) -> log::ActiveModel {
    use sea_orm::ActiveValue::*;

    log::ActiveModel {
        log_id: NotSet,
        timestamp: Set(entry.timestamp),
        ui_id: Set(ui_id),
        ip: Set(entry.ip.clone()),
        external_module_id: Set(entry.module_id),
        project_id: Set(entry.project_id),
        record: Set(entry.record.clone()),
        message: Set(entry.message.clone()),
    }
}

pub fn log_parameter_active_model(log_id: i64, row: &LogParameterRow) -> log_parameter::ActiveModel {
    use sea_orm::ActiveValue::*;

    log_parameter::ActiveModel {
        log_id: Set(log_id),
        name: Set(row.name.clone()),
        value: Set(row.value.clone()),
        value_type: Set(row.value_type.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_json_is_decoded_with_its_type() {
        let model = setting::Model {
            id: 1,
            external_module_id: 2,
            project_id: Some(3),
            key: "k".to_string(),
            value_type: "float".to_string(),
            value: "1.0".to_string(),
            updated_at: chrono::Utc::now(),
        };
        let stored = StoredSetting::try_from(model).unwrap();
        assert!(stored.value.is_f64());
        assert_eq!(stored.project_id, Some(3));
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let model = setting::Model {
            id: 1,
            external_module_id: 2,
            project_id: None,
            key: "k".to_string(),
            value_type: "string".to_string(),
            value: "not json".to_string(),
            updated_at: chrono::Utc::now(),
        };
        assert!(StoredSetting::try_from(model).is_err());
    }

    #[test]
    fn test_log_parameter_keeps_its_value_type() {
        use sea_orm::ActiveValue::Set;

        let row = LogParameterRow {
            name: "zip".to_string(),
            value: "02139".to_string(),
            value_type: value_type_tag(&json!("02139")),
        };
        let model = log_parameter_active_model(7, &row);
        assert_eq!(model.log_id, Set(7));
        assert_eq!(model.value, Set("02139".to_string()));
        assert_eq!(model.value_type, Set("string".to_string()));
    }
}
