//! Module log: writes, scoped queries and scoped deletes
//!
//! A log entry is one core row plus one `(log_id, name, value, value_type)`
//! row per named parameter. Values are stored as text next to the JSON type
//! they were logged with, so queries compare and return them typed.

use super::query::ast::CoreColumn;
use super::query::rewrite::USERNAME_COLUMN;
use super::query::{LogQueryTranslator, QueryScope};
use super::registry::ModuleRegistry;
use super::repository::LogRepository;
use crate::contract::{
    is_temporary_record_id, value_type_tag, FrameworkError, LogParameterRow, LogParameters,
    LogRow, NewLogEntry, RequestContext,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Parameter names that always come from the framework. `timestamp`,
/// `username`, `project_id` and `record` may be set by trusted callers.
pub const RESERVED_PARAMETERS: &[&str] = &["log_id", "external_module_id", "ui_id", "ip", "message"];

/// Core columns an untrusted caller may never set (`record` excepted for
/// temporary ids)
pub const UNTRUSTED_FORBIDDEN: &[&str] =
    &["timestamp", "username", "ip", "project_id", "record", "message"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct LogService {
    repo: Arc<dyn LogRepository>,
    registry: Arc<ModuleRegistry>,
    translator: LogQueryTranslator,
}

impl LogService {
    pub fn new(
        repo: Arc<dyn LogRepository>,
        registry: Arc<ModuleRegistry>,
        translator: LogQueryTranslator,
    ) -> Self {
        Self {
            repo,
            registry,
            translator,
        }
    }

    /// Write an entry from a trusted path, returns the new log id.
    ///
    /// `bound_record` is the record the module instance is currently bound
    /// to; it is used when no `record` parameter is given.
    pub async fn write(
        &self,
        prefix: &str,
        message: &str,
        parameters: LogParameters,
        ctx: &RequestContext,
        bound_record: Option<&str>,
    ) -> Result<i64, FrameworkError> {
        let module_id = self.registry.module_id(prefix).await?;
        let entry = build_entry(module_id, message, parameters, ctx, bound_record)?;

        let log_id = self
            .repo
            .insert(&entry)
            .await
            .map_err(FrameworkError::internal)?;
        tracing::debug!(
            prefix,
            log_id,
            parameters = entry.parameters.len(),
            "log entry written"
        );
        Ok(log_id)
    }

    /// Write an entry on behalf of a browser request
    pub async fn write_untrusted(
        &self,
        prefix: &str,
        message: &str,
        parameters: LogParameters,
        ctx: &RequestContext,
        bound_record: Option<&str>,
    ) -> Result<i64, FrameworkError> {
        check_untrusted(&parameters)?;
        self.write(prefix, message, parameters, ctx, bound_record)
            .await
    }

    /// Run a caller `select` against this module's entries
    pub async fn query(
        &self,
        prefix: &str,
        text: &str,
        project_id: Option<i64>,
    ) -> Result<Vec<LogRow>, FrameworkError> {
        let scope = QueryScope {
            module_id: self.registry.module_id(prefix).await?,
            project_id,
        };
        let translated = self.translator.translate_select(text, &scope)?;
        tracing::debug!(prefix, sql = %translated.sql, "running log query");

        let mut rows = self
            .repo
            .query(&translated.sql, &translated.result_columns())
            .await
            .map_err(FrameworkError::internal)?;

        for row in &mut rows {
            for (column, type_column) in translated
                .columns
                .iter()
                .zip(&translated.value_type_columns)
            {
                let Some(type_column) = type_column else {
                    continue;
                };
                let value_type = row.shift_remove(type_column);
                if let Some(value) = row.get_mut(column) {
                    *value = typed_parameter_value(
                        std::mem::take(value),
                        value_type.as_ref().and_then(Value::as_str),
                    );
                }
            }
        }

        Ok(rows)
    }

    /// Delete this module's entries matching `predicate`
    pub async fn remove(
        &self,
        prefix: &str,
        predicate: &str,
        project_id: Option<i64>,
    ) -> Result<u64, FrameworkError> {
        let scope = QueryScope {
            module_id: self.registry.module_id(prefix).await?,
            project_id,
        };
        let sql = self.translator.translate_delete(predicate, &scope)?;
        tracing::debug!(prefix, %sql, "removing log entries");

        let removed = self
            .repo
            .delete(&sql)
            .await
            .map_err(FrameworkError::internal)?;
        tracing::info!(prefix, removed, "log entries removed");
        Ok(removed)
    }
}

fn check_untrusted(parameters: &LogParameters) -> Result<(), FrameworkError> {
    for name in UNTRUSTED_FORBIDDEN {
        let Some(value) = parameters.get(*name) else {
            continue;
        };
        if *name == "record" && value.as_str().is_some_and(is_temporary_record_id) {
            continue;
        }
        return Err(FrameworkError::permission(format!(
            "For security reasons, the '{}' parameter cannot be overridden by untrusted log requests. \
             It can only be set from a trusted server-side path.",
            name
        )));
    }
    Ok(())
}

fn build_entry(
    module_id: i64,
    message: &str,
    mut parameters: LogParameters,
    ctx: &RequestContext,
    bound_record: Option<&str>,
) -> Result<NewLogEntry, FrameworkError> {
    if message.trim().is_empty() {
        return Err(FrameworkError::validation(
            "A message is required for log entries.",
        ));
    }

    for (name, value) in &parameters {
        if RESERVED_PARAMETERS.contains(&name.as_str()) {
            return Err(FrameworkError::permission(format!(
                "The '{}' parameter name is set automatically and cannot be overridden.",
                name
            )));
        }
        if shadows_log_column(name) {
            return Err(FrameworkError::permission(format!(
                "The '{}' parameter name is reserved. Log column names are not case sensitive; use '{}' instead.",
                name,
                name.to_ascii_lowercase()
            )));
        }
        if name.is_empty() {
            return Err(FrameworkError::validation(
                "Log parameter names cannot be empty.",
            ));
        }
        if name.contains(['\'', '"', '`']) {
            return Err(FrameworkError::validation(format!(
                "Quote characters are not allowed in parameter names ({}).",
                name
            )));
        }
        if value.is_array() || value.is_object() {
            return Err(FrameworkError::validation(format!(
                "The value for the '{}' parameter must be a boolean, number, string or null.",
                name
            )));
        }
    }
    parameters.retain(|_, value| !value.is_null());

    let timestamp = match parameters.remove("timestamp") {
        Some(value) => parse_timestamp(&value)?,
        None => Utc::now(),
    };

    let username = match parameters.remove("username") {
        Some(Value::String(username)) if !username.is_empty() => Some(username),
        Some(Value::String(_)) => ctx.username.clone(),
        Some(_) => {
            return Err(FrameworkError::validation(
                "The 'username' parameter must be a string.",
            ))
        }
        None => ctx.username.clone(),
    };

    let project_id = match parameters.remove("project_id") {
        Some(value) => Some(parse_project_id(&value)?),
        None => ctx.project_id,
    };

    let record = match parameters.remove("record") {
        Some(value) => Some(parameter_text(&value)),
        None => bound_record
            .map(str::to_string)
            .or_else(|| ctx.temporary_record_id.clone()),
    }
    .filter(|record| !record.is_empty());

    // Only signed-in, non-public requests record an address
    let ip = match (&ctx.username, ctx.is_public_submission) {
        (Some(_), false) => ctx.client_ip.clone().filter(|ip| !ip.is_empty()),
        _ => None,
    };

    Ok(NewLogEntry {
        timestamp,
        module_id,
        project_id,
        username,
        record,
        ip,
        message: message.to_string(),
        parameters: parameters
            .iter()
            .map(|(name, value)| LogParameterRow {
                name: name.clone(),
                value: parameter_text(value),
                value_type: value_type_tag(value),
            })
            .collect(),
    })
}

// Queries resolve column names regardless of case, so a differently cased
// core column or `username` would never be reachable as a parameter
fn shadows_log_column(name: &str) -> bool {
    let column = CoreColumn::from_name(name).is_some() || name.eq_ignore_ascii_case(USERNAME_COLUMN);
    column && name != name.to_ascii_lowercase()
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, FrameworkError> {
    let invalid = || {
        FrameworkError::validation(format!(
            "The 'timestamp' parameter must be an RFC 3339 or '{}' date, got {}",
            TIMESTAMP_FORMAT, value
        ))
    };
    let text = value.as_str().ok_or_else(invalid)?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}

fn parse_project_id(value: &Value) -> Result<i64, FrameworkError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        FrameworkError::validation(format!(
            "The 'project_id' parameter must be an integer, got {}",
            value
        ))
    })
}

/// Text stored for a scalar parameter value
fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Stored parameter text back as the JSON type it was logged with
fn typed_parameter_value(value: Value, value_type: Option<&str>) -> Value {
    let Value::String(text) = value else {
        return value;
    };
    match value_type {
        Some("integer" | "float") => match serde_json::from_str::<Value>(&text) {
            Ok(number @ Value::Number(_)) => number,
            _ => Value::String(text),
        },
        Some("boolean") => match text.as_str() {
            "1" => Value::Bool(true),
            "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::new_temporary_record_id;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> LogParameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn entry(parameters: LogParameters, ctx: &RequestContext) -> Result<NewLogEntry, FrameworkError> {
        build_entry(1, "hello", parameters, ctx, None)
    }

    #[test]
    fn test_message_is_required() {
        let err = build_entry(1, "  ", LogParameters::new(), &RequestContext::default(), None)
            .unwrap_err();
        assert!(matches!(err, FrameworkError::Validation { .. }));
    }

    #[test]
    fn test_reserved_names_are_rejected() {
        for name in RESERVED_PARAMETERS {
            let err = entry(params(&[(*name, json!(1))]), &RequestContext::default()).unwrap_err();
            match err {
                FrameworkError::Permission { message } => assert!(message.contains(name)),
                other => panic!("expected permission error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parameter_name_and_type_checks() {
        let ctx = RequestContext::default();
        assert!(entry(params(&[("it's", json!(1))]), &ctx).is_err());
        assert!(entry(params(&[("a`b", json!(1))]), &ctx).is_err());
        assert!(entry(params(&[("list", json!([1, 2]))]), &ctx).is_err());
        assert!(entry(params(&[("map", json!({"a": 1}))]), &ctx).is_err());
    }

    #[test]
    fn test_case_variants_of_log_columns_are_rejected() {
        let ctx = RequestContext::default();
        for name in ["LOG_ID", "External_Module_Id", "Message", "RECORD", "UserName", "Timestamp"] {
            let err = entry(params(&[(name, json!("1"))]), &ctx).unwrap_err();
            match err {
                FrameworkError::Permission { message } => assert!(message.contains(name)),
                other => panic!("{}: expected permission error, got {:?}", name, other),
            }
        }
        assert!(entry(params(&[("Color", json!("red"))]), &ctx).is_ok());
        assert!(entry(params(&[("record_type", json!("a"))]), &ctx).is_ok());
    }

    fn stored(name: &str, value: &str, value_type: &'static str) -> LogParameterRow {
        LogParameterRow {
            name: name.to_string(),
            value: value.to_string(),
            value_type,
        }
    }

    #[test]
    fn test_null_parameters_are_dropped_and_scalars_stored_as_text() {
        let built = entry(
            params(&[
                ("a", Value::Null),
                ("flag", json!(true)),
                ("off", json!(false)),
                ("n", json!(5)),
                ("f", json!(1.5)),
                ("s", json!("x")),
            ]),
            &RequestContext::default(),
        )
        .unwrap();

        assert_eq!(
            built.parameters,
            vec![
                stored("f", "1.5", "float"),
                stored("flag", "1", "boolean"),
                stored("n", "5", "integer"),
                stored("off", "0", "boolean"),
                stored("s", "x", "string"),
            ]
        );
    }

    #[test]
    fn test_defaults_come_from_context() {
        let ctx = RequestContext::for_user("alice")
            .with_project(4)
            .with_client_ip("10.0.0.1, 10.0.0.2");
        let built = build_entry(1, "m", LogParameters::new(), &ctx, Some("17")).unwrap();

        assert_eq!(built.username.as_deref(), Some("alice"));
        assert_eq!(built.project_id, Some(4));
        assert_eq!(built.record.as_deref(), Some("17"));
        assert_eq!(built.ip.as_deref(), Some("10.0.0.1, 10.0.0.2"));
    }

    #[test]
    fn test_ip_needs_a_signed_in_non_public_request() {
        let anonymous = RequestContext::default().with_client_ip("1.2.3.4");
        assert_eq!(entry(LogParameters::new(), &anonymous).unwrap().ip, None);

        let survey = RequestContext::for_user("alice")
            .with_client_ip("1.2.3.4")
            .public_submission();
        assert_eq!(entry(LogParameters::new(), &survey).unwrap().ip, None);
    }

    #[test]
    fn test_trusted_overrides() {
        let ctx = RequestContext::for_user("alice").with_project(4);
        let built = entry(
            params(&[
                ("timestamp", json!("2020-01-02 03:04:05")),
                ("username", json!("bob")),
                ("project_id", json!("9")),
                ("record", json!(12)),
            ]),
            &ctx,
        )
        .unwrap();

        assert_eq!(built.timestamp.to_rfc3339(), "2020-01-02T03:04:05+00:00");
        assert_eq!(built.username.as_deref(), Some("bob"));
        assert_eq!(built.project_id, Some(9));
        assert_eq!(built.record.as_deref(), Some("12"));
        assert!(built.parameters.is_empty());
    }

    #[test]
    fn test_invalid_overrides() {
        let ctx = RequestContext::default();
        assert!(entry(params(&[("timestamp", json!("yesterday"))]), &ctx).is_err());
        assert!(entry(params(&[("project_id", json!("abc"))]), &ctx).is_err());
        assert!(entry(params(&[("username", json!(3))]), &ctx).is_err());
    }

    #[test]
    fn test_record_falls_back_to_temporary_id() {
        let temporary = new_temporary_record_id();
        let ctx = RequestContext::default().with_temporary_record_id(temporary.clone());
        assert_eq!(
            entry(LogParameters::new(), &ctx).unwrap().record,
            Some(temporary)
        );
    }

    #[test]
    fn test_untrusted_path_rejects_core_overrides() {
        for name in UNTRUSTED_FORBIDDEN {
            let err = check_untrusted(&params(&[(*name, json!("x"))])).unwrap_err();
            match err {
                FrameworkError::Permission { message } => assert!(message.contains(name)),
                other => panic!("expected permission error, got {:?}", other),
            }
        }
        assert!(check_untrusted(&params(&[("color", json!("red"))])).is_ok());
    }

    #[test]
    fn test_untrusted_path_accepts_temporary_record_ids() {
        let temporary = new_temporary_record_id();
        assert!(check_untrusted(&params(&[("record", json!(temporary))])).is_ok());
        assert!(check_untrusted(&params(&[("record", json!("12"))])).is_err());
    }

    #[test]
    fn test_typed_parameter_value() {
        assert_eq!(typed_parameter_value(json!("5"), Some("integer")), json!(5));
        assert_eq!(typed_parameter_value(json!("-2.5"), Some("float")), json!(-2.5));
        assert!(typed_parameter_value(json!("1.0"), Some("float")).is_f64());
        assert_eq!(typed_parameter_value(json!("1"), Some("boolean")), json!(true));
        assert_eq!(typed_parameter_value(json!("0"), Some("boolean")), json!(false));

        // Strings that look like numbers stay strings
        assert_eq!(typed_parameter_value(json!("02139"), Some("string")), json!("02139"));
        assert_eq!(typed_parameter_value(json!("5"), Some("string")), json!("5"));
        assert_eq!(typed_parameter_value(json!("1"), None), json!("1"));
        assert_eq!(typed_parameter_value(Value::Null, None), Value::Null);
    }
}
