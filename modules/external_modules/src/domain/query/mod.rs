//! Restricted log query language
//!
//! Callers write `select <cols> [where ...] [group by ...] [order by ...]
//! [limit n [offset m]]` using log column and parameter names. The text is
//! parsed into an expression tree ([`parser`]), every name is resolved to a
//! physical location ([`rewrite`]), module/project scoping is added, and SQL
//! is generated ([`codegen`]).
//!
//! Scoping is structural: the generated WHERE clause is always
//! `module_clause [AND project_clause] [AND (caller predicate)]`, so a caller
//! predicate can only narrow the issuing module's rows.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod rewrite;

use crate::contract::FrameworkError;
use ast::{ColumnRef, CoreColumn, Expr, LogicalOp, SelectItem, LOG_TABLE};
use codegen::{bare_parameter, value_type_column, VALUE_TYPE_COLUMN_PREFIX};
pub use codegen::SqlDialect;
use rewrite::{core_equals, resolve, ResolvedQuery};
use std::collections::HashSet;

/// Rows visible to one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryScope {
    pub module_id: i64,
    /// Restrict to this project unless the caller filters on `project_id`
    pub project_id: Option<i64>,
}

/// A translated select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedQuery {
    pub sql: String,
    /// Output column names in select-list order
    pub columns: Vec<String>,
    /// Per output column: for a bare parameter reference, the hidden column
    /// carrying the stored value type
    pub value_type_columns: Vec<Option<String>>,
}

impl TranslatedQuery {
    /// Every column the SQL returns, hidden value type columns last
    pub fn result_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .chain(self.value_type_columns.iter().flatten())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogQueryTranslator {
    dialect: SqlDialect,
}

impl LogQueryTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Translate a caller `select` into scoped SQL
    pub fn translate_select(
        &self,
        text: &str,
        scope: &QueryScope,
    ) -> Result<TranslatedQuery, FrameworkError> {
        let resolved = scoped(resolve(parser::parse(text)?), scope);
        ensure_module_scope(&resolved, scope)?;
        ensure_distinct_columns(&resolved.columns)?;

        let value_type_columns = resolved
            .query
            .select
            .iter()
            .enumerate()
            .map(|(i, item)| bare_parameter(&item.expr).map(|_| value_type_column(i)))
            .collect();

        Ok(TranslatedQuery {
            sql: codegen::render_select(&resolved, self.dialect)?,
            columns: resolved.columns,
            value_type_columns,
        })
    }

    /// Translate a bare predicate into a scoped DELETE of matching entries.
    ///
    /// Parameter rows go with their entry through the foreign key cascade.
    pub fn translate_delete(
        &self,
        predicate: &str,
        scope: &QueryScope,
    ) -> Result<String, FrameworkError> {
        let predicate = predicate.trim();
        if predicate.is_empty() {
            return Err(FrameworkError::validation(
                "A condition is required when removing log entries",
            ));
        }

        let mut query = parser::parse(&format!("select 1 where {}", predicate))?;
        if !query.group_by.is_empty() || !query.order_by.is_empty() || query.limit.is_some() {
            return Err(FrameworkError::syntax(
                "Only a condition may be given when removing log entries",
            ));
        }

        let module_column = CoreColumn::ExternalModuleId.name();
        if query.references_anywhere(module_column) {
            return Err(FrameworkError::permission(format!(
                "The '{}' column is set automatically and cannot be used when removing log entries",
                module_column
            )));
        }

        let log_id = CoreColumn::LogId.name();
        query.select = vec![SelectItem {
            expr: Expr::Column(ColumnRef::unresolved(log_id)),
            alias: None,
            source: log_id.to_string(),
        }];

        let resolved = scoped(resolve(query), scope);
        ensure_module_scope(&resolved, scope)?;
        let doomed = codegen::render_select(&resolved, self.dialect)?;

        Ok(format!(
            "DELETE FROM {log} WHERE {log_id} IN (SELECT {log_id} FROM ({doomed}) AS doomed_logs)",
            log = LOG_TABLE,
            log_id = log_id,
            doomed = doomed
        ))
    }
}

fn scoped(mut resolved: ResolvedQuery, scope: &QueryScope) -> ResolvedQuery {
    let caller = resolved.query.where_clause.take();

    let mut conditions = vec![core_equals(CoreColumn::ExternalModuleId, scope.module_id)];
    if let Some(project_id) = scope.project_id {
        let filters_project = caller
            .as_ref()
            .is_some_and(|expr| expr.references(CoreColumn::ProjectId.name()));
        if !filters_project {
            conditions.push(core_equals(CoreColumn::ProjectId, project_id));
        }
    }
    conditions.extend(caller);

    resolved.query.where_clause = Some(Expr::Logical {
        op: LogicalOp::And,
        operands: conditions,
    });
    resolved
}

// Result rows are keyed by column name, so names must not collide
fn ensure_distinct_columns(columns: &[String]) -> Result<(), FrameworkError> {
    let mut seen = HashSet::new();
    for name in columns {
        if name.starts_with(VALUE_TYPE_COLUMN_PREFIX) {
            return Err(FrameworkError::syntax(format!(
                "Column names starting with '{}' are reserved",
                VALUE_TYPE_COLUMN_PREFIX
            )));
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(FrameworkError::syntax(format!(
                "The '{}' column is selected more than once. Use 'as' to give each one a distinct name.",
                name
            )));
        }
    }
    Ok(())
}

// The first top-level conjunct must be the module clause
fn ensure_module_scope(resolved: &ResolvedQuery, scope: &QueryScope) -> Result<(), FrameworkError> {
    let expected = core_equals(CoreColumn::ExternalModuleId, scope.module_id);
    match &resolved.query.where_clause {
        Some(Expr::Logical {
            op: LogicalOp::And,
            operands,
        }) if operands.first() == Some(&expected) => Ok(()),
        _ => Err(FrameworkError::permission(
            "Log statements must be limited to the issuing module",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: QueryScope = QueryScope {
        module_id: 3,
        project_id: None,
    };
    const MODULE_CLAUSE: &str = "WHERE external_modules_log.external_module_id = 3";

    fn translator() -> LogQueryTranslator {
        LogQueryTranslator::new(SqlDialect::Sqlite)
    }

    fn select(text: &str) -> String {
        translator().translate_select(text, &SCOPE).unwrap().sql
    }

    #[test]
    fn test_module_clause_is_always_first() {
        let sql = select("select message");
        assert!(sql.ends_with(MODULE_CLAUSE), "{}", sql);

        let sql = select("select message where x = 'a'");
        assert!(
            sql.ends_with("WHERE external_modules_log.external_module_id = 3 AND p0.value = 'a'"),
            "{}",
            sql
        );
    }

    #[test]
    fn test_permissive_predicates_stay_inside_scope() {
        for text in [
            "select message where 1 = 1 or 1 = 1",
            "select message where message = 'x' or 1 = 1",
            "select message where (1 = 1) or (external_module_id = 4)",
            "select message where external_module_id = 4 or external_module_id <> 4",
        ] {
            let sql = select(text);
            let tail = sql.split(MODULE_CLAUSE).nth(1).unwrap();
            assert!(tail.starts_with(" AND ("), "{} -> {}", text, sql);
            assert!(tail.ends_with(')'), "{} -> {}", text, sql);
        }
    }

    #[test]
    fn test_disguised_module_references_only_narrow() {
        for text in [
            "select message where external_module_id = 4",
            "select message where (external_module_id) = 4",
            "select message where `external_module_id` = 4",
            "select message where abs(external_module_id) = 4",
            "select message where external_module_id in (3, 4)",
            "select message where EXTERNAL_MODULE_ID = 4",
            "select message where External_Module_Id = 4 or 1 = 1",
            "select external_module_id",
        ] {
            let sql = select(text);
            assert!(sql.contains(MODULE_CLAUSE), "{} -> {}", text, sql);
        }
    }

    #[test]
    fn test_qualified_and_smuggled_names_are_rejected() {
        for text in [
            "select message where external_modules_log.external_module_id = 4",
            "select message where x = 1; delete from external_modules_log",
            "select message where x = 1 -- and",
            "select message from external_modules_log",
            "select message where x in (select log_id)",
            "select message where \"external_module_id\" = 4",
        ] {
            assert!(
                matches!(
                    translator().translate_select(text, &SCOPE),
                    Err(FrameworkError::Syntax { .. })
                ),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_project_scope() {
        let scope = QueryScope {
            module_id: 3,
            project_id: Some(12),
        };
        let sql = translator()
            .translate_select("select message", &scope)
            .unwrap()
            .sql;
        assert!(sql.ends_with(
            "WHERE external_modules_log.external_module_id = 3 AND external_modules_log.project_id = 12"
        ));

        let sql = translator()
            .translate_select("select message where project_id = 5", &scope)
            .unwrap()
            .sql;
        assert!(sql.ends_with(
            "WHERE external_modules_log.external_module_id = 3 AND external_modules_log.project_id = 5"
        ));
    }

    #[test]
    fn test_columns_and_value_type_columns() {
        let translated = translator()
            .translate_select("select message, x, count(*), lower(y) as ly, z as zed", &SCOPE)
            .unwrap();
        assert_eq!(translated.columns, vec!["message", "x", "count(*)", "ly", "zed"]);
        assert_eq!(
            translated.value_type_columns,
            vec![
                None,
                Some("__value_type_1".to_string()),
                None,
                None,
                Some("__value_type_4".to_string())
            ]
        );
        assert_eq!(
            translated.result_columns(),
            vec!["message", "x", "count(*)", "ly", "zed", "__value_type_1", "__value_type_4"]
        );
        assert!(translated.sql.contains("p0.value_type AS \"__value_type_1\""));
        assert!(translated.sql.contains("p2.value_type AS \"__value_type_4\""));
    }

    #[test]
    fn test_duplicate_output_names_are_rejected() {
        for text in [
            "select message, message",
            "select x, x",
            "select log_id as x, x",
            "select message, MESSAGE",
            "select x as __value_type_0",
        ] {
            assert!(
                matches!(
                    translator().translate_select(text, &SCOPE),
                    Err(FrameworkError::Syntax { .. })
                ),
                "{}",
                text
            );
        }
        assert!(translator()
            .translate_select("select message, message as again", &SCOPE)
            .is_ok());
    }

    #[test]
    fn test_project_scope_ignores_column_case() {
        let scope = QueryScope {
            module_id: 3,
            project_id: Some(12),
        };
        let sql = translator()
            .translate_select("select message where PROJECT_ID is null", &scope)
            .unwrap()
            .sql;
        assert!(
            sql.ends_with(
                "WHERE external_modules_log.external_module_id = 3 AND external_modules_log.project_id IS NULL"
            ),
            "{}",
            sql
        );
        assert!(!sql.contains("LEFT JOIN"), "{}", sql);
    }

    #[test]
    fn test_joins_are_deduplicated() {
        let sql = select("select x, x as again where x = 1 order by x");
        assert_eq!(sql.matches("LEFT JOIN").count(), 1);
    }

    #[test]
    fn test_delete_requires_a_condition() {
        assert!(matches!(
            translator().translate_delete("  ", &SCOPE),
            Err(FrameworkError::Validation { .. })
        ));
    }

    #[test]
    fn test_delete_rejects_module_column() {
        for predicate in [
            "external_module_id = 1",
            "EXTERNAL_MODULE_ID = 1",
            "x = 1 or External_Module_Id > 0",
            "(external_module_id = 1)",
            "`external_module_id` = 1",
            "message = 'x' or lower(external_module_id) = '1'",
            "not external_module_id is null",
        ] {
            assert!(
                matches!(
                    translator().translate_delete(predicate, &SCOPE),
                    Err(FrameworkError::Permission { .. })
                ),
                "{}",
                predicate
            );
        }
    }

    #[test]
    fn test_delete_rejects_trailing_clauses() {
        for predicate in ["x = 1 order by log_id", "x = 1 limit 1", "x = 1 group by x"] {
            assert!(matches!(
                translator().translate_delete(predicate, &SCOPE),
                Err(FrameworkError::Syntax { .. })
            ));
        }
    }

    #[test]
    fn test_delete_statement() {
        let sql = translator()
            .translate_delete("x = 'a' or 1 = 1", &SCOPE)
            .unwrap();
        assert_eq!(
            sql,
            "DELETE FROM external_modules_log WHERE log_id IN (SELECT log_id FROM (\
             SELECT external_modules_log.log_id AS \"log_id\" FROM external_modules_log \
             LEFT JOIN external_modules_log_parameters p0 ON p0.log_id = external_modules_log.log_id AND p0.name = 'x' \
             WHERE external_modules_log.external_module_id = 3 AND (p0.value = 'a' OR 1 = 1)) AS doomed_logs)"
        );

        let sql = translator().translate_delete("x >= 10", &SCOPE).unwrap();
        assert!(
            sql.ends_with(
                "AND CASE WHEN p0.value_type IN ('integer', 'float', 'boolean') \
                 THEN CAST(p0.value AS NUMERIC) END >= 10) AS doomed_logs)"
            ),
            "{}",
            sql
        );
    }

    #[test]
    fn test_mysql_quoting() {
        let sql = LogQueryTranslator::new(SqlDialect::MySql)
            .translate_select("select message where message = 'a\\'' or 1=1'", &SCOPE)
            .unwrap()
            .sql;
        assert!(sql.contains("AS `message`"));
        assert!(sql.contains("message = 'a\\\\'' or 1=1'"), "{}", sql);
    }
}
