//! SQL generation from resolved queries

use super::ast::{
    ColumnRef, ColumnTarget, ComparisonOp, Expr, Literal, LogicalOp, SortDirection, LOG_TABLE,
    PARAMETERS_TABLE, USERS_TABLE,
};
use super::rewrite::ResolvedQuery;
use crate::contract::FrameworkError;
use std::fmt::Write;

/// Prefix of the hidden result columns carrying parameter value types
pub const VALUE_TYPE_COLUMN_PREFIX: &str = "__value_type_";

/// Stored value types whose text casts cleanly to a number
const NUMERIC_VALUE_TYPES: &str = "('integer', 'float', 'boolean')";

/// SQL flavour of the backing database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    MySql,
    Postgres,
    Sqlite,
}

impl SqlDialect {
    pub fn quote_identifier(self, name: &str) -> String {
        let quote = match self {
            Self::MySql => '`',
            Self::Postgres | Self::Sqlite => '"',
        };
        let doubled: String = [quote, quote].iter().collect();
        format!(
            "{quote}{}{quote}",
            name.replace(quote, &doubled),
            quote = quote
        )
    }

    pub fn quote_string(self, value: &str) -> String {
        let mut escaped = value.replace('\'', "''");
        if self == Self::MySql {
            escaped = escaped.replace('\\', "\\\\");
        }
        format!("'{}'", escaped)
    }

    fn numeric_type(self) -> &'static str {
        match self {
            Self::MySql => "DECIMAL(65, 10)",
            Self::Postgres | Self::Sqlite => "NUMERIC",
        }
    }
}

/// Alias of the i-th parameter join
pub fn parameter_alias(index: usize) -> String {
    format!("p{}", index)
}

/// Hidden column holding the value type of the i-th select item
pub fn value_type_column(index: usize) -> String {
    format!("{}{}", VALUE_TYPE_COLUMN_PREFIX, index)
}

/// Join index when `expr` is a bare parameter reference
pub fn bare_parameter(expr: &Expr) -> Option<usize> {
    match expr {
        Expr::Column(ColumnRef {
            target: ColumnTarget::Parameter(index),
            ..
        }) => Some(*index),
        _ => None,
    }
}

// Bare parameter behind a GROUP BY / ORDER BY term, looking through select aliases
fn sort_parameter(resolved: &ResolvedQuery, expr: &Expr) -> Option<usize> {
    match expr {
        Expr::Column(ColumnRef {
            name,
            target: ColumnTarget::Alias,
        }) => resolved
            .query
            .select
            .iter()
            .find(|item| item.alias.as_deref() == Some(name.as_str()))
            .and_then(|item| bare_parameter(&item.expr)),
        other => bare_parameter(other),
    }
}

fn is_scalar_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Literal::Number(_) | Literal::Bool(_)))
}

// Numbers and booleans read back as numbers; other types as NULL
fn render_numeric_parameter(index: usize, dialect: SqlDialect, out: &mut String) {
    let _ = write!(
        out,
        "CASE WHEN {alias}.value_type IN {types} THEN CAST({alias}.value AS {ty}) END",
        alias = parameter_alias(index),
        types = NUMERIC_VALUE_TYPES,
        ty = dialect.numeric_type()
    );
}

pub fn render_select(resolved: &ResolvedQuery, dialect: SqlDialect) -> Result<String, FrameworkError> {
    let query = &resolved.query;
    let mut sql = String::from("SELECT ");

    for (i, item) in query.select.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        render_expr(&item.expr, dialect, &mut sql)?;
        let _ = write!(
            sql,
            " AS {}",
            dialect.quote_identifier(&resolved.columns[i])
        );
    }
    for (i, item) in query.select.iter().enumerate() {
        if let Some(index) = bare_parameter(&item.expr) {
            let _ = write!(
                sql,
                ", {}.value_type AS {}",
                parameter_alias(index),
                dialect.quote_identifier(&value_type_column(i))
            );
        }
    }

    let _ = write!(sql, " FROM {}", LOG_TABLE);
    if resolved.joins_users {
        let _ = write!(
            sql,
            " LEFT JOIN {users} ON {users}.ui_id = {log}.ui_id",
            users = USERS_TABLE,
            log = LOG_TABLE
        );
    }
    for (index, name) in resolved.parameters.iter().enumerate() {
        let _ = write!(
            sql,
            " LEFT JOIN {params} {alias} ON {alias}.log_id = {log}.log_id AND {alias}.name = {name}",
            params = PARAMETERS_TABLE,
            alias = parameter_alias(index),
            log = LOG_TABLE,
            name = dialect.quote_string(name)
        );
    }

    if let Some(expr) = &query.where_clause {
        sql.push_str(" WHERE ");
        render_expr(expr, dialect, &mut sql)?;
    }

    if !query.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        for (i, expr) in query.group_by.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match sort_parameter(resolved, expr) {
                Some(index) => {
                    let alias = parameter_alias(index);
                    let _ = write!(sql, "{alias}.value, {alias}.value_type", alias = alias);
                }
                None => render_expr(expr, dialect, &mut sql)?,
            }
        }
    }

    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        for (i, item) in query.order_by.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let direction = match item.direction {
                Some(SortDirection::Asc) => " ASC",
                Some(SortDirection::Desc) => " DESC",
                None => "",
            };
            // Numeric values sort as numbers, ties and text values by their text
            match sort_parameter(resolved, &item.expr) {
                Some(index) => {
                    render_numeric_parameter(index, dialect, &mut sql);
                    let _ = write!(
                        sql,
                        "{dir}, {}.value{dir}",
                        parameter_alias(index),
                        dir = direction
                    );
                }
                None => {
                    render_expr(&item.expr, dialect, &mut sql)?;
                    sql.push_str(direction);
                }
            }
        }
    }

    if let Some(limit) = query.limit {
        let _ = write!(sql, " LIMIT {}", limit);
        if let Some(offset) = query.offset {
            let _ = write!(sql, " OFFSET {}", offset);
        }
    }

    Ok(sql)
}

fn render_column(column: &ColumnRef, dialect: SqlDialect, out: &mut String) -> Result<(), FrameworkError> {
    match column.target {
        ColumnTarget::Core(core) => {
            let _ = write!(out, "{}.{}", LOG_TABLE, core.name());
        }
        ColumnTarget::Username => {
            let _ = write!(out, "{}.username", USERS_TABLE);
        }
        ColumnTarget::Parameter(index) => {
            let _ = write!(out, "{}.value", parameter_alias(index));
        }
        ColumnTarget::Alias => out.push_str(&dialect.quote_identifier(&column.name)),
        ColumnTarget::Unresolved => {
            return Err(FrameworkError::internal(anyhow::anyhow!(
                "column '{}' reached SQL generation unresolved",
                column.name
            )))
        }
    }
    Ok(())
}

fn is_atomic(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard | Expr::Function { .. }
    )
}

// Non-atomic operands of comparisons and predicates are parenthesized
fn render_operand(expr: &Expr, dialect: SqlDialect, out: &mut String) -> Result<(), FrameworkError> {
    if is_atomic(expr) {
        return render_expr(expr, dialect, out);
    }
    out.push('(');
    render_expr(expr, dialect, out)?;
    out.push(')');
    Ok(())
}

// In a numeric comparison parameters are cast and booleans become 1/0
fn render_comparand(
    expr: &Expr,
    numeric: bool,
    dialect: SqlDialect,
    out: &mut String,
) -> Result<(), FrameworkError> {
    if numeric {
        if let Some(index) = bare_parameter(expr) {
            render_numeric_parameter(index, dialect, out);
            return Ok(());
        }
        if let Expr::Literal(Literal::Bool(value)) = expr {
            out.push(if *value { '1' } else { '0' });
            return Ok(());
        }
    }
    render_operand(expr, dialect, out)
}

fn render_expr(expr: &Expr, dialect: SqlDialect, out: &mut String) -> Result<(), FrameworkError> {
    match expr {
        Expr::Column(column) => render_column(column, dialect, out)?,
        Expr::Literal(Literal::Number(digits)) => out.push_str(digits),
        Expr::Literal(Literal::Str(value)) => out.push_str(&dialect.quote_string(value)),
        Expr::Literal(Literal::Bool(true)) => out.push_str("TRUE"),
        Expr::Literal(Literal::Bool(false)) => out.push_str("FALSE"),
        Expr::Literal(Literal::Null) => out.push_str("NULL"),
        Expr::Wildcard => out.push('*'),
        Expr::Function {
            name,
            distinct,
            args,
        } => {
            out.push_str(&name.to_ascii_uppercase());
            out.push('(');
            if *distinct {
                out.push_str("DISTINCT ");
            }
            let numeric = matches!(name.as_str(), "sum" | "avg");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match bare_parameter(arg) {
                    Some(index) if numeric => render_numeric_parameter(index, dialect, out),
                    _ => render_expr(arg, dialect, out)?,
                }
            }
            out.push(')');
        }
        Expr::Comparison { op, left, right } => {
            let numeric = !matches!(op, ComparisonOp::Like | ComparisonOp::NotLike)
                && ((bare_parameter(left).is_some() && is_scalar_literal(right))
                    || (bare_parameter(right).is_some() && is_scalar_literal(left)));
            render_comparand(left, numeric, dialect, out)?;
            let _ = write!(out, " {} ", op.as_sql());
            render_comparand(right, numeric, dialect, out)?;
        }
        Expr::Logical { op, operands } => {
            let joiner = match op {
                LogicalOp::And => " AND ",
                LogicalOp::Or => " OR ",
            };
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    out.push_str(joiner);
                }
                if let Expr::Logical { .. } = operand {
                    out.push('(');
                    render_expr(operand, dialect, out)?;
                    out.push(')');
                } else {
                    render_expr(operand, dialect, out)?;
                }
            }
        }
        Expr::Not(inner) => {
            out.push_str("NOT ");
            out.push('(');
            render_expr(inner, dialect, out)?;
            out.push(')');
        }
        Expr::IsNull { expr, negated } => {
            render_operand(expr, dialect, out)?;
            out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let numeric = bare_parameter(expr).is_some() && list.iter().all(is_scalar_literal);
            render_comparand(expr, numeric, dialect, out)?;
            out.push_str(if *negated { " NOT IN (" } else { " IN (" });
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_comparand(item, numeric, dialect, out)?;
            }
            out.push(')');
        }
    }
    Ok(())
}
