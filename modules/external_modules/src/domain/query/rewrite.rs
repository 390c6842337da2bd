//! Name resolution: maps every column reference to a core column, the user
//! table, a parameter join or a select alias.

use super::ast::{ColumnRef, ColumnTarget, ComparisonOp, CoreColumn, Expr, Literal, Query};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Name of the pseudo-column served by the users table
pub const USERNAME_COLUMN: &str = "username";

/// A query whose column references are all resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub query: Query,
    /// Parameter names in join order; the index is the join alias number
    pub parameters: IndexSet<String>,
    pub joins_users: bool,
    /// Output column names, in select-list order
    pub columns: Vec<String>,
}

pub fn resolve(mut query: Query) -> ResolvedQuery {
    let mut parameters = IndexSet::new();
    let mut joins_users = false;

    let aliases: HashSet<String> = query
        .select
        .iter()
        .filter_map(|item| item.alias.clone())
        .collect();

    let mut resolve_column = |column: &mut ColumnRef, allow_alias: bool| {
        column.target = if allow_alias && aliases.contains(&column.name) {
            ColumnTarget::Alias
        } else if let Some(core) = CoreColumn::from_name(&column.name) {
            ColumnTarget::Core(core)
        } else if column.name.eq_ignore_ascii_case(USERNAME_COLUMN) {
            joins_users = true;
            ColumnTarget::Username
        } else {
            let (index, _) = parameters.insert_full(column.name.clone());
            ColumnTarget::Parameter(index)
        };
    };

    for item in &mut query.select {
        item.expr
            .for_each_column_mut(&mut |c| resolve_column(c, false));
    }
    if let Some(expr) = &mut query.where_clause {
        expr.for_each_column_mut(&mut |c| resolve_column(c, false));
    }
    for expr in &mut query.group_by {
        expr.for_each_column_mut(&mut |c| resolve_column(c, true));
    }
    for item in &mut query.order_by {
        item.expr
            .for_each_column_mut(&mut |c| resolve_column(c, true));
    }

    let columns = query.select.iter().map(|item| item.output_name()).collect();

    ResolvedQuery {
        query,
        parameters,
        joins_users,
        columns,
    }
}

/// `column = value` against a resolved core column
pub fn core_equals(column: CoreColumn, value: i64) -> Expr {
    Expr::Comparison {
        op: ComparisonOp::Eq,
        left: Box::new(Expr::Column(ColumnRef::core(column))),
        right: Box::new(Expr::Literal(Literal::Number(value.to_string()))),
    }
}
