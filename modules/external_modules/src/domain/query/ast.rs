//! Syntax tree for log queries

/// Physical table holding one row per log entry
pub const LOG_TABLE: &str = "external_modules_log";
/// Physical table holding named log parameters
pub const PARAMETERS_TABLE: &str = "external_modules_log_parameters";
/// Physical table holding user accounts
pub const USERS_TABLE: &str = "user_information";

/// Columns stored directly on the core log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreColumn {
    LogId,
    Timestamp,
    UiId,
    Ip,
    ExternalModuleId,
    ProjectId,
    Record,
    Message,
}

impl CoreColumn {
    pub const ALL: [CoreColumn; 8] = [
        Self::LogId,
        Self::Timestamp,
        Self::UiId,
        Self::Ip,
        Self::ExternalModuleId,
        Self::ProjectId,
        Self::Record,
        Self::Message,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LogId => "log_id",
            Self::Timestamp => "timestamp",
            Self::UiId => "ui_id",
            Self::Ip => "ip",
            Self::ExternalModuleId => "external_module_id",
            Self::ProjectId => "project_id",
            Self::Record => "record",
            Self::Message => "message",
        }
    }

    /// Column names match regardless of ASCII case, as they do in SQL
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// What a column name resolves to after rewriting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTarget {
    Unresolved,
    Core(CoreColumn),
    /// `username`, read from the users table
    Username,
    /// Index of the parameter join
    Parameter(usize),
    /// Output alias of a select item (ORDER BY / GROUP BY only)
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub name: String,
    pub target: ColumnTarget,
}

impl ColumnRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: ColumnTarget::Unresolved,
        }
    }

    pub fn core(column: CoreColumn) -> Self {
        Self {
            name: column.name().to_string(),
            target: ColumnTarget::Core(column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Digits with an optional leading minus and fraction
    Number(String),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
}

impl ComparisonOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Literal),
    /// `*`, only valid as a function argument
    Wildcard,
    Function {
        name: String,
        distinct: bool,
        args: Vec<Expr>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        operands: Vec<Expr>,
    },
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
}

impl Expr {
    /// Visit every column reference, depth first
    pub fn for_each_column<'a>(&'a self, f: &mut impl FnMut(&'a ColumnRef)) {
        match self {
            Expr::Column(column) => f(column),
            Expr::Literal(_) | Expr::Wildcard => {}
            Expr::Function { args, .. } => args.iter().for_each(|a| a.for_each_column(f)),
            Expr::Comparison { left, right, .. } => {
                left.for_each_column(f);
                right.for_each_column(f);
            }
            Expr::Logical { operands, .. } => operands.iter().for_each(|o| o.for_each_column(f)),
            Expr::Not(inner) | Expr::IsNull { expr: inner, .. } => inner.for_each_column(f),
            Expr::InList { expr, list, .. } => {
                expr.for_each_column(f);
                list.iter().for_each(|e| e.for_each_column(f));
            }
        }
    }

    /// Mutable counterpart of [`Expr::for_each_column`]
    pub fn for_each_column_mut(&mut self, f: &mut impl FnMut(&mut ColumnRef)) {
        match self {
            Expr::Column(column) => f(column),
            Expr::Literal(_) | Expr::Wildcard => {}
            Expr::Function { args, .. } => args.iter_mut().for_each(|a| a.for_each_column_mut(f)),
            Expr::Comparison { left, right, .. } => {
                left.for_each_column_mut(f);
                right.for_each_column_mut(f);
            }
            Expr::Logical { operands, .. } => {
                operands.iter_mut().for_each(|o| o.for_each_column_mut(f))
            }
            Expr::Not(inner) | Expr::IsNull { expr: inner, .. } => inner.for_each_column_mut(f),
            Expr::InList { expr, list, .. } => {
                expr.for_each_column_mut(f);
                list.iter_mut().for_each(|e| e.for_each_column_mut(f));
            }
        }
    }

    /// True when any column reference spells `name`, ignoring ASCII case
    pub fn references(&self, name: &str) -> bool {
        let mut found = false;
        self.for_each_column(&mut |c| found |= c.name.eq_ignore_ascii_case(name));
        found
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
    /// Source text of the expression, used as the output name of unnamed
    /// computed columns
    pub source: String,
}

impl SelectItem {
    /// Name the column is returned under
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            Expr::Column(column) => column.name.clone(),
            _ => self.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: Option<SortDirection>,
}

/// A parsed `select` statement
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub select: Vec<SelectItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn references_anywhere(&self, name: &str) -> bool {
        self.select.iter().any(|i| i.expr.references(name))
            || self.where_clause.as_ref().is_some_and(|e| e.references(name))
            || self.group_by.iter().any(|e| e.references(name))
            || self.order_by.iter().any(|i| i.expr.references(name))
    }
}
