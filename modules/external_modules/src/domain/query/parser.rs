//! Recursive-descent parser for the log query language
//!
//! ```text
//! query     := SELECT item ("," item)* [WHERE expr] [GROUP BY expr ("," expr)*]
//!              [ORDER BY expr [ASC|DESC] ("," ...)*] [LIMIT n [OFFSET n]]
//! item      := expr [AS name]
//! expr      := and (OR and)*
//! and       := not (AND not)*
//! not       := NOT not | predicate
//! predicate := operand [cmp operand | IS [NOT] NULL | [NOT] LIKE operand
//!              | [NOT] IN "(" operand ("," operand)* ")"]
//! operand   := literal | name | function "(" args ")" | "(" expr ")"
//! ```

use super::ast::{
    ColumnRef, ComparisonOp, Expr, Literal, LogicalOp, OrderItem, Query, SelectItem,
    SortDirection,
};
use super::lexer::{tokenize, Keyword, Spanned, Symbol, Token};
use crate::contract::FrameworkError;

/// Functions callers may use in log queries
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "count", "sum", "min", "max", "avg", "lower", "upper", "length", "coalesce", "ifnull", "abs",
    "round", "trim", "date",
];

/// Deepest nesting of parentheses, function calls and `not` a query may use
pub const MAX_NESTING_DEPTH: usize = 64;

pub fn parse(input: &str) -> Result<Query, FrameworkError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.query()
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].token
    }

    fn start(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].start
    }

    fn previous_end(&self) -> usize {
        match self.pos {
            0 => 0,
            pos => self.tokens[pos - 1].end,
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek() == &Token::Keyword(keyword) {
            self.advance();
            return true;
        }
        false
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        if self.peek() == &Token::Symbol(symbol) {
            self.advance();
            return true;
        }
        false
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), FrameworkError> {
        if self.eat_keyword(keyword) {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> Result<(), FrameworkError> {
        if self.eat_symbol(symbol) {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn unexpected(&self) -> FrameworkError {
        let spanned = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        match spanned.token {
            Token::Eof => FrameworkError::syntax("Unexpected end of query"),
            _ => FrameworkError::syntax(format!(
                "Unexpected '{}' at position {}",
                &self.input[spanned.start..spanned.end],
                spanned.start
            )),
        }
    }

    fn query(&mut self) -> Result<Query, FrameworkError> {
        if !self.eat_keyword(Keyword::Select) {
            return Err(FrameworkError::syntax(
                "Queries must start with a 'select' statement",
            ));
        }

        let mut query = Query {
            select: self.select_list()?,
            ..Query::default()
        };

        if self.eat_keyword(Keyword::Where) {
            query.where_clause = Some(self.expr()?);
        }

        if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            loop {
                query.group_by.push(self.expr()?);
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
        }

        if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            loop {
                let expr = self.expr()?;
                let direction = if self.eat_keyword(Keyword::Asc) {
                    Some(SortDirection::Asc)
                } else if self.eat_keyword(Keyword::Desc) {
                    Some(SortDirection::Desc)
                } else {
                    None
                };
                query.order_by.push(OrderItem { expr, direction });
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
        }

        if self.eat_keyword(Keyword::Limit) {
            query.limit = Some(self.unsigned()?);
            if self.eat_keyword(Keyword::Offset) {
                query.offset = Some(self.unsigned()?);
            }
        }

        if self.peek() != &Token::Eof {
            return Err(self.unexpected());
        }
        Ok(query)
    }

    fn select_list(&mut self) -> Result<Vec<SelectItem>, FrameworkError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == &Token::Symbol(Symbol::Star) {
                return Err(FrameworkError::syntax(
                    "'select *' is not supported, list the columns to return",
                ));
            }

            let start = self.start();
            let expr = self.expr()?;
            let source = self.input[start..self.previous_end()].trim().to_string();

            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.name()?)
            } else {
                None
            };

            items.push(SelectItem {
                expr,
                alias,
                source,
            });
            if !self.eat_symbol(Symbol::Comma) {
                return Ok(items);
            }
        }
    }

    fn name(&mut self) -> Result<String, FrameworkError> {
        match self.peek().clone() {
            Token::Ident(name) | Token::QuotedIdent(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn unsigned(&mut self) -> Result<u64, FrameworkError> {
        if let Token::Number(digits) = self.peek().clone() {
            if let Ok(value) = digits.parse::<u64>() {
                self.advance();
                return Ok(value);
            }
        }
        Err(self.unexpected())
    }

    fn descend(&mut self) -> Result<(), FrameworkError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(FrameworkError::syntax(format!(
                "Query nesting is too deep (at most {} levels are allowed)",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FrameworkError> {
        self.descend()?;
        let expr = self.disjunction();
        self.depth -= 1;
        expr
    }

    fn disjunction(&mut self) -> Result<Expr, FrameworkError> {
        let mut operands = vec![self.and()?];
        while self.eat_keyword(Keyword::Or) {
            operands.push(self.and()?);
        }
        Ok(logical(LogicalOp::Or, operands))
    }

    fn and(&mut self) -> Result<Expr, FrameworkError> {
        let mut operands = vec![self.not()?];
        while self.eat_keyword(Keyword::And) {
            operands.push(self.not()?);
        }
        Ok(logical(LogicalOp::And, operands))
    }

    fn not(&mut self) -> Result<Expr, FrameworkError> {
        if self.eat_keyword(Keyword::Not) {
            self.descend()?;
            let inner = self.not();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, FrameworkError> {
        let left = self.operand()?;

        let op = match self.peek() {
            Token::Symbol(Symbol::Eq) => Some(ComparisonOp::Eq),
            Token::Symbol(Symbol::NotEq) => Some(ComparisonOp::NotEq),
            Token::Symbol(Symbol::Lt) => Some(ComparisonOp::Lt),
            Token::Symbol(Symbol::LtEq) => Some(ComparisonOp::LtEq),
            Token::Symbol(Symbol::Gt) => Some(ComparisonOp::Gt),
            Token::Symbol(Symbol::GtEq) => Some(ComparisonOp::GtEq),
            Token::Keyword(Keyword::Like) => Some(ComparisonOp::Like),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            return Ok(comparison(op, left, self.operand()?));
        }

        if self.eat_keyword(Keyword::Is) {
            let negated = self.eat_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = matches!(
            (self.peek(), self.peek_at(1)),
            (
                Token::Keyword(Keyword::Not),
                Token::Keyword(Keyword::Like | Keyword::In)
            )
        );
        if negated {
            self.advance();
        }

        if self.eat_keyword(Keyword::Like) {
            return Ok(comparison(ComparisonOp::NotLike, left, self.operand()?));
        }

        if self.eat_keyword(Keyword::In) {
            self.expect_symbol(Symbol::LParen)?;
            let mut list = vec![self.operand()?];
            while self.eat_symbol(Symbol::Comma) {
                list.push(self.operand()?);
            }
            self.expect_symbol(Symbol::RParen)?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }

        Ok(left)
    }

    fn operand(&mut self) -> Result<Expr, FrameworkError> {
        match self.peek().clone() {
            Token::Number(digits) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(digits)))
            }
            Token::Symbol(Symbol::Minus) => {
                if let Token::Number(digits) = self.peek_at(1).clone() {
                    self.advance();
                    self.advance();
                    return Ok(Expr::Literal(Literal::Number(format!("-{}", digits))));
                }
                Err(self.unexpected())
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(value)))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Token::Symbol(Symbol::LParen) => {
                self.advance();
                if self.peek() == &Token::Keyword(Keyword::Select) {
                    return Err(FrameworkError::syntax("Subqueries are not supported"));
                }
                let inner = self.expr()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek_at(1) == &Token::Symbol(Symbol::LParen) => {
                self.advance();
                self.advance();
                self.function(name)
            }
            Token::Ident(name) | Token::QuotedIdent(name) => {
                self.advance();
                if self.peek() == &Token::Symbol(Symbol::Dot) {
                    return Err(FrameworkError::syntax(format!(
                        "Qualified names are not supported (found '{}.')",
                        name
                    )));
                }
                Ok(Expr::Column(ColumnRef::unresolved(name)))
            }
            Token::Symbol(Symbol::Star) => Err(FrameworkError::syntax(
                "'*' is only allowed as the argument of count()",
            )),
            _ => Err(self.unexpected()),
        }
    }

    // Called with the opening parenthesis already consumed
    fn function(&mut self, name: String) -> Result<Expr, FrameworkError> {
        let name = name.to_ascii_lowercase();
        if !ALLOWED_FUNCTIONS.contains(&name.as_str()) {
            return Err(FrameworkError::syntax(format!(
                "The '{}' function is not supported",
                name
            )));
        }

        let distinct = self.eat_keyword(Keyword::Distinct);
        let mut args = Vec::new();

        if self.eat_symbol(Symbol::Star) {
            if name != "count" || distinct {
                return Err(FrameworkError::syntax(
                    "'*' is only allowed as the argument of count()",
                ));
            }
            args.push(Expr::Wildcard);
        } else {
            args.push(self.expr()?);
            while self.eat_symbol(Symbol::Comma) {
                args.push(self.expr()?);
            }
        }

        self.expect_symbol(Symbol::RParen)?;
        Ok(Expr::Function {
            name,
            distinct,
            args,
        })
    }
}

fn logical(op: LogicalOp, mut operands: Vec<Expr>) -> Expr {
    if operands.len() == 1 {
        return operands.remove(0);
    }
    Expr::Logical { op, operands }
}

fn comparison(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
    Expr::Comparison {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::ast::ColumnTarget;

    fn column(name: &str) -> Expr {
        Expr::Column(ColumnRef::unresolved(name))
    }

    fn syntax_message(input: &str) -> String {
        match parse(input) {
            Err(FrameworkError::Syntax { message }) => message,
            other => panic!("expected syntax error for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_minimal_select() {
        let query = parse("select message").unwrap();
        assert_eq!(query.select.len(), 1);
        assert_eq!(query.select[0].expr, column("message"));
        assert_eq!(query.where_clause, None);
    }

    #[test]
    fn test_must_start_with_select() {
        assert_eq!(
            syntax_message("delete from x"),
            "Queries must start with a 'select' statement"
        );
        assert_eq!(
            syntax_message(""),
            "Queries must start with a 'select' statement"
        );
    }

    #[test]
    fn test_full_statement() {
        let query = parse(
            "SELECT log_id, count(*) AS total, `my param` WHERE a = 1 AND (b = 'x' OR c IS NOT NULL) \
             GROUP BY log_id ORDER BY timestamp DESC, log_id LIMIT 10 OFFSET 5",
        )
        .unwrap();

        assert_eq!(query.select.len(), 3);
        assert_eq!(query.select[1].alias.as_deref(), Some("total"));
        assert_eq!(query.select[1].source, "count(*)");
        assert_eq!(query.select[2].expr, column("my param"));
        assert_eq!(query.group_by, vec![column("log_id")]);
        assert_eq!(query.order_by.len(), 2);
        assert_eq!(query.order_by[0].direction, Some(SortDirection::Desc));
        assert_eq!(query.order_by[1].direction, None);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));

        match query.where_clause.unwrap() {
            Expr::Logical {
                op: LogicalOp::And,
                operands,
            } => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(
                    operands[1],
                    Expr::Logical {
                        op: LogicalOp::Or,
                        ..
                    }
                ));
            }
            other => panic!("unexpected where clause {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let query = parse("select a where a = 1 or b = 2 and c = 3").unwrap();
        match query.where_clause.unwrap() {
            Expr::Logical {
                op: LogicalOp::Or,
                operands,
            } => assert!(matches!(
                operands[1],
                Expr::Logical {
                    op: LogicalOp::And,
                    ..
                }
            )),
            other => panic!("unexpected where clause {:?}", other),
        }
    }

    #[test]
    fn test_predicates() {
        let query = parse(
            "select a where a not like 'x%' and b in (1, 2) and c not in ('a') and not d = -3",
        )
        .unwrap();
        let Some(Expr::Logical { operands, .. }) = query.where_clause else {
            panic!("expected conjunction");
        };
        assert!(matches!(
            operands[0],
            Expr::Comparison {
                op: ComparisonOp::NotLike,
                ..
            }
        ));
        assert!(matches!(operands[1], Expr::InList { negated: false, .. }));
        assert!(matches!(operands[2], Expr::InList { negated: true, .. }));
        match &operands[3] {
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Comparison { right, .. } => assert_eq!(
                    right.as_ref(),
                    &Expr::Literal(Literal::Number("-3".to_string()))
                ),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_until_rewritten() {
        let query = parse("select record").unwrap();
        let Expr::Column(column) = &query.select[0].expr else {
            panic!("expected column");
        };
        assert_eq!(column.target, ColumnTarget::Unresolved);
    }

    #[test]
    fn test_rejected_constructs() {
        syntax_message("select *");
        syntax_message("select a.b");
        syntax_message("select `a`.b");
        syntax_message("select a where (select 1)");
        syntax_message("select sleep(10)");
        syntax_message("select sum(*)");
        syntax_message("select a where a = 1 = 2");
        syntax_message("select a where");
        syntax_message("select a limit 'x'");
        syntax_message("select a limit 1.5");
        syntax_message("select a from b");
        syntax_message("select a where a in ()");
        syntax_message("select a union select b");
    }

    #[test]
    fn test_nesting_is_bounded() {
        let parens = format!("select a where {}a = 1{}", "(".repeat(3000), ")".repeat(3000));
        assert!(syntax_message(&parens).contains("too deep"));

        let nots = format!("select a where {}a = 1", "not ".repeat(3000));
        assert!(syntax_message(&nots).contains("too deep"));

        let calls = format!("select {}a{}", "abs(".repeat(3000), ")".repeat(3000));
        assert!(syntax_message(&calls).contains("too deep"));

        let shallow = format!("select a where {}a = 1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn test_function_names_are_case_insensitive() {
        let query = parse("select COUNT(distinct record)").unwrap();
        assert_eq!(
            query.select[0].expr,
            Expr::Function {
                name: "count".to_string(),
                distinct: true,
                args: vec![column("record")],
            }
        );
    }
}
