//! Tokenizer for the log query language

use crate::contract::FrameworkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    Where,
    Group,
    Order,
    By,
    Limit,
    Offset,
    Asc,
    Desc,
    And,
    Or,
    Not,
    Is,
    Null,
    Like,
    In,
    As,
    True,
    False,
    Distinct,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_lowercase().as_str() {
            "select" => Self::Select,
            "where" => Self::Where,
            "group" => Self::Group,
            "order" => Self::Order,
            "by" => Self::By,
            "limit" => Self::Limit,
            "offset" => Self::Offset,
            "asc" => Self::Asc,
            "desc" => Self::Desc,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "is" => Self::Is,
            "null" => Self::Null,
            "like" => Self::Like,
            "in" => Self::In,
            "as" => Self::As,
            "true" => Self::True,
            "false" => Self::False,
            "distinct" => Self::Distinct,
            _ => return None,
        };
        Some(keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Comma,
    LParen,
    RParen,
    Star,
    Dot,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare identifier, as written
    Ident(String),
    /// Backtick-quoted identifier, quotes removed
    QuotedIdent(String),
    Keyword(Keyword),
    Number(String),
    /// Single-quoted string, unescaped
    Str(String),
    Symbol(Symbol),
    Eof,
}

/// Token plus its byte span in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, FrameworkError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let token = if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let word = &input[start..pos];
            match Keyword::from_word(word) {
                Some(keyword) => Token::Keyword(keyword),
                None => Token::Ident(word.to_string()),
            }
        } else if c.is_ascii_digit() {
            pos = scan_number(bytes, pos)?;
            Token::Number(input[start..pos].to_string())
        } else if c == b'\'' {
            let (value, next) = scan_string(input, pos)?;
            pos = next;
            Token::Str(value)
        } else if c == b'`' {
            let (name, next) = scan_quoted_ident(input, pos)?;
            pos = next;
            Token::QuotedIdent(name)
        } else {
            let (symbol, len) = scan_symbol(bytes, pos)?;
            pos += len;
            Token::Symbol(symbol)
        };

        tokens.push(Spanned {
            token,
            start,
            end: pos,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        start: input.len(),
        end: input.len(),
    });
    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> Result<usize, FrameworkError> {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let fraction_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == fraction_start {
            return Err(FrameworkError::syntax(format!(
                "Malformed number at position {}",
                fraction_start
            )));
        }
    }
    if pos < bytes.len() && (bytes[pos].is_ascii_alphabetic() || bytes[pos] == b'_') {
        return Err(FrameworkError::syntax(format!(
            "Unexpected character after number at position {}",
            pos
        )));
    }
    Ok(pos)
}

// '' inside a string is an escaped quote
fn scan_string(input: &str, start: usize) -> Result<(String, usize), FrameworkError> {
    let mut value = String::new();
    let mut chars = input[start + 1..].char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                value.push('\'');
                continue;
            }
            return Ok((value, start + 1 + offset + 1));
        }
        value.push(ch);
    }

    Err(FrameworkError::syntax(format!(
        "Unterminated string starting at position {}",
        start
    )))
}

fn scan_quoted_ident(input: &str, start: usize) -> Result<(String, usize), FrameworkError> {
    let rest = &input[start + 1..];
    let close = rest.find('`').ok_or_else(|| {
        FrameworkError::syntax(format!(
            "Unterminated quoted name starting at position {}",
            start
        ))
    })?;
    let name = &rest[..close];
    if name.is_empty() {
        return Err(FrameworkError::syntax(format!(
            "Empty quoted name at position {}",
            start
        )));
    }
    Ok((name.to_string(), start + 1 + close + 1))
}

fn scan_symbol(bytes: &[u8], pos: usize) -> Result<(Symbol, usize), FrameworkError> {
    let next = bytes.get(pos + 1).copied();
    let symbol = match (bytes[pos], next) {
        (b'<', Some(b'=')) => return Ok((Symbol::LtEq, 2)),
        (b'<', Some(b'>')) => return Ok((Symbol::NotEq, 2)),
        (b'>', Some(b'=')) => return Ok((Symbol::GtEq, 2)),
        (b'!', Some(b'=')) => return Ok((Symbol::NotEq, 2)),
        (b',', _) => Symbol::Comma,
        (b'(', _) => Symbol::LParen,
        (b')', _) => Symbol::RParen,
        (b'*', _) => Symbol::Star,
        (b'.', _) => Symbol::Dot,
        (b'-', Some(b'-')) => {
            return Err(FrameworkError::syntax("Comments are not allowed in log queries"))
        }
        (b'-', _) => Symbol::Minus,
        (b'=', _) => Symbol::Eq,
        (b'<', _) => Symbol::Lt,
        (b'>', _) => Symbol::Gt,
        (b';', _) => {
            return Err(FrameworkError::syntax("Only a single statement is allowed"))
        }
        (b'"', _) => {
            return Err(FrameworkError::syntax(
                "Double quotes are not supported; use single quotes for strings and backticks for names",
            ))
        }
        _ => {
            return Err(FrameworkError::syntax(format!(
                "Unexpected character at position {}",
                pos
            )))
        }
    };
    Ok((symbol, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("SELECT x WhErE"),
            vec![
                Token::Keyword(Keyword::Select),
                Token::Ident("x".to_string()),
                Token::Keyword(Keyword::Where),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_strings_and_quoted_names() {
        assert_eq!(
            kinds("`my param` = 'it''s'"),
            vec![
                Token::QuotedIdent("my param".to_string()),
                Token::Symbol(Symbol::Eq),
                Token::Str("it's".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("<= >= <> != < > ="),
            vec![
                Token::Symbol(Symbol::LtEq),
                Token::Symbol(Symbol::GtEq),
                Token::Symbol(Symbol::NotEq),
                Token::Symbol(Symbol::NotEq),
                Token::Symbol(Symbol::Lt),
                Token::Symbol(Symbol::Gt),
                Token::Symbol(Symbol::Eq),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12 3.5"),
            vec![
                Token::Number("12".to_string()),
                Token::Number("3.5".to_string()),
                Token::Eof
            ]
        );
        assert!(tokenize("3.").is_err());
        assert!(tokenize("3abc").is_err());
    }

    #[test]
    fn test_rejected_input() {
        assert!(tokenize("'unterminated").is_err());
        assert!(tokenize("`unterminated").is_err());
        assert!(tokenize("``").is_err());
        assert!(tokenize("a; delete").is_err());
        assert!(tokenize("a -- comment").is_err());
        assert!(tokenize("\"double\"").is_err());
        assert!(tokenize("a # b").is_err());
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("count(*)").unwrap();
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 5);
        assert_eq!(tokens[3].end, 8);
    }
}
