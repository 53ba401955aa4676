//! Security expression language.
//!
//! ```text
//! expr   := term   (("or"  | "||") term)*
//! term   := factor (("and" | "&&") factor)*
//! factor := "(" expr ")" | pred
//! pred   := ("hasRole" | "hasAuthority") "(" string ")"
//! string := '...' | "..."
//! ```
//!
//! `and` binds tighter than `or`. Keywords and predicate names are
//! case-insensitive; role and authority names are not.

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Deepest parenthesis nesting accepted by [`Predicate::parse`].
pub const MAX_NESTING: usize = 64;

/// Parse failure with the byte offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid security expression at offset {offset}: {message}")]
pub struct ExpressionError {
    pub offset: usize,
    pub message: String,
}

impl ExpressionError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        ExpressionError {
            offset,
            message: message.into(),
        }
    }
}

/// Parsed predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Role(String),
    Authority(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let predicate = parser.expr()?;
        match parser.peek() {
            None => Ok(predicate),
            Some((offset, tok)) => Err(ExpressionError::new(
                offset,
                format!("unexpected {tok} after end of expression"),
            )),
        }
    }

    /// Evaluate against a principal's roles and authorities.
    #[must_use]
    pub fn evaluate(&self, roles: &BTreeSet<String>, authorities: &BTreeSet<String>) -> bool {
        match self {
            Predicate::Role(name) => roles.contains(name),
            Predicate::Authority(name) => authorities.contains(name),
            Predicate::And(items) => items.iter().all(|p| p.evaluate(roles, authorities)),
            Predicate::Or(items) => items.iter().any(|p| p.evaluate(roles, authorities)),
        }
    }

    /// Conjunction of `items`, flattening nested `And`s.
    #[must_use]
    pub fn all(items: Vec<Predicate>) -> Predicate {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Predicate::And(flat)
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Role(name) => write!(f, "hasRole('{name}')"),
            Predicate::Authority(name) => write!(f, "hasAuthority('{name}')"),
            Predicate::And(items) => write_joined(f, items, "and"),
            Predicate::Or(items) => write_joined(f, items, "or"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Predicate], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    And,
    Or,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{s}'"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::And => write!(f, "'and'"),
            Token::Or => write!(f, "'or'"),
        }
    }
}

fn lex(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((offset, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((offset, Token::RParen));
            }
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, next)) if next == c => {
                        tokens.push((offset, if c == '&' { Token::And } else { Token::Or }));
                    }
                    _ => {
                        return Err(ExpressionError::new(
                            offset,
                            format!("expected '{c}{c}'"),
                        ))
                    }
                }
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(ExpressionError::new(offset, "unterminated string"));
                }
                tokens.push((offset, Token::Str(value)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = if ident.eq_ignore_ascii_case("and") {
                    Token::And
                } else if ident.eq_ignore_ascii_case("or") {
                    Token::Or
                } else {
                    Token::Ident(ident)
                };
                tokens.push((offset, token));
            }
            other => {
                return Err(ExpressionError::new(
                    offset,
                    format!("unexpected character '{other}'"),
                ))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(o, t)| (*o, t))
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn expect(&mut self, want: &Token) -> Result<(), ExpressionError> {
        match self.next() {
            Some((_, ref tok)) if tok == want => Ok(()),
            Some((offset, tok)) => Err(ExpressionError::new(
                offset,
                format!("expected {want}, found {tok}"),
            )),
            None => Err(ExpressionError::new(
                self.end,
                format!("expected {want}, found end of expression"),
            )),
        }
    }

    fn expr(&mut self) -> Result<Predicate, ExpressionError> {
        let mut items = vec![self.term()?];
        while matches!(self.peek(), Some((_, Token::Or))) {
            self.pos += 1;
            items.push(self.term()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Predicate::Or(items)
        })
    }

    fn term(&mut self) -> Result<Predicate, ExpressionError> {
        let mut items = vec![self.factor()?];
        while matches!(self.peek(), Some((_, Token::And))) {
            self.pos += 1;
            items.push(self.factor()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Predicate::And(items)
        })
    }

    fn factor(&mut self) -> Result<Predicate, ExpressionError> {
        match self.next() {
            Some((offset, Token::LParen)) => {
                if self.depth >= MAX_NESTING {
                    return Err(ExpressionError::new(
                        offset,
                        format!("parentheses nested deeper than {MAX_NESTING}"),
                    ));
                }
                self.depth += 1;
                let inner = self.expr()?;
                self.depth -= 1;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some((offset, Token::Ident(name))) => {
                let build: fn(String) -> Predicate = if name.eq_ignore_ascii_case("hasRole") {
                    Predicate::Role
                } else if name.eq_ignore_ascii_case("hasAuthority") {
                    Predicate::Authority
                } else {
                    return Err(ExpressionError::new(
                        offset,
                        format!("unknown predicate '{name}' (expected hasRole or hasAuthority)"),
                    ));
                };
                self.expect(&Token::LParen)?;
                let arg = match self.next() {
                    Some((arg_offset, Token::Str(value))) => {
                        if value.trim().is_empty() {
                            return Err(ExpressionError::new(
                                arg_offset,
                                format!("{name} requires a non-empty name"),
                            ));
                        }
                        value
                    }
                    Some((arg_offset, tok)) => {
                        return Err(ExpressionError::new(
                            arg_offset,
                            format!("expected a quoted name, found {tok}"),
                        ))
                    }
                    None => {
                        return Err(ExpressionError::new(
                            self.end,
                            "expected a quoted name, found end of expression",
                        ))
                    }
                };
                self.expect(&Token::RParen)?;
                Ok(build(arg))
            }
            Some((offset, tok)) => Err(ExpressionError::new(
                offset,
                format!("expected a predicate, found {tok}"),
            )),
            None => Err(ExpressionError::new(
                self.end,
                "expected a predicate, found end of expression",
            )),
        }
    }
}
