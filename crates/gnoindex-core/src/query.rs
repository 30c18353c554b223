//! Filter expressions for tx search.
//!
//! The syntax follows Tendermint's query language:
//!
//! ```text
//! tx.height >= 10 AND transfer.from = 'g1abc' AND package.func EXISTS
//! ```
//!
//! Conditions are joined by `AND`. Keys are composite attribute keys
//! (`<event type>.<attribute key>`) or one of the built-ins `tx.height`,
//! `tx.index` and `tx.hash`. Operands are single-quoted strings or numbers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;
use crate::types::{TxHash, TxRecord};

pub const TX_HEIGHT_KEY: &str = "tx.height";
pub const TX_INDEX_KEY: &str = "tx.index";
pub const TX_HASH_KEY: &str = "tx.hash";

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Exists,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::Contains => write!(f, "CONTAINS"),
            Self::Exists => write!(f, "EXISTS"),
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Str(String),
    Num(f64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Num(n) => write!(f, "{n}"),
        }
    }
}

/// What a condition's key refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Height,
    Index,
    Hash(TxHash),
    /// Composite attribute key, e.g. `transfer.from`.
    Attribute(String),
}

/// A single `key op operand` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub field: Field,
    pub op: Op,
    /// `None` only for [`Op::Exists`].
    pub operand: Option<Operand>,
}

impl Condition {
    /// Does a single stored attribute value satisfy this condition?
    pub fn matches_value(&self, value: &str) -> bool {
        let operand = match (&self.op, &self.operand) {
            (Op::Exists, _) => return true,
            (_, Some(operand)) => operand,
            (_, None) => return false,
        };
        match operand {
            Operand::Num(n) => match value.trim().parse::<f64>() {
                Ok(v) => compare(self.op, v.partial_cmp(n)),
                Err(_) => false,
            },
            Operand::Str(s) => match self.op {
                Op::Contains => value.contains(s.as_str()),
                op => compare(op, Some(value.cmp(s.as_str()))),
            },
        }
    }

    /// Does the record satisfy this condition? Attribute conditions look at
    /// indexed attributes only.
    pub fn matches_record(&self, record: &TxRecord) -> bool {
        match &self.field {
            Field::Height => self.matches_number(record.height),
            Field::Index => self.matches_number(record.index as u64),
            Field::Hash(hash) => record.hash == *hash,
            Field::Attribute(key) => record
                .result
                .events
                .iter()
                .flat_map(|e| e.indexed_attributes())
                .any(|(k, v)| k == *key && self.matches_value(v)),
        }
    }

    /// Evaluate against a built-in numeric field.
    pub fn matches_number(&self, n: u64) -> bool {
        match (&self.op, &self.operand) {
            (Op::Exists, _) => true,
            (op, Some(Operand::Num(x))) => compare(*op, (n as f64).partial_cmp(x)),
            _ => false,
        }
    }

    /// Inclusive `(low, high)` bounds this condition puts on a numeric
    /// built-in field, for range scans. `None` when nothing can match.
    pub fn numeric_bounds(&self) -> Option<(u64, u64)> {
        let x = match (&self.op, &self.operand) {
            (Op::Exists, _) => return Some((0, u64::MAX)),
            (_, Some(Operand::Num(x))) => *x,
            _ => return None,
        };
        let (low, high) = match self.op {
            Op::Eq => {
                if x < 0.0 || x.fract() != 0.0 {
                    return None;
                }
                (x, x)
            }
            Op::Lt => (0.0, (x.ceil() - 1.0)),
            Op::Le => (0.0, x.floor()),
            Op::Gt => (x.floor() + 1.0, u64::MAX as f64),
            Op::Ge => (x.ceil(), u64::MAX as f64),
            Op::Contains | Op::Exists => return Some((0, u64::MAX)),
        };
        if high < 0.0 || low > high {
            return None;
        }
        Some((low.max(0.0) as u64, high as u64))
    }
}

fn compare(op: Op, ord: Option<Ordering>) -> bool {
    let Some(ord) = ord else { return false };
    match op {
        Op::Eq => ord == Ordering::Equal,
        Op::Lt => ord == Ordering::Less,
        Op::Le => ord != Ordering::Greater,
        Op::Gt => ord == Ordering::Greater,
        Op::Ge => ord != Ordering::Less,
        Op::Contains | Op::Exists => false,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {} {}", self.key, self.op, operand),
            None => write!(f, "{} {}", self.key, self.op),
        }
    }
}

/// A parsed filter: a conjunction of conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        Parser::new(s).parse()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Does the record satisfy every condition?
    pub fn matches(&self, record: &TxRecord) -> bool {
        self.conditions.iter().all(|c| c.matches_record(record))
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

// ─── Parser ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Num(f64),
    Op(Op),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

fn invalid(msg: impl Into<String>) -> QueryError {
    QueryError::InvalidFilter(msg.into())
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | ':')
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> Result<Query, QueryError> {
        let tokens = self.tokenize()?;
        if tokens.is_empty() {
            return Err(invalid("empty query"));
        }

        let mut conditions = Vec::new();
        let mut iter = tokens.into_iter().peekable();
        loop {
            let key = match iter.next() {
                Some(Token::Word(w)) if w != "AND" => w,
                Some(t) => return Err(invalid(format!("expected key, found {t:?}"))),
                None => return Err(invalid("expected condition after AND")),
            };
            let op = match iter.next() {
                Some(Token::Op(op)) => op,
                Some(Token::Word(w)) if w == "CONTAINS" => Op::Contains,
                Some(Token::Word(w)) if w == "EXISTS" => Op::Exists,
                Some(t) => return Err(invalid(format!("expected operator after {key}, found {t:?}"))),
                None => return Err(invalid(format!("expected operator after {key}"))),
            };
            let operand = if op == Op::Exists {
                None
            } else {
                match iter.next() {
                    Some(Token::Str(s)) => Some(Operand::Str(s)),
                    Some(Token::Num(n)) => Some(Operand::Num(n)),
                    Some(t) => return Err(invalid(format!("expected operand after {key} {op}, found {t:?}"))),
                    None => return Err(invalid(format!("expected operand after {key} {op}"))),
                }
            };
            conditions.push(build_condition(key, op, operand)?);

            match iter.next() {
                None => break,
                Some(Token::Word(w)) if w == "AND" => continue,
                Some(t) => return Err(invalid(format!("expected AND, found {t:?}"))),
            }
        }
        Ok(Query { conditions })
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, QueryError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump(c);
            } else if c == '\'' {
                tokens.push(self.string()?);
            } else if c == '=' {
                self.bump(c);
                tokens.push(Token::Op(Op::Eq));
            } else if c == '<' || c == '>' {
                self.bump(c);
                let eq = self.peek() == Some('=');
                if eq {
                    self.bump('=');
                }
                tokens.push(Token::Op(match (c, eq) {
                    ('<', false) => Op::Lt,
                    ('<', true) => Op::Le,
                    ('>', false) => Op::Gt,
                    _ => Op::Ge,
                }));
            } else if c.is_ascii_digit() || c == '-' && self.next_is_digit() {
                tokens.push(self.number()?);
            } else if is_key_char(c) {
                tokens.push(Token::Word(self.take_while(is_key_char).to_string()));
            } else {
                return Err(invalid(format!("unexpected character '{c}' at {}", self.pos)));
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_is_digit(&self) -> bool {
        self.input[self.pos..].chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.bump(c);
        }
        &self.input[start..self.pos]
    }

    fn string(&mut self) -> Result<Token, QueryError> {
        let start = self.pos;
        self.bump('\'');
        let body = self.take_while(|c| c != '\'');
        if self.peek() != Some('\'') {
            return Err(invalid(format!("unterminated string starting at {start}")));
        }
        self.bump('\'');
        Ok(Token::Str(body.to_string()))
    }

    fn number(&mut self) -> Result<Token, QueryError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump('-');
        }
        self.take_while(|c| c.is_ascii_digit() || c == '.');
        let text = &self.input[start..self.pos];
        if self.peek().is_some_and(is_key_char) {
            return Err(invalid(format!("malformed number at {start}")));
        }
        text.parse::<f64>()
            .map(Token::Num)
            .map_err(|_| invalid(format!("malformed number '{text}'")))
    }
}

fn build_condition(key: String, op: Op, operand: Option<Operand>) -> Result<Condition, QueryError> {
    if op == Op::Contains && !matches!(operand, Some(Operand::Str(_))) {
        return Err(invalid(format!("{key} CONTAINS requires a quoted string")));
    }
    let field = match key.as_str() {
        TX_HEIGHT_KEY | TX_INDEX_KEY => {
            if matches!(operand, Some(Operand::Str(_))) || op == Op::Contains {
                return Err(invalid(format!("{key} requires a numeric comparison")));
            }
            if key == TX_HEIGHT_KEY {
                Field::Height
            } else {
                Field::Index
            }
        }
        TX_HASH_KEY => match (&op, &operand) {
            (Op::Eq, Some(Operand::Str(s))) => {
                Field::Hash(s.parse().map_err(|e: QueryError| invalid(e.to_string()))?)
            }
            _ => return Err(invalid(format!("{key} only supports = with a quoted hash"))),
        },
        _ => Field::Attribute(key.clone()),
    };
    Ok(Condition { key, field, op, operand })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
