//! Evaluator for the store's native predicate syntax.
//!
//! A predicate is one or more `field OP literal` clauses joined by `AND`
//! (or `&&`). Operators are `=`, `==`, `!=`, `<>`, `<`, `<=`, `>`, `>=`,
//! `BEGINSWITH`, `ENDSWITH`, `CONTAINS` and `LIKE`; string operators take an
//! optional `[c]` suffix for case-insensitive matching. Literals are quoted
//! strings, numbers, `true`, `false` and `null`.

use serde_json::{Number, Value};
use std::cmp::Ordering;

use crate::database::record::RawRecord;
use crate::database::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    BeginsWith,
    EndsWith,
    Contains,
    Like,
}

#[derive(Debug, Clone)]
struct Clause {
    field: String,
    op: Comparison,
    case_insensitive: bool,
    literal: Value,
}

#[derive(Debug, Clone)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Symbol(String),
    Literal(Value),
    CaseFlag,
    And,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, StoreError> {
        let tokens = tokenize(source).map_err(|message| invalid(source, message))?;
        let mut clauses = Vec::new();
        let mut it = tokens.into_iter().peekable();

        loop {
            let field = match it.next() {
                Some(Token::Ident(name)) => name,
                other => return Err(invalid(source, format!("expected field name, found {:?}", other))),
            };
            let op = match it.next() {
                Some(Token::Symbol(s)) => symbol_op(&s).ok_or_else(|| invalid(source, format!("unknown operator {}", s)))?,
                Some(Token::Ident(word)) => keyword_op(&word).ok_or_else(|| invalid(source, format!("unknown operator {}", word)))?,
                other => return Err(invalid(source, format!("expected operator after {}, found {:?}", field, other))),
            };
            let case_insensitive = if it.peek() == Some(&Token::CaseFlag) {
                it.next();
                true
            } else {
                false
            };
            let literal = match it.next() {
                Some(Token::Literal(v)) => v,
                other => return Err(invalid(source, format!("expected literal after {}, found {:?}", field, other))),
            };
            clauses.push(Clause { field, op, case_insensitive, literal });

            match it.next() {
                None => break,
                Some(Token::And) => continue,
                Some(other) => return Err(invalid(source, format!("expected AND, found {:?}", other))),
            }
        }

        Ok(Self { clauses })
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        self.clauses.iter().all(|clause| {
            let value = record.get(&clause.field).unwrap_or(Value::Null);
            clause.evaluate(&value)
        })
    }
}

impl Clause {
    fn evaluate(&self, value: &Value) -> bool {
        match self.op {
            Comparison::Eq => self.equals(value),
            Comparison::Ne => !self.equals(value),
            Comparison::Lt => compare(value, &self.literal) == Some(Ordering::Less),
            Comparison::Lte => matches!(compare(value, &self.literal), Some(Ordering::Less | Ordering::Equal)),
            Comparison::Gt => compare(value, &self.literal) == Some(Ordering::Greater),
            Comparison::Gte => matches!(compare(value, &self.literal), Some(Ordering::Greater | Ordering::Equal)),
            Comparison::BeginsWith => self.strings(value).map(|(v, p)| v.starts_with(&p)).unwrap_or(false),
            Comparison::EndsWith => self.strings(value).map(|(v, p)| v.ends_with(&p)).unwrap_or(false),
            Comparison::Contains => self.strings(value).map(|(v, p)| v.contains(&p)).unwrap_or(false),
            Comparison::Like => self.strings(value).map(|(v, p)| like(&v, &p)).unwrap_or(false),
        }
    }

    fn equals(&self, value: &Value) -> bool {
        if self.case_insensitive {
            if let Some((v, p)) = self.strings(value) {
                return v == p;
            }
        }
        compare(value, &self.literal) == Some(Ordering::Equal)
    }

    fn strings(&self, value: &Value) -> Option<(String, String)> {
        let (v, p) = (value.as_str()?, self.literal.as_str()?);
        if self.case_insensitive {
            Some((v.to_lowercase(), p.to_lowercase()))
        } else {
            Some((v.to_string(), p.to_string()))
        }
    }
}

/// Compare two values of the same kind; `None` when the kinds differ
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: null < bool < number < string < others
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    compare(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

fn symbol_op(symbol: &str) -> Option<Comparison> {
    Some(match symbol {
        "=" | "==" => Comparison::Eq,
        "!=" | "<>" => Comparison::Ne,
        "<" => Comparison::Lt,
        "<=" => Comparison::Lte,
        ">" => Comparison::Gt,
        ">=" => Comparison::Gte,
        _ => return None,
    })
}

fn keyword_op(word: &str) -> Option<Comparison> {
    Some(match word.to_ascii_uppercase().as_str() {
        "BEGINSWITH" => Comparison::BeginsWith,
        "ENDSWITH" => Comparison::EndsWith,
        "CONTAINS" => Comparison::Contains,
        "LIKE" => Comparison::Like,
        _ => return None,
    })
}

fn invalid(predicate: &str, message: impl Into<String>) -> StoreError {
    StoreError::InvalidPredicate { predicate: predicate.to_string(), message: message.into() }
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '"' || c == '\'' {
            let (s, next) = read_string(&chars, i)?;
            tokens.push(Token::Literal(Value::String(s)));
            i = next;
        } else if c == '[' {
            let flag: String = chars[i..].iter().take(3).collect();
            if !flag.eq_ignore_ascii_case("[c]") {
                return Err(format!("unexpected '[' at {}", i));
            }
            tokens.push(Token::CaseFlag);
            i += 3;
        } else if c == '&' && chars.get(i + 1) == Some(&'&') {
            tokens.push(Token::And);
            i += 2;
        } else if "=!<>".contains(c) {
            let start = i;
            while i < chars.len() && "=!<>".contains(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Symbol(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || ".eE+-".contains(chars[i])) {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::Literal(parse_number(&text)?));
        } else if c.is_alphanumeric() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$' || chars[i] == '.') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "true" | "TRUE" => Token::Literal(Value::Bool(true)),
                "false" | "FALSE" => Token::Literal(Value::Bool(false)),
                "null" | "NULL" | "nil" => Token::Literal(Value::Null),
                w if w.eq_ignore_ascii_case("and") => Token::And,
                _ => Token::Ident(word),
            });
        } else {
            return Err(format!("unexpected character '{}' at {}", c, i));
        }
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars.get(i + 1).ok_or("dangling escape at end of input")?;
                out.push(*escaped);
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(format!("unterminated string starting at {}", start))
}

fn parse_number(text: &str) -> Result<Value, String> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("invalid number {}", text))
}

/// `*` matches any run of characters, `?` exactly one
fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut vi, mut pi) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == v[vi]) {
            vi += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, vi));
            pi += 1;
        } else if let Some((star_pi, star_vi)) = star {
            pi = star_pi + 1;
            vi = star_vi + 1;
            star = Some((star_pi, star_vi + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
