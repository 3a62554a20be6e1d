//! The kubectl flavoured `JSONPath` subset used by wait conditions.
//!
//! Supported: optional `{...}` braces and leading `$`, `.field`, `['field']`,
//! `[index]` (negative counts from the end), `[*]` and `.*`, and filters of the
//! form `[?(@.path)]` or `[?(@.path == "literal")]`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    Filter(Filter),
}

#[derive(Clone, Debug, PartialEq)]
struct Filter {
    path: Vec<Segment>,
    expected: Option<Value>,
}

impl Filter {
    fn matches(&self, item: &Value) -> bool {
        let found = select(&self.path, item);
        match &self.expected {
            None => found.iter().any(|v| !v.is_null()),
            Some(expected) => {
                let expected = render(expected);
                found.iter().any(|v| render(v) == expected)
            }
        }
    }
}

/// A parsed `JSONPath` expression
#[derive(Clone, Debug, PartialEq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parses an expression
    ///
    /// # Errors
    /// Returns [`Error::JsonPath`] when the expression is empty or malformed
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(invalid(expr, "empty expression"));
        }
        let body = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed)
            .trim();
        let body = body.strip_prefix('$').unwrap_or(body);

        Ok(Self {
            source: trimmed.to_string(),
            segments: parse_segments(body, expr)?,
        })
    }

    /// Every value selected from `doc`, in document order
    #[must_use]
    pub fn select<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        select(&self.segments, doc)
    }

    /// String form of the first selected value, `None` if nothing (or `null`) matched
    #[must_use]
    pub fn first_string(&self, doc: &Value) -> Option<String> {
        self.select(doc).first().and_then(|v| render(v))
    }
}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Strings verbatim, `null` as absent, anything else as compact JSON
#[must_use]
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Characters that never appear in a dotted field name; quote such keys with `['...']`
const RESERVED: &str = "{}=!<>()";

/// Filter operators kubectl knows but this subset does not evaluate
const UNSUPPORTED_OPERATORS: [&str; 6] = ["!=", "<", ">", "=~", "&&", "||"];

fn invalid(expr: &str, reason: &str) -> Error {
    Error::JsonPath(format!("{expr:?}: {reason}"))
}

fn parse_segments(body: &str, expr: &str) -> Result<Vec<Segment>> {
    let normalized;
    let mut rest = if body.is_empty() || body.starts_with(['.', '[']) {
        body
    } else {
        normalized = format!(".{body}");
        normalized.as_str()
    };

    let mut segments = Vec::new();
    while let Some(c) = rest.chars().next() {
        match c {
            '.' => {
                rest = &rest[1..];
                if let Some(tail) = rest.strip_prefix('*') {
                    segments.push(Segment::Wildcard);
                    rest = tail;
                    continue;
                }
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                let name = &rest[..end];
                if name.is_empty() {
                    return Err(invalid(expr, "empty field name"));
                }
                if let Some(c) = name.chars().find(|c| c.is_whitespace() || RESERVED.contains(*c)) {
                    return Err(invalid(expr, &format!("unexpected {c:?} in field {name:?}")));
                }
                segments.push(Segment::Field(name.to_string()));
                rest = &rest[end..];
            }
            '[' => {
                let close = closing_bracket(rest).ok_or_else(|| invalid(expr, "unclosed '['"))?;
                segments.push(parse_bracket(rest[1..close].trim(), expr)?);
                rest = &rest[close + 1..];
            }
            other => return Err(invalid(expr, &format!("unexpected {other:?}"))),
        }
    }
    Ok(segments)
}

/// Byte offset of the `]` closing the bracket at the start of `s`, skipping quoted text
fn closing_bracket(s: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn unquote(s: &str) -> Option<&str> {
    ['\'', '"']
        .into_iter()
        .find_map(|q| s.strip_prefix(q).and_then(|s| s.strip_suffix(q)))
}

fn parse_bracket(inner: &str, expr: &str) -> Result<Segment> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(filter) = inner.strip_prefix('?') {
        return parse_filter(filter.trim(), expr).map(Segment::Filter);
    }
    if let Some(name) = unquote(inner) {
        return Ok(Segment::Field(name.to_string()));
    }
    inner
        .parse()
        .map(Segment::Index)
        .map_err(|_| invalid(expr, &format!("bad subscript {inner:?}")))
}

fn parse_filter(filter: &str, expr: &str) -> Result<Filter> {
    let body = filter
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| invalid(expr, "filter must be wrapped in '?(...)'"))?
        .trim();

    let bare = outside_quotes(body);
    if let Some(op) = UNSUPPORTED_OPERATORS.iter().find(|op| bare.contains(**op)) {
        return Err(invalid(expr, &format!("unsupported filter operator {op:?}, only '=='")));
    }

    let (lhs, rhs) = match body.split_once("==") {
        Some((lhs, rhs)) => (lhs.trim(), Some(rhs.trim())),
        None => (body, None),
    };
    let path = lhs
        .strip_prefix('@')
        .ok_or_else(|| invalid(expr, "filter must start with '@'"))?;
    if path.is_empty() {
        return Err(invalid(expr, "filter needs a path after '@'"));
    }

    let expected = match rhs {
        None => None,
        Some(literal) => Some(match unquote(literal) {
            Some(s) => Value::String(s.to_string()),
            None => serde_json::from_str(literal)
                .map_err(|_| invalid(expr, &format!("bad literal {literal:?}")))?,
        }),
    };

    Ok(Filter {
        path: parse_segments(path, expr)?,
        expected,
    })
}

/// `s` with every quoted literal removed
fn outside_quotes(s: &str) -> String {
    let mut quote = None;
    s.chars()
        .filter(|&c| match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                false
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                false
            }
            None => true,
        })
        .collect()
}

fn select<'a>(segments: &[Segment], doc: &'a Value) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Field(name) => next.extend(value.get(name.as_str())),
                Segment::Index(i) => {
                    if let Value::Array(items) = value {
                        let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
                        let idx = if *i < 0 { len + i } else { *i };
                        if let Ok(idx) = usize::try_from(idx) {
                            next.extend(items.get(idx));
                        }
                    }
                }
                Segment::Wildcard => match value {
                    Value::Array(items) => next.extend(items),
                    Value::Object(map) => next.extend(map.values()),
                    _ => {}
                },
                Segment::Filter(filter) => {
                    if let Value::Array(items) = value {
                        next.extend(items.iter().filter(|item| filter.matches(item)));
                    }
                }
            }
        }
        current = next;
    }
    current
}
