//! MySQL-style JSON paths.
//!
//! Supported grammar (a subset of MySQL's):
//!
//! ```text
//! path    := '$' segment*
//! segment := '.' ident | '."' quoted '"' | '.*' | '[' n ']' | '[*]'
//! ```
//!
//! The same path type is used to build predicates, to navigate opaque
//! documents and by the storage evaluator for `JSON_EXTRACT`/`JSON_SEARCH`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JSON path '{path}': {reason}")]
pub struct JsonPathError {
    pub path: String,
    pub reason: String,
}

impl JsonPathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member: `.Name` or `."two words"`
    Key(String),
    /// Array element: `[0]`
    Index(usize),
    /// Every array element: `[*]`
    AnyIndex,
    /// Every object member: `.*`
    AnyKey,
}

impl PathSegment {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::AnyIndex | Self::AnyKey)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) if is_plain_identifier(key) => write!(f, ".{}", key),
            Self::Key(key) => {
                write!(f, ".\"")?;
                for ch in key.chars() {
                    if ch == '"' || ch == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", ch)?;
                }
                write!(f, "\"")
            }
            Self::Index(idx) => write!(f, "[{}]", idx),
            Self::AnyIndex => write!(f, "[*]"),
            Self::AnyKey => write!(f, ".*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// The document root, `$`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, JsonPathError> {
        text.parse()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    pub fn any_index(mut self) -> Self {
        self.segments.push(PathSegment::AnyIndex);
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(PathSegment::is_wildcard)
    }

    /// Last object member named by the path, if any.
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            _ => None,
        })
    }

    /// Follows a wildcard-free path. Returns `None` as soon as a member or
    /// element is missing or the path crosses a value of the wrong kind.
    pub fn get<'a>(&self, root: &'a JsonValue) -> Option<&'a JsonValue> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), JsonValue::Object(map)) => map.get(key)?,
                (PathSegment::Index(idx), JsonValue::Array(items)) => items.get(*idx)?,
                // MySQL treats a scalar as a one-element array for `[0]`
                (PathSegment::Index(0), scalar) if !scalar.is_array() => scalar,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Every value the path addresses, in document order.
    pub fn select<'a>(&self, root: &'a JsonValue) -> Vec<&'a JsonValue> {
        self.select_paths(root)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Like [`JsonPath::select`], paired with the concrete (wildcard-free)
    /// path of each match.
    pub fn select_paths<'a>(&self, root: &'a JsonValue) -> Vec<(JsonPath, &'a JsonValue)> {
        let mut current = vec![(JsonPath::root(), root)];
        for segment in &self.segments {
            let mut next = Vec::new();
            for (at, value) in current {
                match (segment, value) {
                    (PathSegment::Key(key), JsonValue::Object(map)) => {
                        if let Some(child) = map.get(key) {
                            next.push((at.key(key.clone()), child));
                        }
                    }
                    (PathSegment::Index(idx), JsonValue::Array(items)) => {
                        if let Some(child) = items.get(*idx) {
                            next.push((at.index(*idx), child));
                        }
                    }
                    (PathSegment::Index(0), scalar) if !scalar.is_array() => {
                        next.push((at, scalar))
                    }
                    (PathSegment::AnyIndex, JsonValue::Array(items)) => {
                        for (idx, child) in items.iter().enumerate() {
                            next.push((at.clone().index(idx), child));
                        }
                    }
                    (PathSegment::AnyKey, JsonValue::Object(map)) => {
                        for (key, child) in map {
                            next.push((at.clone().key(key.clone()), child));
                        }
                    }
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    /// Appends the segments of `other` below this path.
    pub fn join(&self, other: &JsonPath) -> JsonPath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        JsonPath { segments }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = JsonPathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let mut chars = trimmed.chars().peekable();

        if chars.next() != Some('$') {
            return Err(JsonPathError::new(text, "path must start with '$'"));
        }

        let mut segments = Vec::new();
        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    while chars.peek().is_some_and(|c| c.is_whitespace()) {
                        chars.next();
                    }
                    segments.push(parse_member(text, &mut chars)?);
                }
                '[' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(JsonPathError::new(text, "unterminated array index"));
                    }
                    let inner = inner.trim();
                    if inner == "*" {
                        segments.push(PathSegment::AnyIndex);
                    } else {
                        let idx = inner.parse::<usize>().map_err(|_| {
                            JsonPathError::new(text, format!("invalid array index '{}'", inner))
                        })?;
                        segments.push(PathSegment::Index(idx));
                    }
                }
                c if c.is_whitespace() => {}
                other => {
                    return Err(JsonPathError::new(
                        text,
                        format!("unexpected character '{}'", other),
                    ));
                }
            }
        }

        Ok(Self { segments })
    }
}

fn parse_member(
    text: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<PathSegment, JsonPathError> {
    match chars.peek() {
        Some('*') => {
            chars.next();
            Ok(PathSegment::AnyKey)
        }
        Some('"') => {
            chars.next();
            let mut key = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => key.push(escaped),
                        None => break,
                    },
                    '"' => return Ok(PathSegment::Key(key)),
                    other => key.push(other),
                }
            }
            Err(JsonPathError::new(text, "unterminated quoted member"))
        }
        _ => {
            let mut key = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' || c == '[' || c.is_whitespace() {
                    break;
                }
                key.push(c);
                chars.next();
            }
            if key.is_empty() || !is_plain_identifier(&key) {
                return Err(JsonPathError::new(
                    text,
                    format!("invalid member name '{}'", key),
                ));
            }
            Ok(PathSegment::Key(key))
        }
    }
}

fn is_plain_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
