//! Change detection for JSON attributes.
//!
//! Comparers work on decoded trees, never on stored text, so reformatting or
//! reordering map keys is not a change.

use serde_json::Value as JsonValue;

use super::codec::JsonShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeComparer {
    Scalar,
    OrderedList,
    KeyedMap,
    Record,
    Document,
}

impl ChangeComparer {
    pub fn for_shape(shape: JsonShape) -> Self {
        match shape {
            JsonShape::Object => Self::Record,
            JsonShape::ObjectList | JsonShape::ScalarList => Self::OrderedList,
            JsonShape::ScalarMap => Self::KeyedMap,
            JsonShape::Document | JsonShape::RawText => Self::Document,
        }
    }

    pub fn is_unchanged(&self, original: &JsonValue, current: &JsonValue) -> bool {
        match self {
            Self::Scalar => match (original, current) {
                (JsonValue::Object(_) | JsonValue::Array(_), _)
                | (_, JsonValue::Object(_) | JsonValue::Array(_)) => false,
                _ => semantic_eq(original, current),
            },
            Self::OrderedList => match (original, current) {
                (JsonValue::Array(a), JsonValue::Array(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| semantic_eq(x, y))
                }
                _ => false,
            },
            Self::KeyedMap | Self::Record => match (original, current) {
                (JsonValue::Object(_), JsonValue::Object(_)) => semantic_eq(original, current),
                _ => false,
            },
            Self::Document => semantic_eq(original, current),
        }
    }
}

/// Raw text attributes: structural comparison when both sides are JSON,
/// text equality otherwise.
pub fn raw_text_unchanged(original: &str, current: &str) -> bool {
    match (
        serde_json::from_str::<JsonValue>(original),
        serde_json::from_str::<JsonValue>(current),
    ) {
        (Ok(a), Ok(b)) => ChangeComparer::Document.is_unchanged(&a, &b),
        _ => original == current,
    }
}

/// Deep equality with numbers compared by value (`1` equals `1.0`).
pub fn semantic_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return i == j;
            }
            if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
                return i == j;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(f), Some(g)) => f == g,
                _ => false,
            }
        }
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| semantic_eq(p, q))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| semantic_eq(value, other)))
        }
        _ => false,
    }
}
