//! Opaque JSON documents.
//!
//! A [`Document`] keeps the text it was loaded from next to the parsed tree.
//! Navigation goes through [`Node`], whose accessors check the node kind and
//! report a mismatch as [`DbError::DocumentAccessError`] instead of
//! returning a default.

use std::fmt;

use serde_json::Value as JsonValue;

use super::compare::semantic_eq;
use super::path::JsonPath;
use crate::core::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl JsonKind {
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Object(_) => Self::Object,
            JsonValue::Array(_) => Self::Array,
            JsonValue::String(_) => Self::String,
            JsonValue::Number(_) => Self::Number,
            JsonValue::Bool(_) => Self::Boolean,
            JsonValue::Null => Self::Null,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    root: JsonValue,
}

impl Document {
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let root = serde_json::from_str(&source)
            .map_err(|e| DbError::DocumentAccessError(format!("invalid JSON document: {}", e)))?;
        Ok(Self { source, root })
    }

    pub fn from_value(root: JsonValue) -> Self {
        Self {
            source: root.to_string(),
            root,
        }
    }

    /// Text exactly as it was parsed or stored.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            value: &self.root,
            path: JsonPath::root(),
        }
    }

    pub fn tree(&self) -> &JsonValue {
        &self.root
    }

    pub fn into_tree(self) -> JsonValue {
        self.root
    }
}

/// Structural equality as change detection sees it: whitespace, key order
/// and number spelling (`1` vs `1.0`) do not matter.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        semantic_eq(&self.root, &other.root)
    }
}

/// Borrowed position inside a [`Document`]. Remembers how it was reached so
/// errors can name the location.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    value: &'a JsonValue,
    path: JsonPath,
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> JsonKind {
        JsonKind::of(self.value)
    }

    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    pub fn value(&self) -> &'a JsonValue {
        self.value
    }

    pub fn get(&self, field: &str) -> Result<Node<'a>> {
        let map = match self.value {
            JsonValue::Object(map) => map,
            other => return Err(self.mismatch(JsonKind::Object, other)),
        };
        let value = map.get(field).ok_or_else(|| {
            DbError::DocumentAccessError(format!("no member '{}' at {}", field, self.path))
        })?;
        Ok(Node {
            value,
            path: self.path.clone().key(field),
        })
    }

    pub fn at(&self, index: usize) -> Result<Node<'a>> {
        let items = match self.value {
            JsonValue::Array(items) => items,
            other => return Err(self.mismatch(JsonKind::Array, other)),
        };
        let value = items.get(index).ok_or_else(|| {
            DbError::DocumentAccessError(format!(
                "index {} out of bounds at {} (length {})",
                index,
                self.path,
                items.len()
            ))
        })?;
        Ok(Node {
            value,
            path: self.path.clone().index(index),
        })
    }

    /// Addresses a single value below this node. Wildcard paths are refused.
    pub fn select(&self, path: &JsonPath) -> Result<Node<'a>> {
        if path.has_wildcard() {
            return Err(DbError::DocumentAccessError(format!(
                "path {} addresses more than one value",
                path
            )));
        }
        let value = path.get(self.value).ok_or_else(|| {
            DbError::DocumentAccessError(format!("nothing at {} below {}", path, self.path))
        })?;
        Ok(Node {
            value,
            path: self.path.join(path),
        })
    }

    pub fn as_str(&self) -> Result<&'a str> {
        match self.value {
            JsonValue::String(s) => Ok(s),
            other => Err(self.mismatch(JsonKind::String, other)),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self.value {
            JsonValue::Number(n) => n
                .as_f64()
                .ok_or_else(|| {
                    DbError::DocumentAccessError(format!("{} is not finite", self.path))
                }),
            other => Err(self.mismatch(JsonKind::Number, other)),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self.value {
            JsonValue::Number(n) => n.as_i64().ok_or_else(|| {
                DbError::DocumentAccessError(format!(
                    "number at {} is not an integer: {}",
                    self.path, n
                ))
            }),
            other => Err(self.mismatch(JsonKind::Number, other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.value {
            JsonValue::Bool(b) => Ok(*b),
            other => Err(self.mismatch(JsonKind::Boolean, other)),
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    fn mismatch(&self, expected: JsonKind, actual: &JsonValue) -> DbError {
        DbError::DocumentAccessError(format!(
            "expected {} at {}, found {}",
            expected,
            self.path,
            JsonKind::of(actual)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::ChangeComparer;

    const UPLOAD: &str = r#"{"before":{"ETag":null,"ModifiedById":null,"Status":"Pending"},"after":{"ETag":"0x8DA488C0F5AA3C8","ModifiedById":"d96d666a-3e73-462f-8ecf-155b94aa14e4","Status":"Uploaded"}}"#;

    #[test]
    fn navigates_nested_members() {
        let doc = Document::parse(UPLOAD).unwrap();
        let status = doc.root().get("after").unwrap().get("Status").unwrap();
        assert_eq!(status.as_str().unwrap(), "Uploaded");
        assert_eq!(status.path().to_string(), "$.after.Status");
        assert!(doc.root().get("before").unwrap().get("ETag").unwrap().is_null());
        assert_eq!(doc.source(), UPLOAD);
    }

    #[test]
    fn kind_mismatch_is_explicit() {
        let doc = Document::parse(r#"{"Name":"Fine Dine","StandardHygiene":0.98}"#).unwrap();
        let err = doc.root().get("Name").unwrap().as_f64().unwrap_err();
        assert_eq!(
            err,
            DbError::DocumentAccessError("expected number at $.Name, found string".into())
        );
        assert!(doc.root().at(0).is_err());
        assert!(doc.root().get("Missing").is_err());
    }

    #[test]
    fn select_refuses_wildcards() {
        let doc = Document::parse(r#"[{"Name":"a"},{"Name":"b"}]"#).unwrap();
        let second = doc.root().select(&JsonPath::parse("$[1].Name").unwrap()).unwrap();
        assert_eq!(second.as_str().unwrap(), "b");
        assert!(doc.root().select(&JsonPath::parse("$[*].Name").unwrap()).is_err());
    }

    #[test]
    fn equality_ignores_formatting() {
        let a = Document::parse(r#"{"Name": "Fine Dine", "StandardHygiene": 0.98}"#).unwrap();
        let b = Document::parse(r#"{"StandardHygiene":0.98,"Name":"Fine Dine"}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_agrees_with_change_detection() {
        let a = Document::parse(r#"{"PopularityRank": 1, "Scores": [2, 3.5]}"#).unwrap();
        let b = Document::parse(r#"{"Scores": [2.0, 3.5], "PopularityRank": 1.0}"#).unwrap();
        assert_eq!(a, b);
        assert!(ChangeComparer::Document.is_unchanged(a.tree(), b.tree()));

        let c = Document::parse(r#"{"PopularityRank": 1, "Scores": [2, 3.25]}"#).unwrap();
        assert_ne!(a, c);
        assert!(!ChangeComparer::Document.is_unchanged(a.tree(), c.tree()));
    }
}
