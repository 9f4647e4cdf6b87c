//! Per-attribute JSON value codec.
//!
//! Every JSON attribute is stored as exactly one JSON value in its column.
//! The codec checks that the stored value has the attribute's declared shape
//! on the way in and on the way out; raw text attributes bypass validation.

use std::collections::HashSet;
use std::fmt;

use serde::de::{DeserializeOwned, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::document::{Document, JsonKind};
use crate::core::{DbError, Result};
use crate::persist::entity::AttributeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonShape {
    /// Fixed-field record: `{ "PopularityRank": 1, "InStock": true }`
    Object,
    /// Array of records.
    ObjectList,
    /// Array of primitives.
    ScalarList,
    /// Object of primitive values keyed by string.
    ScalarMap,
    /// Any JSON value, navigated through [`Document`].
    Document,
    /// Text stored verbatim. Not validated.
    RawText,
}

impl fmt::Display for JsonShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::ObjectList => "object list",
            Self::ScalarList => "scalar list",
            Self::ScalarMap => "scalar map",
            Self::Document => "document",
            Self::RawText => "raw text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonCodec {
    shape: JsonShape,
    attribute: String,
}

impl JsonCodec {
    pub fn new(shape: JsonShape) -> Self {
        Self {
            shape,
            attribute: String::from("value"),
        }
    }

    /// Names the attribute in decode errors.
    pub fn for_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn shape(&self) -> JsonShape {
        self.shape
    }

    pub fn encode_value<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_value(value).map_err(|e| {
            DbError::ConstraintError(format!("'{}' is not serializable: {}", self.attribute, e))
        })?;
        match (self.shape, json) {
            (JsonShape::RawText, JsonValue::String(text)) => Ok(text),
            (JsonShape::RawText, other) => Ok(other.to_string()),
            (_, json) => self.encode_tree(&json),
        }
    }

    pub fn decode_value<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        let tree = match self.decode(text)? {
            AttributeValue::Json(tree) => tree,
            AttributeValue::Document(doc) => doc.into_tree(),
            AttributeValue::Raw(raw) => JsonValue::String(raw),
            AttributeValue::Scalar(value) => value.to_json(),
        };
        serde_json::from_value(tree).map_err(|e| DbError::decode(&self.attribute, e.to_string()))
    }

    pub fn encode(&self, value: &AttributeValue) -> Result<String> {
        match (self.shape, value) {
            (JsonShape::RawText, AttributeValue::Raw(text)) => Ok(text.clone()),
            (JsonShape::Document, AttributeValue::Document(doc)) => Ok(doc.source().to_string()),
            (JsonShape::Document, AttributeValue::Json(tree)) => Ok(tree.to_string()),
            (JsonShape::RawText | JsonShape::Document, other) => Err(self.wrong_variant(other)),
            (_, AttributeValue::Json(tree)) => self.encode_tree(tree),
            (_, other) => Err(self.wrong_variant(other)),
        }
    }

    pub fn decode(&self, text: &str) -> Result<AttributeValue> {
        match self.shape {
            JsonShape::RawText => Ok(AttributeValue::Raw(text.to_string())),
            JsonShape::Document => Document::parse(text)
                .map(AttributeValue::Document)
                .map_err(|e| DbError::decode(&self.attribute, e.to_string())),
            _ => {
                let tree: JsonValue = serde_json::from_str(text)
                    .map_err(|e| DbError::decode(&self.attribute, e.to_string()))?;
                self.check_shape(&tree)
                    .map_err(|message| DbError::decode(&self.attribute, message))?;
                if self.shape == JsonShape::ScalarMap {
                    serde_json::from_str::<UniqueKeyMap>(text)
                        .map_err(|e| DbError::decode(&self.attribute, e.to_string()))?;
                }
                Ok(AttributeValue::Json(tree))
            }
        }
    }

    /// Decoded tree used for change detection.
    pub fn snapshot_of(&self, value: &AttributeValue) -> Result<JsonValue> {
        match value {
            AttributeValue::Json(tree) => Ok(tree.clone()),
            AttributeValue::Document(doc) => Ok(doc.tree().clone()),
            AttributeValue::Raw(text) => Ok(JsonValue::String(text.clone())),
            other => Err(self.wrong_variant(other)),
        }
    }

    fn encode_tree(&self, tree: &JsonValue) -> Result<String> {
        self.check_shape(tree).map_err(|message| {
            DbError::ConstraintError(format!("'{}' cannot be stored: {}", self.attribute, message))
        })?;
        Ok(tree.to_string())
    }

    fn check_shape(&self, tree: &JsonValue) -> std::result::Result<(), String> {
        match self.shape {
            JsonShape::Object => expect_kind(tree, JsonKind::Object),
            JsonShape::ObjectList => {
                let items = as_array(tree)?;
                for (idx, item) in items.iter().enumerate() {
                    if !item.is_object() {
                        return Err(format!(
                            "element {} must be an object, found {}",
                            idx,
                            JsonKind::of(item)
                        ));
                    }
                }
                Ok(())
            }
            JsonShape::ScalarList => {
                let items = as_array(tree)?;
                for (idx, item) in items.iter().enumerate() {
                    if !is_scalar(item) {
                        return Err(format!(
                            "element {} must be a scalar, found {}",
                            idx,
                            JsonKind::of(item)
                        ));
                    }
                }
                Ok(())
            }
            JsonShape::ScalarMap => {
                expect_kind(tree, JsonKind::Object)?;
                if let JsonValue::Object(map) = tree {
                    for (key, value) in map {
                        if !is_scalar(value) {
                            return Err(format!(
                                "value of '{}' must be a scalar, found {}",
                                key,
                                JsonKind::of(value)
                            ));
                        }
                    }
                }
                Ok(())
            }
            JsonShape::Document | JsonShape::RawText => Ok(()),
        }
    }

    fn wrong_variant(&self, value: &AttributeValue) -> DbError {
        DbError::SchemaError(format!(
            "'{}' is declared as {} but was given a {} value",
            self.attribute,
            self.shape,
            value.variant_name()
        ))
    }
}

fn expect_kind(tree: &JsonValue, expected: JsonKind) -> std::result::Result<(), String> {
    let actual = JsonKind::of(tree);
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {}, found {}", expected, actual))
    }
}

fn as_array(tree: &JsonValue) -> std::result::Result<&Vec<JsonValue>, String> {
    match tree {
        JsonValue::Array(items) => Ok(items),
        other => Err(format!("expected array, found {}", JsonKind::of(other))),
    }
}

fn is_scalar(value: &JsonValue) -> bool {
    !(value.is_object() || value.is_array())
}

/// Top-level object that refuses repeated keys. `serde_json::Value` keeps
/// the last occurrence silently.
struct UniqueKeyMap;

impl<'de> Deserialize<'de> for UniqueKeyMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UniqueKeyVisitor;

        impl<'de> Visitor<'de> for UniqueKeyVisitor {
            type Value = UniqueKeyMap;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an object with distinct keys")
            }

            fn visit_map<M>(self, mut access: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut seen = HashSet::new();
                while let Some((key, IgnoredAny)) = access.next_entry::<String, IgnoredAny>()? {
                    if !seen.insert(key.clone()) {
                        return Err(serde::de::Error::custom(format!("duplicate key '{}'", key)));
                    }
                }
                Ok(UniqueKeyMap)
            }
        }

        deserializer.deserialize_map(UniqueKeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Properties {
        popularity_rank: i32,
        in_stock: bool,
    }

    #[test]
    fn object_round_trip() {
        let codec = JsonCodec::new(JsonShape::Object).for_attribute("Properties");
        let props = Properties {
            popularity_rank: 42,
            in_stock: false,
        };
        let text = codec.encode_value(&props).unwrap();
        assert_eq!(codec.decode_value::<Properties>(&text).unwrap(), props);
    }

    #[test]
    fn object_decode_reports_wrong_kind_and_missing_field() {
        let codec = JsonCodec::new(JsonShape::Object).for_attribute("Properties");
        let err = codec.decode_value::<Properties>("[1,2]").unwrap_err();
        assert_eq!(err, DbError::decode("Properties", "expected object, found array"));

        let err = codec
            .decode_value::<Properties>(r#"{"PopularityRank":1}"#)
            .unwrap_err();
        assert!(
            matches!(err, DbError::DecodeError { ref attribute, .. } if attribute == "Properties")
        );
    }

    #[test]
    fn scalar_list_rejects_nested_values() {
        let codec = JsonCodec::new(JsonShape::ScalarList);
        assert!(codec.decode(r#"["E124","E155"]"#).is_ok());
        assert!(matches!(
            codec.decode(r#"["E124",["E155"]]"#),
            Err(DbError::DecodeError { .. })
        ));
        assert!(matches!(
            codec.decode(r#"{"a":1}"#),
            Err(DbError::DecodeError { .. })
        ));
    }

    #[test]
    fn scalar_map_rejects_duplicate_keys() {
        let codec = JsonCodec::new(JsonShape::ScalarMap).for_attribute("Values");
        let map: BTreeMap<String, String> = codec
            .decode_value(r#"{"10":"ten","20":"twenty"}"#)
            .unwrap();
        assert_eq!(map.len(), 2);

        let err = codec.decode(r#"{"10":"ten","10":"again"}"#).unwrap_err();
        match err {
            DbError::DecodeError { attribute, message } => {
                assert_eq!(attribute, "Values");
                assert!(message.contains("duplicate key '10'"), "{}", message);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn object_list_requires_objects() {
        let codec = JsonCodec::new(JsonShape::ObjectList);
        assert!(codec
            .decode(r#"[{"Name":"Fine Dine","StandardHygiene":0.98}]"#)
            .is_ok());
        assert!(codec.decode(r#"[{"Name":"x"}, 3]"#).is_err());
    }

    #[test]
    fn document_passes_source_through() {
        let codec = JsonCodec::new(JsonShape::Document);
        let source = r#"{"Name": "Fine Dine", "StandardHygiene": 0.98}"#;
        let decoded = codec.decode(source).unwrap();
        assert_eq!(codec.encode(&decoded).unwrap(), source);
        assert!(codec.decode("{broken").is_err());
    }

    #[test]
    fn raw_text_is_verbatim() {
        let codec = JsonCodec::new(JsonShape::RawText);
        let raw = r#"["fluffy", "white", "yellow"]"#;
        assert_eq!(codec.encode(&AttributeValue::Raw(raw.into())).unwrap(), raw);
        assert_eq!(
            codec.decode("not json at all").unwrap(),
            AttributeValue::Raw("not json at all".into())
        );
        assert_eq!(codec.encode_value(&"plain").unwrap(), "plain");
    }

    #[test]
    fn encode_refuses_wrong_shape() {
        let codec = JsonCodec::new(JsonShape::ScalarList).for_attribute("FoodAdditives");
        assert!(matches!(
            codec.encode(&AttributeValue::Json(json!({"a": 1}))),
            Err(DbError::ConstraintError(_))
        ));
        assert!(matches!(
            codec.encode(&AttributeValue::Raw("[]".into())),
            Err(DbError::SchemaError(_))
        ));
    }
}
