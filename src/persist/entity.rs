use crate::core::{DbError, Result, Value};
use crate::json::Document;
use crate::persist::schema::EntityDecl;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One attribute of an entity in its storage-facing form.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Value of a scalar column.
    Scalar(Value),
    /// Decoded tree of a shaped JSON attribute.
    Json(JsonValue),
    /// Opaque document, navigated by path.
    Document(Document),
    /// Text stored verbatim.
    Raw(String),
}

impl AttributeValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    /// Serializes a typed value into a JSON tree.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| DbError::ConstraintError(format!("value is not serializable: {}", e)))
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Json(_) => "json",
            Self::Document(_) => "document",
            Self::Raw(_) => "raw text",
        }
    }
}

/// Attribute values of one entity, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: AttributeValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: AttributeValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn take(&mut self, name: &str) -> Result<AttributeValue> {
        self.values
            .remove(name)
            .ok_or_else(|| DbError::decode(name, "attribute is missing"))
    }

    pub fn scalar(&mut self, name: &str) -> Result<Value> {
        match self.take(name)? {
            AttributeValue::Scalar(value) => Ok(value),
            other => Err(mismatch(name, "scalar", &other)),
        }
    }

    pub fn text(&mut self, name: &str) -> Result<String> {
        match self.scalar(name)? {
            Value::Text(text) => Ok(text),
            other => Err(DbError::decode(
                name,
                format!("expected TEXT, found {}", other.type_name()),
            )),
        }
    }

    pub fn integer(&mut self, name: &str) -> Result<i64> {
        match self.scalar(name)? {
            Value::Integer(i) => Ok(i),
            other => Err(DbError::decode(
                name,
                format!("expected INTEGER, found {}", other.type_name()),
            )),
        }
    }

    /// Deserializes a shaped JSON attribute into `T`.
    pub fn typed<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        match self.take(name)? {
            AttributeValue::Json(tree) => {
                serde_json::from_value(tree).map_err(|e| DbError::decode(name, e.to_string()))
            }
            other => Err(mismatch(name, "json", &other)),
        }
    }

    pub fn document(&mut self, name: &str) -> Result<Document> {
        match self.take(name)? {
            AttributeValue::Document(doc) => Ok(doc),
            other => Err(mismatch(name, "document", &other)),
        }
    }

    pub fn raw(&mut self, name: &str) -> Result<String> {
        match self.take(name)? {
            AttributeValue::Raw(text) => Ok(text),
            other => Err(mismatch(name, "raw text", &other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, found: &AttributeValue) -> DbError {
    DbError::decode(
        name,
        format!("expected {} value, found {}", expected, found.variant_name()),
    )
}

/// A record type stored in one table.
///
/// The declaration is static; the schema mapper turns it into a descriptor
/// once, when the registry is built.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Table, identity and attribute storage of this type.
    const DECLARATION: EntityDecl;

    /// Splits the entity into attribute values for encoding.
    fn to_attributes(&self) -> Result<Attributes>;

    /// Rebuilds the entity from decoded attribute values.
    fn from_attributes(attributes: Attributes) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_accessors_report_the_attribute() {
        let mut attrs = Attributes::new()
            .with("Name", AttributeValue::scalar("Vanilla"))
            .with("Values", AttributeValue::Json(json!({"01": "one"})))
            .with("Properties", AttributeValue::Json(json!({"InStock": true})));

        assert_eq!(attrs.text("Name").unwrap(), "Vanilla");
        let values: BTreeMap<String, String> = attrs.typed("Values").unwrap();
        assert_eq!(values["01"], "one");

        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Properties {
            #[serde(rename = "PopularityRank")]
            popularity_rank: i32,
        }
        let err = attrs.typed::<Properties>("Properties").unwrap_err();
        assert!(matches!(err, DbError::DecodeError { attribute, .. } if attribute == "Properties"));

        assert!(matches!(attrs.take("Name"), Err(DbError::DecodeError { .. })));
    }
}
