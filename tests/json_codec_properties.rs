//! Property tests for the attribute codec and change comparers.

use std::collections::BTreeMap;

use jsoncolumn::json::semantic_eq;
use jsoncolumn::{AttributeValue, ChangeComparer, Document, JsonCodec, JsonShape};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Supplier {
    name: String,
    rank: i64,
    certified: bool,
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 \"'%_\\\\]{0,24}").unwrap()
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,8}").unwrap()
}

fn supplier_strategy() -> impl Strategy<Value = Supplier> {
    (text_strategy(), any::<i64>(), any::<bool>()).prop_map(|(name, rank, certified)| Supplier {
        name,
        rank,
        certified,
    })
}

fn map_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(key_strategy(), text_strategy(), 0..8)
}

/// Arbitrary JSON. Floats are quarters so text round trips are exact.
fn json_strategy() -> impl Strategy<Value = JsonValue> {
    let leaf = prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        any::<i64>().prop_map(JsonValue::from),
        (-4000i32..4000).prop_map(|n| JsonValue::from(f64::from(n) / 4.0)),
        text_strategy().prop_map(JsonValue::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(JsonValue::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..6)
                .prop_map(|members| JsonValue::Object(members.into_iter().collect())),
        ]
    })
}

fn tree_of<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap()
}

/// Serializes with every object's members in reverse order and extra
/// whitespace, so the text differs from `to_string` whenever an object has
/// more than one member.
fn reordered_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Array(items) => {
            let items: Vec<String> = items.iter().map(reordered_text).collect();
            format!("[ {} ]", items.join(" , "))
        }
        JsonValue::Object(members) => {
            let members: Vec<String> = members
                .iter()
                .rev()
                .map(|(key, value)| format!("{} : {}", json!(key), reordered_text(value)))
                .collect();
            format!("{{ {} }}", members.join(" , "))
        }
        leaf => leaf.to_string(),
    }
}

mod codec_properties {
    use super::*;

    proptest! {
        #[test]
        fn scalar_list_round_trips(items in prop::collection::vec(text_strategy(), 0..10)) {
            let codec = JsonCodec::new(JsonShape::ScalarList);
            let text = codec.encode_value(&items).unwrap();
            prop_assert_eq!(codec.decode_value::<Vec<String>>(&text).unwrap(), items);
        }

        #[test]
        fn scalar_map_round_trips(map in map_strategy()) {
            let codec = JsonCodec::new(JsonShape::ScalarMap);
            let text = codec.encode_value(&map).unwrap();
            prop_assert_eq!(codec.decode_value::<BTreeMap<String, String>>(&text).unwrap(), map);
        }

        #[test]
        fn object_round_trips(supplier in supplier_strategy()) {
            let codec = JsonCodec::new(JsonShape::Object);
            let text = codec.encode_value(&supplier).unwrap();
            prop_assert_eq!(codec.decode_value::<Supplier>(&text).unwrap(), supplier);
        }

        #[test]
        fn object_list_round_trips(suppliers in prop::collection::vec(supplier_strategy(), 0..6)) {
            let codec = JsonCodec::new(JsonShape::ObjectList);
            let text = codec.encode_value(&suppliers).unwrap();
            prop_assert_eq!(codec.decode_value::<Vec<Supplier>>(&text).unwrap(), suppliers);
        }

        #[test]
        fn document_round_trips(tree in json_strategy()) {
            let codec = JsonCodec::new(JsonShape::Document);
            let text = codec
                .encode(&AttributeValue::Document(Document::from_value(tree.clone())))
                .unwrap();
            match codec.decode(&text).unwrap() {
                AttributeValue::Document(document) => {
                    prop_assert!(semantic_eq(document.tree(), &tree));
                    prop_assert_eq!(document.source(), text.as_str());
                }
                other => prop_assert!(false, "decoded to {:?}", other),
            }
        }

        #[test]
        fn raw_text_is_stored_verbatim(raw in text_strategy()) {
            let codec = JsonCodec::new(JsonShape::RawText);
            let text = codec.encode_value(&raw).unwrap();
            prop_assert_eq!(&text, &raw);
            prop_assert_eq!(codec.decode_value::<String>(&text).unwrap(), raw);
        }
    }
}

mod comparer_properties {
    use super::*;

    proptest! {
        #[test]
        fn reordered_map_text_is_unchanged(map in map_strategy()) {
            let codec = JsonCodec::new(JsonShape::ScalarMap);
            let reordered = reordered_text(&tree_of(&map));
            let decoded = match codec.decode(&reordered).unwrap() {
                AttributeValue::Json(tree) => tree,
                other => return Err(TestCaseError::fail(format!("decoded to {:?}", other))),
            };
            prop_assert!(ChangeComparer::KeyedMap.is_unchanged(&tree_of(&map), &decoded));
            let rebuilt: BTreeMap<String, String> = codec.decode_value(&reordered).unwrap();
            prop_assert_eq!(rebuilt, map);
        }

        #[test]
        fn map_value_change_is_detected(map in map_strategy(), suffix in "[a-z]{1,4}") {
            prop_assume!(!map.is_empty());
            let mut changed = map.clone();
            if let Some(value) = changed.values_mut().next() {
                value.push_str(&suffix);
            }
            let (before, after) = (tree_of(&map), tree_of(&changed));
            prop_assert!(!ChangeComparer::KeyedMap.is_unchanged(&before, &after));
        }

        #[test]
        fn reordered_document_is_unchanged(tree in json_strategy()) {
            let reordered = Document::parse(reordered_text(&tree)).unwrap();
            prop_assert!(ChangeComparer::Document.is_unchanged(&tree, reordered.tree()));
            prop_assert_eq!(reordered, Document::from_value(tree));
        }

        #[test]
        fn document_growth_is_detected(tree in json_strategy()) {
            let original = json!({ "Root": tree.clone() });
            let grown = json!({ "Root": tree, "Extra": null });
            prop_assert!(!ChangeComparer::Document.is_unchanged(&original, &grown));
            prop_assert!(!ChangeComparer::Document.is_unchanged(&grown, &original));
        }

        #[test]
        fn list_growth_is_detected(
            suppliers in prop::collection::vec(supplier_strategy(), 0..6),
            extra in supplier_strategy(),
        ) {
            let mut grown = suppliers.clone();
            grown.push(extra);
            let (before, after) = (tree_of(&suppliers), tree_of(&grown));
            prop_assert!(!ChangeComparer::OrderedList.is_unchanged(&before, &after));
            prop_assert!(!ChangeComparer::OrderedList.is_unchanged(&after, &before));
        }

        #[test]
        fn record_field_change_is_detected(supplier in supplier_strategy()) {
            let mut flipped = supplier.clone();
            flipped.certified = !flipped.certified;
            let original = tree_of(&supplier);
            let copy = tree_of(&supplier.clone());
            prop_assert!(ChangeComparer::Record.is_unchanged(&original, &copy));
            prop_assert!(!ChangeComparer::Record.is_unchanged(&original, &tree_of(&flipped)));
        }
    }
}
