use crate::core::{DataType, DbError, Result};
use crate::json::Document;
use crate::persist::{AttributeDecl, AttributeType, AttributeValue, Attributes, Entity, EntityDecl};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IceCreamProperties {
    pub popularity_rank: i32,
    pub in_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SupplierInformation {
    pub name: String,
    pub standard_hygiene: f64,
}

impl SupplierInformation {
    pub fn new(name: &str, standard_hygiene: f64) -> Self {
        Self {
            name: name.to_string(),
            standard_hygiene,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IceCream {
    pub id: i64,
    pub name: String,
    pub properties: IceCreamProperties,
    pub primary_supplier_information: Document,
    pub food_additives: Vec<String>,
    /// JSON array text, stored as-is.
    pub tags: String,
    pub all_supplier_informations: Vec<SupplierInformation>,
    pub values: BTreeMap<String, String>,
    pub ah_data: Document,
}

impl Entity for IceCream {
    const DECLARATION: EntityDecl = EntityDecl {
        type_name: "IceCream",
        table: "IceCreams",
        attributes: &[
            AttributeDecl::identity("Id", DataType::Integer),
            AttributeDecl::scalar("Name", DataType::Text),
            AttributeDecl::new("Properties", AttributeType::Object),
            AttributeDecl::new("PrimarySupplierInformation", AttributeType::Opaque),
            AttributeDecl::new("FoodAdditives", AttributeType::ScalarList),
            AttributeDecl::new("Tags", AttributeType::RawText),
            AttributeDecl::new("AllSupplierInformations", AttributeType::ObjectList),
            AttributeDecl::new("Values", AttributeType::ScalarMap),
            AttributeDecl::new("AHData", AttributeType::Opaque),
        ],
    };

    fn to_attributes(&self) -> Result<Attributes> {
        Ok(Attributes::new()
            .with("Id", AttributeValue::scalar(self.id))
            .with("Name", AttributeValue::scalar(self.name.as_str()))
            .with("Properties", AttributeValue::json(&self.properties)?)
            .with(
                "PrimarySupplierInformation",
                AttributeValue::Document(self.primary_supplier_information.clone()),
            )
            .with("FoodAdditives", AttributeValue::json(&self.food_additives)?)
            .with("Tags", AttributeValue::Raw(self.tags.clone()))
            .with(
                "AllSupplierInformations",
                AttributeValue::json(&self.all_supplier_informations)?,
            )
            .with("Values", AttributeValue::json(&self.values)?)
            .with("AHData", AttributeValue::Document(self.ah_data.clone())))
    }

    fn from_attributes(mut attributes: Attributes) -> Result<Self> {
        Ok(Self {
            id: attributes.integer("Id")?,
            name: attributes.text("Name")?,
            properties: attributes.typed("Properties")?,
            primary_supplier_information: attributes.document("PrimarySupplierInformation")?,
            food_additives: attributes.typed("FoodAdditives")?,
            tags: attributes.raw("Tags")?,
            all_supplier_informations: attributes.typed("AllSupplierInformations")?,
            values: attributes.typed("Values")?,
            ah_data: attributes.document("AHData")?,
        })
    }
}

fn supplier_document(supplier: &SupplierInformation) -> Result<Document> {
    serde_json::to_value(supplier)
        .map(Document::from_value)
        .map_err(|e| DbError::ConstraintError(format!("supplier is not serializable: {}", e)))
}

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const VANILLA_AH_DATA: &str = r#"{"AdminGroupsValue":1,"CreatedDate":"2022-06-07T13:44:12.5871278Z","DiscardedDate":"0001-01-01T00:00:00","Name":"G.2.1_DENDROLOGICKÝ-PRŮZKUM","Path":"/1. Příprava staveb/1.04 DSP/G_SOUVISEJÍCÍ-DOKUMENTACE/G.2_PODKLADY-PRŮZKUMY/G.2.1_DENDROLOGICKÝ-PRŮZKUM","PermissionInheritance":true,"ReadGroupsValue":0,"RequiredCategoryTrees":{},"UserAcessLevel":{},"WriteGroupsValue":0}"#;

const CHOCOLATE_AH_DATA: &str = r#"{"before":{"ETag":null,"ModifiedById":null,"Status":"Pending"},"after":{"ETag":"0x8DA488C0F5AA3C8","ModifiedById":"d96d666a-3e73-462f-8ecf-155b94aa14e4","Status":"Uploaded"}}"#;

const STRAWBERRY_AH_DATA: &str = r#"{"ContentType":"image/png","CreatedDate":"2022-06-07T13:46:03.8275364Z","Data":{"json":"{\"Object\":{},\"Json\":\"{}\"}"},"DerivateType":"ThumbnailSmall","FileName":null,"Referenced":false,"Size":0,"Status":"Processing"}"#;

const MATCHA_AH_DATA: &str = r#"{"CreatedDate":"2022-06-07T13:46:01.8823107Z","Description":"","DiscardedDate":"0001-01-01T00:00:00","RevisionState":"published"}"#;

/// The four sample ice creams.
pub fn seed() -> Result<Vec<IceCream>> {
    let fasssst = SupplierInformation::new("Fasssst Dilivery", 0.45);
    let sweet = SupplierInformation::new("Sweet Dilivery", 0.65);
    let fresh = SupplierInformation::new("Fresh Dilivery", 0.85);
    let fine_dine = SupplierInformation::new("Fine Dine", 0.98);

    Ok(vec![
        IceCream {
            id: 1,
            name: "Vanilla".into(),
            properties: IceCreamProperties {
                popularity_rank: 1,
                in_stock: true,
            },
            primary_supplier_information: supplier_document(&fasssst)?,
            food_additives: strings(&["E102"]),
            tags: r#"["fluffy", "white", "yellow"]"#.into(),
            all_supplier_informations: vec![
                fasssst.clone(),
                SupplierInformation::new("Fast Fooood", 0.61),
            ],
            values: values(&[("01", "one"), ("02", "two")]),
            ah_data: Document::parse(VANILLA_AH_DATA)?,
        },
        IceCream {
            id: 2,
            name: "Chocolate".into(),
            properties: IceCreamProperties {
                popularity_rank: 2,
                in_stock: true,
            },
            primary_supplier_information: supplier_document(&sweet)?,
            food_additives: strings(&["E124", "E155"]),
            tags: r#"["creamy", "brown"]"#.into(),
            all_supplier_informations: vec![sweet.clone()],
            values: values(&[("10", "ten"), ("20", "twenty")]),
            ah_data: Document::parse(CHOCOLATE_AH_DATA)?,
        },
        IceCream {
            id: 3,
            name: "Strawberry".into(),
            properties: IceCreamProperties {
                popularity_rank: 3,
                in_stock: false,
            },
            primary_supplier_information: supplier_document(&fresh)?,
            food_additives: strings(&["E124"]),
            tags: r#"["sweet", "red"]"#.into(),
            all_supplier_informations: vec![fresh.clone()],
            values: BTreeMap::new(),
            ah_data: Document::parse(STRAWBERRY_AH_DATA)?,
        },
        IceCream {
            id: 4,
            name: "Matcha".into(),
            properties: IceCreamProperties {
                popularity_rank: 42,
                in_stock: false,
            },
            primary_supplier_information: Document::parse(
                r#"{"Name": "Fine Dine", "StandardHygiene": 0.98}"#,
            )?,
            food_additives: strings(&["E102", "E142"]),
            tags: r#"["bitter", "green"]"#.into(),
            all_supplier_informations: vec![fine_dine],
            values: BTreeMap::new(),
            ah_data: Document::parse(MATCHA_AH_DATA)?,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::describe;

    #[test]
    fn declaration_is_valid() {
        let desc = describe(&IceCream::DECLARATION).unwrap();
        assert_eq!(desc.table(), "IceCreams");
        assert_eq!(desc.attributes().len(), 9);
    }

    #[test]
    fn attributes_round_trip() {
        for ice_cream in seed().unwrap() {
            let rebuilt = IceCream::from_attributes(ice_cream.to_attributes().unwrap()).unwrap();
            assert_eq!(rebuilt, ice_cream);
        }
    }

    #[test]
    fn seed_documents_are_navigable() {
        let seed = seed().unwrap();
        let status = seed[1]
            .ah_data
            .root()
            .get("after")
            .and_then(|after| after.get("Status"))
            .and_then(|status| status.as_str().map(str::to_string))
            .unwrap();
        assert_eq!(status, "Uploaded");
        assert_eq!(
            seed[3].primary_supplier_information.root().get("Name").unwrap().as_str().unwrap(),
            "Fine Dine"
        );
    }
}
