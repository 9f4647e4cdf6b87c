//! Static entity declarations and the descriptors derived from them.
//!
//! Each entity type declares its table, its identity and, per attribute,
//! whether it lives in a scalar column or in a JSON column of a given shape.
//! [`describe`] validates a declaration and binds every JSON attribute to its
//! codec and change comparer. Mapping errors surface once, when the
//! [`SchemaRegistry`] is built.

use crate::core::{Column, DataType, DbError, Result, Schema};
use crate::json::{ChangeComparer, JsonCodec, JsonShape};
use crate::persist::entity::Entity;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Declared storage of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Scalar(DataType),
    /// Fixed-field record.
    Object,
    ObjectList,
    ScalarList,
    ScalarMap,
    /// Arbitrary JSON read through `Document` accessors.
    Opaque,
    /// Stored verbatim, no shape.
    RawText,
    /// Shape only known at runtime. Rejected; declare `Opaque` instead.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: &'static str,
    /// Column name; defaults to the attribute name.
    pub column: Option<&'static str>,
    pub kind: AttributeType,
    pub identity: bool,
}

impl AttributeDecl {
    pub const fn identity(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            column: None,
            kind: AttributeType::Scalar(data_type),
            identity: true,
        }
    }

    pub const fn scalar(name: &'static str, data_type: DataType) -> Self {
        Self::new(name, AttributeType::Scalar(data_type))
    }

    pub const fn new(name: &'static str, kind: AttributeType) -> Self {
        Self {
            name,
            column: None,
            kind,
            identity: false,
        }
    }

    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDecl {
    pub type_name: &'static str,
    pub table: &'static str,
    pub attributes: &'static [AttributeDecl],
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeStorage {
    Scalar(DataType),
    Json {
        shape: JsonShape,
        codec: JsonCodec,
        comparer: ChangeComparer,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub column: String,
    pub storage: AttributeStorage,
}

impl AttributeDescriptor {
    pub fn json_shape(&self) -> Option<JsonShape> {
        match &self.storage {
            AttributeStorage::Json { shape, .. } => Some(*shape),
            AttributeStorage::Scalar(_) => None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_shape().is_some()
    }

    fn column_def(&self, identity: bool) -> Column {
        let data_type = match &self.storage {
            AttributeStorage::Scalar(data_type) => *data_type,
            AttributeStorage::Json {
                shape: JsonShape::RawText,
                ..
            } => DataType::Text,
            AttributeStorage::Json { .. } => DataType::Json,
        };
        let column = Column::new(&self.column, data_type).not_null();
        if identity { column.primary_key() } else { column }
    }
}

/// Validated mapping of one entity type onto its table.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    type_name: String,
    table: String,
    attributes: Vec<AttributeDescriptor>,
    identity: usize,
}

impl EntityDescriptor {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn identity(&self) -> &AttributeDescriptor {
        &self.attributes[self.identity]
    }

    pub fn is_identity(&self, attribute: &AttributeDescriptor) -> bool {
        attribute.name == self.identity().name
    }

    pub fn column_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.column.clone()).collect()
    }

    /// Table layout: scalar attributes keep their type, JSON shapes become
    /// JSON columns and raw text a TEXT column.
    pub fn table_schema(&self) -> Schema {
        Schema::new(
            self.attributes
                .iter()
                .enumerate()
                .map(|(idx, attr)| attr.column_def(idx == self.identity))
                .collect(),
        )
    }
}

pub fn describe(decl: &EntityDecl) -> Result<EntityDescriptor> {
    let schema_error = |msg: String| DbError::SchemaError(format!("{}: {}", decl.type_name, msg));

    if decl.table.trim().is_empty() {
        return Err(schema_error("table name is empty".into()));
    }

    let mut names = HashSet::new();
    let mut columns = HashSet::new();
    let mut identity = None;
    let mut attributes = Vec::with_capacity(decl.attributes.len());

    for (idx, attr) in decl.attributes.iter().enumerate() {
        if attr.name.is_empty() {
            return Err(schema_error(format!("attribute {} has no name", idx)));
        }
        if !names.insert(attr.name) {
            return Err(schema_error(format!("attribute '{}' is declared twice", attr.name)));
        }
        let column = attr.column.unwrap_or(attr.name);
        if !columns.insert(column.to_ascii_lowercase()) {
            return Err(schema_error(format!(
                "column '{}' of '{}' collides with another attribute",
                column, attr.name
            )));
        }

        let storage = match attr.kind {
            AttributeType::Scalar(DataType::Json) => {
                return Err(schema_error(format!(
                    "'{}' is a scalar of type JSON; declare its JSON shape instead",
                    attr.name
                )));
            }
            AttributeType::Scalar(data_type) => AttributeStorage::Scalar(data_type),
            AttributeType::Dynamic => {
                return Err(schema_error(format!(
                    "shape of '{}' cannot be determined statically; declare it Opaque",
                    attr.name
                )));
            }
            AttributeType::Object => json_storage(attr.name, JsonShape::Object),
            AttributeType::ObjectList => json_storage(attr.name, JsonShape::ObjectList),
            AttributeType::ScalarList => json_storage(attr.name, JsonShape::ScalarList),
            AttributeType::ScalarMap => json_storage(attr.name, JsonShape::ScalarMap),
            AttributeType::Opaque => json_storage(attr.name, JsonShape::Document),
            AttributeType::RawText => json_storage(attr.name, JsonShape::RawText),
        };

        if attr.identity {
            if identity.is_some() {
                return Err(schema_error("more than one identity attribute".into()));
            }
            if !matches!(storage, AttributeStorage::Scalar(_)) {
                return Err(schema_error(format!(
                    "identity '{}' must be a scalar attribute",
                    attr.name
                )));
            }
            identity = Some(idx);
        }

        attributes.push(AttributeDescriptor {
            name: attr.name.to_string(),
            column: column.to_string(),
            storage,
        });
    }

    let identity = identity.ok_or_else(|| schema_error("no identity attribute".into()))?;

    Ok(EntityDescriptor {
        type_name: decl.type_name.to_string(),
        table: decl.table.to_string(),
        attributes,
        identity,
    })
}

fn json_storage(name: &str, shape: JsonShape) -> AttributeStorage {
    AttributeStorage::Json {
        shape,
        codec: JsonCodec::new(shape).for_attribute(name),
        comparer: ChangeComparer::for_shape(shape),
    }
}

/// Descriptors of every entity type a session may use. Immutable once built.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entities: HashMap<TypeId, Arc<EntityDescriptor>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn descriptor<E: Entity>(&self) -> Result<Arc<EntityDescriptor>> {
        self.entities.get(&TypeId::of::<E>()).cloned().ok_or_else(|| {
            DbError::SchemaError(format!(
                "{} is not registered with this session",
                E::DECLARATION.type_name
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    entities: HashMap<TypeId, Arc<EntityDescriptor>>,
}

impl SchemaRegistryBuilder {
    pub fn register<E: Entity>(mut self) -> Result<Self> {
        let descriptor = describe(&E::DECLARATION)?;

        if self.entities.contains_key(&TypeId::of::<E>()) {
            return Err(DbError::SchemaError(format!(
                "{} is registered twice",
                descriptor.type_name()
            )));
        }
        if let Some(other) = self
            .entities
            .values()
            .find(|d| d.table().eq_ignore_ascii_case(descriptor.table()))
        {
            return Err(DbError::SchemaError(format!(
                "{} and {} both map to table '{}'",
                other.type_name(),
                descriptor.type_name(),
                descriptor.table()
            )));
        }

        self.entities.insert(TypeId::of::<E>(), Arc::new(descriptor));
        Ok(self)
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            entities: self.entities,
        }
    }
}
