pub mod entity;
pub mod schema;
pub mod session;

pub use entity::{AttributeValue, Attributes, Entity};
pub use schema::{
    AttributeDecl, AttributeDescriptor, AttributeStorage, AttributeType, EntityDecl,
    EntityDescriptor, SchemaRegistry, SchemaRegistryBuilder, describe,
};
pub use session::{Loaded, OrderBy, RowFailure, SaveReport, Session, Tracked};
