// ============================================================================
// jsoncolumn Library
// ============================================================================
//
// Relational persistence for records with semi-structured JSON attributes:
// per-attribute JSON codecs, change tracking against decoded snapshots, and
// JSON predicates lowered to native JSON functions of the backing store.

pub mod core;
pub mod json;
pub mod storage;
pub mod result;
pub mod connection;
pub mod persist;
pub mod query;
pub mod fixtures;
pub mod parser;
mod plugins;
mod evaluator;
mod expression;

// Re-export main types for convenience
pub use core::{DataType, DbError, Result, Value};
pub use result::QueryResult;

pub use connection::{Connection, RetryPolicy, StorageConfig};
pub use json::{ChangeComparer, Document, JsonCodec, JsonKind, JsonPath, JsonShape, Node};
pub use persist::{
    AttributeDecl, AttributeType, AttributeValue, Attributes, Entity, EntityDecl, Loaded,
    OrderBy, SaveReport, SchemaRegistry, Session, Tracked,
};
pub use query::{Filter, NativeExpression, Predicate, QueryTranslator};
pub use storage::{BackendCapabilities, InMemoryStorage, Statement, StorageBackend};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn session_round_trip() {
        let registry = Arc::new(
            SchemaRegistry::builder()
                .register::<fixtures::IceCream>()
                .unwrap()
                .build(),
        );
        let session = Session::new(
            Connection::in_memory(StorageConfig::default()).unwrap(),
            registry,
        );

        assert!(session.ensure_table::<fixtures::IceCream>().await.unwrap());
        assert!(!session.ensure_table::<fixtures::IceCream>().await.unwrap());

        session.create(fixtures::seed().unwrap()).await.unwrap();
        let found = session
            .find::<fixtures::IceCream>(2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Chocolate");
        assert!(session.find::<fixtures::IceCream>(99).await.unwrap().is_none());
    }
}
