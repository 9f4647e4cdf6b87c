#![allow(dead_code)]

use std::sync::Arc;

use jsoncolumn::fixtures::{self, IceCream};
use jsoncolumn::{Connection, InMemoryStorage, SchemaRegistry, Session, StorageConfig};

pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub session: Session,
}

pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::builder()
            .register::<IceCream>()
            .expect("ice cream declaration is valid")
            .build(),
    )
}

pub async fn empty_with(config: StorageConfig) -> anyhow::Result<Harness> {
    let storage = Arc::new(
        InMemoryStorage::with_capabilities(config.capabilities).with_journal(256),
    );
    let connection = Connection::new(storage.clone(), config)?;
    let session = Session::new(connection, registry());
    session.ensure_table::<IceCream>().await?;
    Ok(Harness { storage, session })
}

pub async fn seeded_with(config: StorageConfig) -> anyhow::Result<Harness> {
    let harness = empty_with(config).await?;
    harness.session.create(fixtures::seed()?).await?;
    harness.storage.clear_journal()?;
    Ok(harness)
}

pub async fn seeded() -> anyhow::Result<Harness> {
    seeded_with(StorageConfig::default()).await
}

pub fn ids(loaded: &jsoncolumn::Loaded<IceCream>) -> Vec<i64> {
    loaded.iter().map(|ice_cream| ice_cream.id).collect()
}
