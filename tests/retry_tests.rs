use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use jsoncolumn::core::{Column, Schema};
use jsoncolumn::{
    BackendCapabilities, Connection, DataType, DbError, InMemoryStorage, QueryResult, Result,
    RetryPolicy, Statement, StorageBackend, StorageConfig,
};

/// Fails the first `failures` statements with the given error.
struct FlakyBackend {
    inner: InMemoryStorage,
    failures: usize,
    error: DbError,
    calls: AtomicUsize,
}

impl FlakyBackend {
    fn new(failures: usize, error: DbError) -> Self {
        Self {
            inner: InMemoryStorage::new(),
            failures,
            error,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.inner.capabilities()
    }

    async fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        self.inner.create_table(name, schema).await
    }

    async fn table_exists(&self, name: &str) -> bool {
        self.inner.table_exists(name).await
    }

    async fn execute(&self, statement: Statement) -> Result<QueryResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(self.error.clone());
        }
        self.inner.execute(statement).await
    }
}

fn fast_retries(max_retries: u32) -> StorageConfig {
    StorageConfig::new("retry").retry(RetryPolicy {
        max_retries,
        base_backoff_ms: 1,
        max_backoff_ms: 4,
    })
}

async fn connect(backend: &Arc<FlakyBackend>, config: StorageConfig) -> anyhow::Result<Connection> {
    let connection = Connection::new(backend.clone(), config)?;
    connection
        .create_table(
            "Items",
            Schema::new(vec![Column::new("Id", DataType::Integer).primary_key()]),
        )
        .await?;
    Ok(connection)
}

fn insert(id: i64) -> Statement {
    Statement::Insert {
        table: "Items".into(),
        columns: vec!["Id".into()],
        rows: vec![vec![id.into()]],
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() -> anyhow::Result<()> {
    let backend = Arc::new(FlakyBackend::new(2, DbError::TransientStorage("lock wait".into())));
    let connection = connect(&backend, fast_retries(3)).await?;

    let result = connection.execute(insert(1)).await?;
    assert_eq!(result.affected_rows, 1);
    assert_eq!(backend.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_storage_error() -> anyhow::Result<()> {
    let backend = Arc::new(FlakyBackend::new(10, DbError::TransientStorage("gone away".into())));
    let connection = connect(&backend, fast_retries(2)).await?;

    let err = connection.execute(insert(1)).await.unwrap_err();
    assert!(matches!(err, DbError::StorageError(_)));
    assert!(!err.is_retryable());
    assert_eq!(backend.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn test_non_transient_failures_are_not_retried() -> anyhow::Result<()> {
    let backend = Arc::new(FlakyBackend::new(
        1,
        DbError::ConstraintError("duplicate".into()),
    ));
    let connection = connect(&backend, fast_retries(5)).await?;

    let err = connection.execute(insert(1)).await.unwrap_err();
    assert!(matches!(err, DbError::ConstraintError(_)));
    assert_eq!(backend.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_zero_retries() -> anyhow::Result<()> {
    let backend = Arc::new(FlakyBackend::new(1, DbError::TransientStorage("blip".into())));
    let connection = connect(&backend, fast_retries(0)).await?;

    assert!(connection.execute(insert(1)).await.is_err());
    assert_eq!(backend.calls(), 1);
    connection.execute(insert(1)).await?;
    Ok(())
}
