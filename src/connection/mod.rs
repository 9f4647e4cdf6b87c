pub mod config;

use crate::core::{DbError, Result, Schema};
use crate::result::QueryResult;
use crate::storage::{BackendCapabilities, InMemoryStorage, Statement, StorageBackend};
use std::sync::Arc;
use tracing::{debug, warn};

pub use config::{RetryPolicy, StorageConfig};

/// Handle to a storage backend with the configured retry policy applied.
///
/// Transient failures are retried with exponential backoff; once retries are
/// exhausted the caller sees a non-retryable `StorageError`.
#[derive(Clone)]
pub struct Connection {
    backend: Arc<dyn StorageBackend>,
    config: StorageConfig,
}

impl Connection {
    pub fn new(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Fresh in-memory store honoring `config.capabilities`.
    pub fn in_memory(config: StorageConfig) -> Result<Self> {
        let storage = InMemoryStorage::with_capabilities(config.capabilities);
        Self::new(Arc::new(storage), config)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Functions both the backend and the configuration allow.
    pub fn capabilities(&self) -> BackendCapabilities {
        let backend = self.backend.capabilities();
        let allowed = self.config.capabilities;
        BackendCapabilities {
            json_contains: backend.json_contains && allowed.json_contains,
            json_search: backend.json_search && allowed.json_search,
            json_extract: backend.json_extract && allowed.json_extract,
            like: backend.like && allowed.like,
        }
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.backend.table_exists(name).await
    }

    pub async fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.backend.create_table(name, schema.clone()).await {
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    self.backoff_or_fail(attempt, "CREATE TABLE", err).await?;
                }
                other => return other,
            }
        }
    }

    pub async fn execute(&self, statement: Statement) -> Result<QueryResult> {
        if self.config.log_statements {
            debug!(
                kind = statement.kind(),
                table = statement.table(),
                sql = %statement.sql(),
                "executing"
            );
        }

        let mut attempt = 0;
        loop {
            match self.backend.execute(statement.clone()).await {
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    self.backoff_or_fail(attempt, statement.kind(), err).await?;
                }
                other => return other,
            }
        }
    }

    async fn backoff_or_fail(&self, attempt: u32, operation: &str, err: DbError) -> Result<()> {
        let policy = self.config.retry;
        if attempt > policy.max_retries {
            warn!(operation, attempts = attempt, error = %err, "retries exhausted");
            return Err(DbError::StorageError(format!(
                "{} failed after {} attempts: {}",
                operation, attempt, err
            )));
        }

        let delay = policy.backoff(attempt);
        warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient storage failure, retrying"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capabilities_are_intersected() {
        let config = StorageConfig::new("db").capabilities(BackendCapabilities {
            json_search: false,
            ..BackendCapabilities::all()
        });
        let conn = Connection::in_memory(config).unwrap();
        let caps = conn.capabilities();
        assert!(caps.json_contains);
        assert!(!caps.json_search);
    }

    #[tokio::test]
    async fn non_retryable_errors_pass_through() {
        let conn = Connection::in_memory(StorageConfig::default()).unwrap();
        let err = conn
            .execute(Statement::Update {
                table: "Missing".into(),
                key_column: "Id".into(),
                key: 1.into(),
                assignments: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StorageError(msg) if msg.contains("not found")));
    }
}
