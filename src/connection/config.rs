use crate::core::{DbError, Result};
use crate::storage::BackendCapabilities;
use std::time::Duration;

/// Bounded exponential backoff for transient storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn none() -> Self {
        Self::new(0)
    }

    /// Delay before retry number `attempt` (1-based): base doubled per
    /// attempt, capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self
            .base_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 2_000,
        }
    }
}

/// Explicit configuration handed to `Connection::new`.
///
/// Format accepted by [`StorageConfig::from_url`]:
/// `memory://host/database?max_retries=3&base_backoff_ms=50&strict=true`
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub host: String,
    pub database: String,
    pub capabilities: BackendCapabilities,
    pub retry: RetryPolicy,
    /// Abort a read on the first row that fails to decode.
    pub strict_decode: bool,
    /// Log every statement at `debug` level.
    pub log_statements: bool,
}

impl StorageConfig {
    pub fn new(database: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            database: database.to_string(),
            capabilities: BackendCapabilities::all(),
            retry: RetryPolicy::default(),
            strict_decode: false,
            log_statements: true,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("memory://")
            .ok_or_else(|| DbError::StorageError("URL must start with 'memory://'".into()))?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let (host, database) = location
            .split_once('/')
            .ok_or_else(|| DbError::StorageError("Invalid host/database format".into()))?;
        if database.is_empty() || database.contains('/') {
            return Err(DbError::StorageError("Invalid database name".into()));
        }

        let mut config = Self::new(database);
        if !host.is_empty() {
            config = config.host(host);
        }

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                DbError::StorageError(format!("Invalid URL parameter '{}'", pair))
            })?;
            match key {
                "max_retries" => config.retry.max_retries = parse_param(key, value)?,
                "base_backoff_ms" => config.retry.base_backoff_ms = parse_param(key, value)?,
                "max_backoff_ms" => config.retry.max_backoff_ms = parse_param(key, value)?,
                "strict" => config.strict_decode = parse_param(key, value)?,
                "log_statements" => config.log_statements = parse_param(key, value)?,
                other => {
                    return Err(DbError::StorageError(format!(
                        "Unknown URL parameter '{}'",
                        other
                    )));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn to_url(&self) -> String {
        format!(
            "memory://{}/{}?max_retries={}&base_backoff_ms={}&max_backoff_ms={}&strict={}&log_statements={}",
            self.host,
            self.database,
            self.retry.max_retries,
            self.retry.base_backoff_ms,
            self.retry.max_backoff_ms,
            self.strict_decode,
            self.log_statements
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(DbError::StorageError("Database name cannot be empty".into()));
        }

        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(DbError::StorageError(
                "base_backoff_ms cannot exceed max_backoff_ms".into(),
            ));
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new("jsoncolumn")
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| DbError::StorageError(format!("Invalid value '{}' for '{}'", value, key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.database, "jsoncolumn");
        assert_eq!(config.retry.max_retries, 3);
        assert!(!config.strict_decode);
    }

    #[test]
    fn test_from_url() {
        let config =
            StorageConfig::from_url("memory://db.local/shop?max_retries=5&strict=true").unwrap();
        assert_eq!(config.host, "db.local");
        assert_eq!(config.database, "shop");
        assert_eq!(config.retry.max_retries, 5);
        assert!(config.strict_decode);
    }

    #[test]
    fn test_url_roundtrip() {
        let config = StorageConfig::new("shop")
            .max_retries(1)
            .strict_decode(true)
            .log_statements(false);
        assert_eq!(StorageConfig::from_url(&config.to_url()).unwrap(), config);
    }

    #[test]
    fn test_invalid_url() {
        assert!(StorageConfig::from_url("mysql://host/db").is_err());
        assert!(StorageConfig::from_url("memory://host").is_err());
        assert!(StorageConfig::from_url("memory://host/db?retries=2").is_err());
        assert!(StorageConfig::from_url("memory://host/db?strict=yes").is_err());
        assert!(
            StorageConfig::from_url("memory://host/db?base_backoff_ms=10&max_backoff_ms=1").is_err()
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_backoff_ms: 10,
            max_backoff_ms: 50,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
        assert_eq!(policy.backoff(4), Duration::from_millis(50));
        assert_eq!(policy.backoff(70), Duration::from_millis(50));
    }
}
