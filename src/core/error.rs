use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    /// Static mapping misconfiguration, detected when descriptors are built.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Stored JSON does not match the attribute's declared shape.
    #[error("Decode error in '{attribute}': {message}")]
    DecodeError { attribute: String, message: String },

    /// Navigation into an opaque document hit a kind mismatch or a missing member.
    #[error("Document access error: {0}")]
    DocumentAccessError(String),

    #[error("Constraint violation: {0}")]
    ConstraintError(String),

    #[error("Unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// Retryable storage failure. The connection retries these and never
    /// surfaces one to its caller.
    #[error("Transient storage failure: {0}")]
    TransientStorage(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn decode(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DecodeError {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStorage(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(DbError::TransientStorage("timeout".into()).is_retryable());
        assert!(!DbError::StorageError("gone".into()).is_retryable());
        assert!(!DbError::ConstraintError("dup".into()).is_retryable());
        assert!(!DbError::decode("Values", "bad").is_retryable());
    }

    #[test]
    fn decode_error_names_the_attribute() {
        let err = DbError::decode("FoodAdditives", "expected array");
        assert_eq!(
            err.to_string(),
            "Decode error in 'FoodAdditives': expected array"
        );
    }
}
