//! Store error types.

use statute_core::StatuteError;
use thiserror::Error;

/// Statute store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or create the database.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Rejected input (missing jurisdiction name, empty statute id).
    #[error("validation error: {0}")]
    Validation(String),

    /// A persisted row could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StatuteError> for StoreError {
    fn from(err: StatuteError) -> Self {
        match err {
            StatuteError::Validation(msg) => Self::Validation(msg),
            StatuteError::Io(e) => Self::Io(e),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_through() {
        let err: StoreError = StatuteError::Validation("jurisdiction must have a name".into()).into();
        assert!(matches!(err, StoreError::Validation(ref m) if m == "jurisdiction must have a name"));
    }
}
