//! Core error types for the statute corpus.
//!
//! This module defines the central error type shared by all subsystems.
//! Subsystem crates define their own error enums and convert into this one
//! at the boundaries where a single type is convenient.

use thiserror::Error;

/// Central error type for statute corpus operations.
#[derive(Error, Debug)]
pub enum StatuteError {
    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Empty names, ids that are not hex digests and similar input faults
    #[error("invalid input: {0}")]
    Validation(String),

    /// Unknown corpus category name
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Persistence errors (directory creation, file writes)
    #[error("persistence error at {path}: {reason}")]
    Persistence {
        /// Path that could not be written
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Filesystem failure outside the artifact store
    #[error("filesystem: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while locating, reading or checking `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory
    #[error("no home directory to place statute-corpus data under")]
    NoProjectDirs,

    /// TOML that does not match [`crate::AppConfig`]
    #[error("malformed config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    /// Reading the file failed
    #[error("config file unreadable: {0}")]
    Io(#[from] std::io::Error),

    /// A setting outside its allowed range
    #[error("{field} {reason}")]
    InvalidValue {
        /// Dotted path of the setting
        field: String,
        /// What the value must satisfy
        reason: String,
    },
}

/// Result type alias using `StatuteError`.
pub type Result<T> = std::result::Result<T, StatuteError>;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StatuteError::Validation("jurisdiction must have a name".to_string());
        assert_eq!(
            err.to_string(),
            "invalid input: jurisdiction must have a name"
        );

        let err = StatuteError::Persistence {
            path: "/data/states/Ohio".to_string(),
            reason: "read-only filesystem".to_string(),
        };
        assert!(err.to_string().contains("/data/states/Ohio"));
    }

    #[test]
    fn test_config_errors_pass_through() {
        let err: StatuteError = ConfigError::InvalidValue {
            field: "crawler.max_concurrency".to_string(),
            reason: "must be at least 1".to_string(),
        }
        .into();
        assert!(matches!(err, StatuteError::Config(_)));
        assert_eq!(err.to_string(), "crawler.max_concurrency must be at least 1");
    }
}
