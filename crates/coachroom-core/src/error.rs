//! Core error types for coachroom-core.
//!
//! Engine operations themselves are total; errors only surface from the
//! storage adapters and from configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Key-value storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// A previous holder of the connection panicked
    #[error("Store connection poisoned")]
    Poisoned,

    /// The blocking task running the query did not complete
    #[error("Storage task failed: {0}")]
    Join(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Join(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_error_message() {
        let err = StorageError::Join("task panicked".into());
        assert_eq!(err.to_string(), "Storage task failed: task panicked");
    }

    #[test]
    fn toml_error_becomes_parse_failure() {
        let err: ConfigError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn unknown_key_message() {
        let err = ConfigError::UnknownKey("preferences.nope".into());
        assert_eq!(err.to_string(), "Unknown configuration key: preferences.nope");
    }
}
