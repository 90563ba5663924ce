//! Persistence adapters and blob encoding.
//!
//! The engine persists two independent JSON blobs (the ledger and the
//! message set) through an injected [`KeyValueStore`]. Writes are advisory:
//! callers log and swallow failures.

mod blob;
mod config;
mod memory;
mod sqlite;

pub use blob::{decode_each, encode_blob, BlobReader, SCHEMA_VERSION};
pub use config::{Config, PreferencesConfig, StorageConfig};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{ConfigError, StorageError};

/// Storage key of the engagement and cooldown ledger.
pub const LEDGER_KEY: &str = "coach.ledger";

/// Storage key of the message set.
pub const MESSAGES_KEY: &str = "coach.messages";

/// Async get/set of JSON strings by key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Returns `~/.config/coachroom[-dev]/` based on COACHROOM_ENV.
///
/// Set COACHROOM_ENV=dev to use the development data directory, or
/// COACHROOM_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("COACHROOM_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("COACHROOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("coachroom-dev")
            } else {
                base_dir.join("coachroom")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
