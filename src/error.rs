//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Construction parameters rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Key absent from both the memory and the disk tier
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Key cannot be used as a file name in the data directory
    #[error("Invalid key for persistence: {0:?}")]
    InvalidKey(String),

    /// Filesystem failure while writing or removing a persisted value
    #[error("Persistence I/O error for key {key:?}: {source}")]
    PersistenceIo {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded to or decoded from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Wraps an I/O error raised while touching the file for `key`.
    pub fn persistence(key: &str, source: std::io::Error) -> Self {
        CacheError::PersistenceIo {
            key: key.to_string(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
