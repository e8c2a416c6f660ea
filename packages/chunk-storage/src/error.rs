//! Error types for chunk-storage

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (snapshot file, cache db path)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Merkle snapshot is present but unreadable (bad schema version, corrupt JSON)
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Generic cache error, never fatal to the pipeline (spec: CacheError is best-effort)
    #[error("cache error: {0}")]
    Cache(String),
}

impl StorageError {
    pub fn cache(msg: impl Into<String>) -> Self {
        StorageError::Cache(msg.into())
    }
}

/// Result type alias for chunk-storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
