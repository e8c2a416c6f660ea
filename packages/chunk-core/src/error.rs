//! Error taxonomy for chunk-core (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Fatal, at construction.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Per-file, logged, file marked failed. Never aborts the pipeline.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Recovered via the four-stage fallback ladder; surfaced only for
    /// logging, never fatal.
    #[error("parse error on {path}: {message}")]
    Parse { path: String, message: String },

    /// Best-effort; never surfaced to the pipeline's caller.
    #[error("cache error: {0}")]
    Cache(#[from] chunk_storage::StorageError),

    /// Retried per spec.md §4.9; terminal failures mark affected chunks failed.
    #[error("sink error: {0}")]
    Sink(String),

    /// Propagated on cancellation.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CoreError>;
