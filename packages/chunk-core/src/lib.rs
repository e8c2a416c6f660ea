//! chunk-core: the chunking pipeline.
//!
//! Scans a workspace, diffs it against the last Merkle snapshot, serves
//! unchanged files from the content-addressed chunk cache, dispatches
//! changed files through the per-language AST chunker (or the line-based
//! fallback), and routes the resulting chunks to an external `ChunkSink`.
//! Depends on `chunk-storage` for the durable state (cache, Merkle
//! snapshot, domain types) and knows nothing about SQLite directly.

pub mod chunking;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod progress;
pub mod registry;
pub mod router;
pub mod scanner;
pub mod session;
pub mod sink;

pub use chunking::{AstChunker, ChunkOutcome, LineChunker};
pub use config::{CacheConfig, Config, ConfigError, SinkConfig};
pub use dispatch::{CancelToken, Dispatcher, FileChunkResult};
pub use error::{CoreError, Result};
pub use progress::{ChunkMeta, FileProgress, ProgressTracker};
pub use registry::{LanguageId, LanguageRegistry, Route};
pub use router::{ChunkRouter, RouteSummary};
pub use scanner::{FileScanner, ScanResult, ScannedFile};
pub use session::{SearchFilters, SearchHit, Session, SessionManager};
pub use sink::{ChunkSink, EmbedResponse, EmbedStatus, NullSink, SinkError, UpsertResponse, VectorRecord};
