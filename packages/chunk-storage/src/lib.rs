//! chunk-storage: durable state for the chunking pipeline.
//!
//! Owns the `Chunk`/`ChunkSet` domain model, the content-addressed
//! `ChunkCache` (SQLite, TTL + LRU eviction), and the `MerkleStore`
//! (tree build/diff + snapshot persistence). Knows nothing about parsing.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::{
    cache_key, CacheEntryMeta, Chunk, ChunkKind, ChunkSet, ChunkStatus, FileHashEntry, FileStatus,
    MerkleDiff, MerkleSnapshot, MerkleSnapshotWire, Status, MAX_CHUNK_BYTES, SCHEMA_VERSION,
};
pub use error::{Result, StorageError};
pub use infrastructure::{
    build_root_hash, BatchCheck, CacheLimits, CachedChunk, ChunkCache, MerkleStore,
    SNAPSHOT_FILE_NAME,
};
