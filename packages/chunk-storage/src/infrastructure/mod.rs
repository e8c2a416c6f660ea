//! Infrastructure: SQLite-backed cache and filesystem-backed snapshot store.

mod merkle_store;
mod sqlite_cache;

pub use merkle_store::{build_root_hash, MerkleStore, SNAPSHOT_FILE_NAME};
pub use sqlite_cache::{BatchCheck, CacheLimits, CachedChunk, ChunkCache};
