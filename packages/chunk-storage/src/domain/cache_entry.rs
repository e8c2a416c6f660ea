//! `CacheEntry` — the row shape backing the `ChunkCache` (spec.md §6).

/// In-memory view of one `cache_entries` row. `data` is already decoded
/// (gzip-unwrapped if needed) into a `ChunkSet` by the infrastructure layer;
/// this struct exists for APIs (`batchCheck`, eviction bookkeeping) that only
/// need the metadata, not the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntryMeta {
    pub cache_key: String,
    pub file_path: String,
    pub file_hash: String,
    pub data_size: i64,
    pub created_at: String,
    pub last_accessed: String,
}

/// `cache_key = md5(filePath ":" fileHash)`
pub fn cache_key(file_path: &str, file_hash: &str) -> String {
    format!("{:x}", md5::compute(format!("{file_path}:{file_hash}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        let a = cache_key("src/a.py", "hash1");
        let b = cache_key("src/a.py", "hash1");
        let c = cache_key("src/a.py", "hash2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }
}
