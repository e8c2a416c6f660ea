//! SQLite-backed `ChunkCache` — content-addressed store of prior `ChunkSet`s
//! with TTL + LRU + size-cap eviction (spec.md §4.3, schema in §6).

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{cache_key, CacheEntryMeta, Chunk, ChunkSet};
use crate::error::{Result, StorageError};

/// Payloads larger than this (pre-compression) get gzip+base64 wrapped
/// before being stored as the `data` BLOB (spec.md §4.3: "> 1 KiB").
const COMPRESS_THRESHOLD_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct CacheLimits {
    pub max_entries: u64,
    pub max_size_bytes: u64,
    pub ttl_hours: u64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        // Matches spec.md §9's "prod" preset; callers should prefer an
        // explicit value sourced from `Config` over this default.
        Self {
            max_entries: 100_000,
            max_size_bytes: 1024 * 1024 * 1024,
            ttl_hours: 24 * 7,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchCheck {
    pub cached: Vec<String>,
    pub uncached: Vec<String>,
    pub expired: Vec<String>,
}

pub struct ChunkCache {
    conn: Arc<Mutex<Connection>>,
    limits: CacheLimits,
}

impl ChunkCache {
    pub fn open(db_path: impl AsRef<Path>, limits: CacheLimits) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            limits,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn in_memory(limits: CacheLimits) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            limits,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key     TEXT PRIMARY KEY,
                file_path     TEXT NOT NULL,
                file_hash     TEXT NOT NULL,
                data          BLOB NOT NULL,
                data_size     INTEGER NOT NULL,
                compressed    INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL,
                last_accessed TEXT NOT NULL
            )",
            [],
        )?;
        for (name, col) in [
            ("idx_cache_file_path", "file_path"),
            ("idx_cache_file_hash", "file_hash"),
            ("idx_cache_created_at", "created_at"),
            ("idx_cache_last_accessed", "last_accessed"),
            ("idx_cache_data_size", "data_size"),
        ] {
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS {name} ON cache_entries({col})"),
                [],
            )?;
        }
        Ok(())
    }

    fn encode(&self, set: &ChunkSet) -> Result<(Vec<u8>, bool)> {
        let json = serde_json::to_vec(set)?;
        if json.len() > COMPRESS_THRESHOLD_BYTES {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json)?;
            let gz = encoder.finish()?;
            Ok((base64_encode(&gz), true))
        } else {
            Ok((json, false))
        }
    }

    fn decode(&self, data: &[u8], compressed: bool) -> Result<ChunkSet> {
        let json = if compressed {
            let raw = base64_decode(data)
                .map_err(|e| StorageError::CorruptSnapshot(format!("bad base64 in cache row: {e}")))?;
            let mut decoder = GzDecoder::new(raw.as_slice());
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            out
        } else {
            data.to_vec()
        };
        Ok(serde_json::from_slice(&json)?)
    }

    /// Age in hours beyond which a row is treated as absent (spec.md §4.3).
    fn is_expired(&self, created_at: &str) -> bool {
        match chrono::DateTime::parse_from_rfc3339(created_at) {
            Ok(created) => {
                let age = Utc::now().signed_duration_since(created.with_timezone(&Utc));
                age.num_hours() >= self.limits.ttl_hours as i64
            }
            Err(_) => true, // unparsable timestamp, treat conservatively as expired
        }
    }

    pub fn get(&self, file_path: &str, file_hash: &str) -> Result<Option<ChunkSet>> {
        let key = cache_key(file_path, file_hash);
        let conn = self.conn.lock().unwrap();

        let row: Option<(Vec<u8>, bool, String)> = conn
            .query_row(
                "SELECT data, compressed, created_at FROM cache_entries WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0, row.get(2)?)),
            )
            .optional()?;

        let Some((data, compressed, created_at)) = row else {
            return Ok(None);
        };

        if self.is_expired(&created_at) {
            conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![key])?;
            return Ok(None);
        }

        conn.execute(
            "UPDATE cache_entries SET last_accessed = ?1 WHERE cache_key = ?2",
            params![Utc::now().to_rfc3339(), key],
        )?;

        drop(conn);
        self.decode(&data, compressed).map(Some)
    }

    pub fn set(&self, file_path: &str, file_hash: &str, set: &ChunkSet) -> Result<()> {
        let key = cache_key(file_path, file_hash);
        let (data, compressed) = self.encode(set)?;
        let now = Utc::now().to_rfc3339();

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO cache_entries
                    (cache_key, file_path, file_hash, data, data_size, compressed, created_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(cache_key) DO UPDATE SET
                    data = excluded.data,
                    data_size = excluded.data_size,
                    compressed = excluded.compressed,
                    created_at = excluded.created_at,
                    last_accessed = excluded.created_at",
                params![key, file_path, file_hash, data, data.len() as i64, compressed as i64, now],
            )?;
        }

        self.enforce_limits()
    }

    pub fn has(&self, file_path: &str, file_hash: &str) -> Result<bool> {
        let key = cache_key(file_path, file_hash);
        let conn = self.conn.lock().unwrap();
        let created_at: Option<String> = conn
            .query_row(
                "SELECT created_at FROM cache_entries WHERE cache_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match created_at {
            None => Ok(false),
            Some(created_at) => {
                if self.is_expired(&created_at) {
                    conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![key])?;
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
        }
    }

    /// `batchCheck(files) -> {cached, uncached, expired}` keyed by `file_path`.
    pub fn batch_check(&self, files: &[(String, String)]) -> Result<BatchCheck> {
        let mut result = BatchCheck::default();
        for (path, hash) in files {
            let key = cache_key(path, hash);
            let conn = self.conn.lock().unwrap();
            let created_at: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM cache_entries WHERE cache_key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            drop(conn);

            match created_at {
                None => result.uncached.push(path.clone()),
                Some(created_at) if self.is_expired(&created_at) => {
                    result.expired.push(path.clone());
                    self.invalidate_file(path)?;
                }
                Some(_) => result.cached.push(path.clone()),
            }
        }
        Ok(result)
    }

    pub fn invalidate_file(&self, file_path: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM cache_entries WHERE file_path = ?1",
            params![file_path],
        )?;
        Ok(())
    }

    pub fn clean_expired(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cutoff = Utc::now() - chrono::Duration::hours(self.limits.ttl_hours as i64);
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }

    /// Evict LRU entries until `entryCount <= maxEntries` AND
    /// `totalBytes <= 0.8 * maxSizeBytes` (spec.md §4.3).
    pub fn enforce_limits(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let target_bytes = (self.limits.max_size_bytes as f64 * 0.8) as i64;
        let mut evicted = 0usize;

        loop {
            let (count, total_bytes): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(data_size), 0) FROM cache_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            if count <= self.limits.max_entries as i64 && total_bytes <= target_bytes {
                break;
            }

            let oldest: Option<String> = conn
                .query_row(
                    "SELECT cache_key FROM cache_entries ORDER BY last_accessed ASC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            match oldest {
                Some(key) => {
                    conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![key])?;
                    evicted += 1;
                }
                None => break,
            }
        }

        Ok(evicted)
    }

    pub fn entry_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?)
    }

    pub fn list_meta(&self) -> Result<Vec<CacheEntryMeta>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT cache_key, file_path, file_hash, data_size, created_at, last_accessed
             FROM cache_entries ORDER BY last_accessed ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CacheEntryMeta {
                cache_key: row.get(0)?,
                file_path: row.get(1)?,
                file_hash: row.get(2)?,
                data_size: row.get(3)?,
                created_at: row.get(4)?,
                last_accessed: row.get(5)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)
    }
}

fn base64_encode(bytes: &[u8]) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes).into_bytes()
}

fn base64_decode(bytes: &[u8]) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(bytes)
}

/// Convenience re-export so callers can build a `ChunkSet` without reaching
/// into `crate::domain` directly in common cache-only call sites.
pub type CachedChunk = Chunk;
