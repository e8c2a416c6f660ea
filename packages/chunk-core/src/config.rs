//! Frozen pipeline configuration (spec.md §6).
//!
//! `Config` is assembled once, validated, and never mutated afterward. The
//! core never loads YAML or environment variables itself (out of scope per
//! spec.md §1) — an external loader deserializes into this struct and hands
//! it to `Config::validated`.

use chunk_storage::CacheLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {value} is not in range {min}..={max}")]
    Range {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub db_path: String,
    pub max_size_bytes: u64,
    pub max_entries: u64,
    pub ttl_hours: u64,
    pub compression: bool,
}

impl CacheConfig {
    /// Matches spec.md §9's documented test preset (1h / 50MB).
    pub fn test_preset(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            max_size_bytes: 50 * 1024 * 1024,
            max_entries: 10_000,
            ttl_hours: 1,
            compression: false,
        }
    }

    /// Matches spec.md §9's documented prod preset (7d / 1GB).
    pub fn prod_preset(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            max_size_bytes: 1024 * 1024 * 1024,
            max_entries: 500_000,
            ttl_hours: 24 * 7,
            compression: true,
        }
    }

    pub fn limits(&self) -> CacheLimits {
        CacheLimits {
            max_entries: self.max_entries,
            max_size_bytes: self.max_size_bytes,
            ttl_hours: self.ttl_hours,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub endpoint_embed: String,
    pub endpoint_upsert: String,
    pub token: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint_embed: String::new(),
            endpoint_upsert: String::new(),
            token: String::new(),
            timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 500,
            backoff_multiplier: 2.0,
            poll_interval_ms: 1_000,
            max_poll_attempts: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub workspace_path: String,
    pub allowed_extensions: Vec<String>,
    pub ignore_globs: Vec<String>,
    pub ignored_dirs: Vec<String>,
    pub max_file_size: u64,
    pub lines_per_chunk: usize,
    pub max_chunk_bytes: usize,
    pub concurrency: usize,
    pub batch_size: usize,
    pub cache: CacheConfig,
    pub sink: SinkConfig,
}

impl Config {
    /// Construct and validate in one step, matching the teacher's
    /// `ConfigError::range_with_hint` style validation in `config/stage_configs.rs`.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.max_chunk_bytes == 0 || self.max_chunk_bytes > 1_000_000 {
            return Err(ConfigError::Range {
                field: "max_chunk_bytes",
                value: self.max_chunk_bytes.to_string(),
                min: "1".to_string(),
                max: "1000000".to_string(),
            });
        }
        if self.lines_per_chunk == 0 {
            return Err(ConfigError::Invalid(
                "lines_per_chunk must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_extensions must not be empty".to_string(),
            ));
        }
        Ok(self)
    }

    /// A reasonable default for local development: single-threaded
    /// dispatch (spec.md §4.7: "the source runs effectively single-threaded"),
    /// 50-line chunks, 9 KiB cap, test cache preset.
    pub fn default_for_workspace(workspace_path: impl Into<String>) -> Self {
        let workspace_path = workspace_path.into();
        Self {
            allowed_extensions: default_extensions(),
            ignore_globs: default_ignore_globs(),
            ignored_dirs: default_ignored_dirs(),
            max_file_size: 5 * 1024 * 1024,
            lines_per_chunk: 50,
            max_chunk_bytes: chunk_storage::MAX_CHUNK_BYTES,
            concurrency: 1,
            batch_size: 100,
            cache: CacheConfig::test_preset(format!("{workspace_path}/.chunkcache/cache.sqlite3")),
            sink: SinkConfig::default(),
            workspace_path,
        }
    }
}

fn default_extensions() -> Vec<String> {
    [
        "py", "pyi", "java", "js", "jsx", "mjs", "cjs", "ts", "tsx", "c", "h", "cc", "cpp", "cxx",
        "hpp", "cs", "go", "rs", "php", "json", "yaml", "yml", "xml", "html", "css", "md", "txt",
        "sh", "sql",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_ignore_globs() -> Vec<String> {
    ["**/target/**", "**/node_modules/**", "**/.git/**", "**/dist/**", "**/build/**"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_ignored_dirs() -> Vec<String> {
    [".git", "node_modules", "target", "dist", "build", ".chunkcache"]
        .into_iter()
        .map(String::from)
        .collect()
}
