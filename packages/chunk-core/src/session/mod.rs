//! `Session` / `SessionManager` — the concrete implementation behind the
//! core's §6 entry operations (`processWorkspace`, `search`,
//! `getFileProcessingProgress`, `shutdown`).
//!
//! Replaces the "global singleton chunker instance cache keyed by
//! user⊕device⊕workspace" design note (spec.md §9) with an explicit manager
//! that owns named sessions; lifecycle is init-on-first-use, teardown on
//! explicit `shutdown`/`close`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chunk_storage::{Chunk, ChunkCache, ChunkSet, MerkleStore};
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{CancelToken, Dispatcher};
use crate::error::{CoreError, Result};
use crate::progress::{FileProgress, ProgressTracker};
use crate::registry::LanguageRegistry;
use crate::router::{ChunkRouter, RouteSummary};
use crate::scanner::FileScanner;
use crate::sink::ChunkSink;

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub language: Option<String>,
    pub file_path_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Owns one workspace's Merkle state, chunk cache handle, and progress
/// tracker. Each `process_workspace` call re-scans and re-diffs; state
/// persists across calls within the session's lifetime so repeat runs on an
/// unchanged workspace are all-cache-hit (spec.md §8, scenario 3).
pub struct Session {
    config: Config,
    cache: Arc<ChunkCache>,
    progress: Arc<ProgressTracker>,
    registry: Arc<LanguageRegistry>,
    merkle_store: MerkleStore,
    sink: Arc<dyn ChunkSink>,
    /// Last-processed chunk set per file, held for `search` (spec.md §6:
    /// an introspection operation on the core, not a real embedding index —
    /// semantic search is the external sink's job).
    last_chunks: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl Session {
    pub fn new(config: Config, sink: Arc<dyn ChunkSink>) -> Result<Self> {
        let config = config.validated().map_err(CoreError::Config)?;
        std::fs::create_dir_all(Path::new(&config.cache.db_path).parent().unwrap_or(Path::new(".")))
            .map_err(|e| CoreError::Io { path: config.cache.db_path.clone(), source: e })?;

        let cache = ChunkCache::open(&config.cache.db_path, config.cache.limits()).map_err(CoreError::Cache)?;
        let merkle_dir = merkle_dir_for(&config.cache.db_path);
        let merkle_store = MerkleStore::new(merkle_dir, config.cache.compression);

        Ok(Self {
            cache: Arc::new(cache),
            progress: Arc::new(ProgressTracker::new()),
            registry: Arc::new(LanguageRegistry::new()),
            merkle_store,
            sink,
            last_chunks: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Drives the full pipeline: scan -> hash -> Merkle-diff -> cache lookup
    /// -> dispatch uncached -> cache-store -> merge -> route (spec.md §2).
    /// Returns `true` iff at least one chunk was accepted by the sink, or
    /// every file resolved to a cache hit (spec.md §7).
    pub async fn process_workspace(&self, cancel: CancelToken) -> Result<bool> {
        let root = PathBuf::from(&self.config.workspace_path);
        let scan = FileScanner::new(&self.config).scan(&root)?;
        self.progress.register_files(scan.files.iter().map(|f| f.path.clone()));
        info!(files = scan.files.len(), "scan complete");

        let timestamp_ms = 0; // caller-supplied clock in the real adapter; deterministic here.
        let current_snapshot = self.merkle_store.build_snapshot(
            &self.config.workspace_path,
            timestamp_ms,
            scan.files.iter().map(|f| (f.path.clone(), f.content_hash.clone(), f.size)),
        );
        let previous_snapshot = self.merkle_store.load().map_err(CoreError::Cache)?;
        let diff = match &previous_snapshot {
            Some(previous) => MerkleStore::diff(previous, &current_snapshot),
            None => chunk_storage::MerkleDiff {
                added: scan.files.iter().map(|f| f.path.clone()).collect(),
                modified: Vec::new(),
                removed: Vec::new(),
            },
        };
        if !diff.is_empty() || previous_snapshot.is_none() {
            info!(added = diff.added.len(), modified = diff.modified.len(), removed = diff.removed.len(), "workspace changed");
        }
        self.merkle_store.persist(&current_snapshot).map_err(CoreError::Cache)?;

        let pairs: Vec<(String, String)> =
            scan.files.iter().map(|f| (f.path.clone(), f.content_hash.clone())).collect();
        let batch = self.cache.batch_check(&pairs).map_err(CoreError::Cache)?;
        let cached_paths: std::collections::HashSet<&str> = batch.cached.iter().map(String::as_str).collect();

        let (cached_files, uncached_files): (Vec<_>, Vec<_>) =
            scan.files.into_iter().partition(|f| cached_paths.contains(f.path.as_str()));

        let mut merged: Vec<Chunk> = Vec::new();
        let mut last_chunks = self.last_chunks.write().unwrap();

        for file in &cached_files {
            match self.cache.get(&file.path, &file.content_hash).map_err(CoreError::Cache)? {
                Some(chunk_set) => {
                    for chunk in &chunk_set.chunks {
                        self.progress.register_chunk(&chunk.chunk_id, &file.path);
                    }
                    self.progress.update_file_status(&file.path, chunk_storage::Status::Completed);
                    last_chunks.insert(file.path.clone(), chunk_set.chunks.clone());
                    merged.extend(chunk_set.chunks);
                }
                None => {
                    warn!(file = file.path, "cache reported a hit but the row vanished; treating as uncached");
                    self.progress.update_file_status(&file.path, chunk_storage::Status::Pending);
                }
            }
        }
        drop(last_chunks);

        let uncached_count = uncached_files.len();
        if uncached_count > 0 {
            let dispatcher = Dispatcher::new(self.config.concurrency, Duration::from_secs(30));
            let results = dispatcher
                .dispatch(uncached_files, self.registry.clone(), self.progress.clone(), cancel.clone(), self.config.lines_per_chunk)
                .await;

            let hash_by_path: HashMap<&str, &str> =
                pairs.iter().map(|(p, h)| (p.as_str(), h.as_str())).collect();
            let mut last_chunks = self.last_chunks.write().unwrap();

            for result in results {
                if result.failed {
                    continue;
                }
                for parent_id in &result.split_parents {
                    self.progress.register_chunk(parent_id, &result.path);
                }
                for chunk in &result.chunks {
                    self.progress.register_chunk(&chunk.chunk_id, &result.path);
                }
                if let Some(hash) = hash_by_path.get(result.path.as_str()) {
                    let chunk_set = ChunkSet::new(result.path.clone(), hash.to_string(), result.chunks.clone(), "0");
                    if let Err(e) = self.cache.set(&result.path, hash, &chunk_set) {
                        warn!(file = result.path, error = %e, "cache write failed; continuing uncached (spec.md §7 CacheError)");
                    }
                }
                last_chunks.insert(result.path.clone(), result.chunks.clone());
                merged.extend(result.chunks);
            }
        }

        let router = ChunkRouter::new(
            self.sink.clone(),
            self.config.batch_size,
            self.config.sink.max_retries,
            Duration::from_millis(self.config.sink.retry_delay_ms),
            self.config.sink.backoff_multiplier,
        );
        let RouteSummary { accepted, .. } = router.route(&merged, &self.progress).await;

        Ok(accepted > 0 || uncached_count == 0)
    }

    /// Introspection operation (spec.md §6): a substring match over the
    /// last-processed chunk sets held by this session. Real semantic search
    /// is the external sink's job; this just makes the signature real and
    /// testable without reaching outside the core's scope.
    pub fn search(&self, query: &str, top_k: usize, filters: &SearchFilters) -> Vec<SearchHit> {
        let query_lower = query.to_lowercase();
        let last_chunks = self.last_chunks.read().unwrap();

        let mut hits: Vec<SearchHit> = last_chunks
            .values()
            .flatten()
            .filter(|chunk| {
                filters.language.as_deref().map_or(true, |lang| chunk.language == lang)
                    && filters.file_path_prefix.as_deref().map_or(true, |prefix| chunk.file_path.starts_with(prefix))
            })
            .filter_map(|chunk| {
                let haystack = chunk.content.to_lowercase();
                let name_match =
                    chunk.name.as_deref().map(|n| n.to_lowercase().contains(&query_lower)).unwrap_or(false);
                let content_hits = haystack.matches(&query_lower).count();
                if content_hits == 0 && !name_match {
                    return None;
                }
                let score = content_hits as f32 + if name_match { 2.0 } else { 0.0 };
                Some(SearchHit { chunk: chunk.clone(), score })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }

    pub fn get_file_processing_progress(&self) -> f64 {
        self.progress.get_overall_progress()
    }

    pub fn file_progress(&self) -> Vec<FileProgress> {
        self.progress.get_file_progress()
    }

    /// Awaits all pending cache writes and releases the session's handles.
    /// Cache writes in this implementation are synchronous (spec.md §9's
    /// "fires and forgets" note applies to the source; here `ChunkCache::set`
    /// already blocks until committed), so there is nothing to drain beyond
    /// a final `enforce_limits` pass.
    pub fn shutdown(&self) -> Result<()> {
        self.cache.enforce_limits().map_err(CoreError::Cache)?;
        Ok(())
    }
}

fn merkle_dir_for(db_path: &str) -> PathBuf {
    Path::new(db_path).parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Hash, Eq, PartialEq, Clone)]
struct SessionKey {
    user_id: String,
    device_id: String,
    workspace_path: String,
}

/// Owns named sessions, keyed by `(userId, deviceId, workspacePath)`. This
/// is the replacement for the source's global singleton chunker cache
/// (spec.md §9).
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionKey, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    fn get_or_init(
        &self,
        user_id: &str,
        device_id: &str,
        workspace_path: &str,
        token: &str,
        ignore_patterns: &[String],
        sink: Arc<dyn ChunkSink>,
    ) -> Result<Arc<Session>> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            workspace_path: workspace_path.to_string(),
        };

        if let Some(session) = self.sessions.read().unwrap().get(&key) {
            return Ok(session.clone());
        }

        let mut config = Config::default_for_workspace(workspace_path.to_string());
        config.sink.token = token.to_string();
        config.ignore_globs.extend(ignore_patterns.iter().cloned());

        let session = Arc::new(Session::new(config, sink)?);
        self.sessions.write().unwrap().insert(key, session.clone());
        Ok(session)
    }

    /// The core's single entry operation (spec.md §6).
    #[allow(clippy::too_many_arguments)]
    pub async fn process_workspace(
        &self,
        user_id: &str,
        device_id: &str,
        workspace_path: &str,
        token: &str,
        ignore_patterns: &[String],
        sink: Arc<dyn ChunkSink>,
    ) -> Result<bool> {
        let session = self.get_or_init(user_id, device_id, workspace_path, token, ignore_patterns, sink)?;
        session.process_workspace(CancelToken::new()).await
    }

    pub fn get(&self, user_id: &str, device_id: &str, workspace_path: &str) -> Option<Arc<Session>> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            workspace_path: workspace_path.to_string(),
        };
        self.sessions.read().unwrap().get(&key).cloned()
    }

    /// Explicit teardown of one session (spec.md §9: "teardown on explicit close").
    pub fn shutdown(&self, user_id: &str, device_id: &str, workspace_path: &str) -> Result<()> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            workspace_path: workspace_path.to_string(),
        };
        let session = self.sessions.write().unwrap().remove(&key);
        if let Some(session) = session {
            session.shutdown()?;
        }
        Ok(())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
