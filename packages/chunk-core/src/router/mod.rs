//! ChunkRouter — batches processed chunks and streams them to a `ChunkSink`
//! with retry and exponential backoff (spec.md §4.9).

use std::sync::Arc;
use std::time::Duration;

use chunk_storage::{Chunk, Status};
use tracing::{error, warn};

use crate::progress::ProgressTracker;
use crate::sink::{ChunkSink, SinkError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    pub accepted: usize,
    pub failed: usize,
}

impl RouteSummary {
    fn merge(&mut self, other: RouteSummary) {
        self.accepted += other.accepted;
        self.failed += other.failed;
    }
}

pub struct ChunkRouter {
    sink: Arc<dyn ChunkSink>,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
    backoff_multiplier: f64,
}

impl ChunkRouter {
    pub fn new(
        sink: Arc<dyn ChunkSink>,
        batch_size: usize,
        max_retries: u32,
        retry_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
            max_retries,
            retry_delay,
            backoff_multiplier,
        }
    }

    /// Pushes `chunks` to the sink in batches of at most `batch_size`
    /// (spec.md §4.9: "emits at most batchSize items per call"). Chunks must
    /// already be registered with `progress` (spec.md §4.8); this call only
    /// transitions their status. Never drops a chunk silently: every chunk
    /// in the input ends up either `Completed` or `Failed`.
    pub async fn route(&self, chunks: &[Chunk], progress: &ProgressTracker) -> RouteSummary {
        let mut summary = RouteSummary::default();
        for batch in chunks.chunks(self.batch_size) {
            summary.merge(self.send_batch_with_retry(batch, progress).await);
        }
        summary
    }

    async fn send_batch_with_retry(&self, batch: &[Chunk], progress: &ProgressTracker) -> RouteSummary {
        let mut attempt = 0u32;
        let mut delay = self.retry_delay;

        loop {
            match self.sink.embed(batch).await {
                Ok(_) => {
                    for chunk in batch {
                        progress.update_chunk_status(&chunk.chunk_id, Status::Completed);
                    }
                    return RouteSummary { accepted: batch.len(), failed: 0 };
                }
                Err(SinkError::Permanent(message)) => {
                    error!("sink rejected batch permanently: {message}");
                    self.mark_failed(batch, progress);
                    return RouteSummary { accepted: 0, failed: batch.len() };
                }
                Err(SinkError::Transient(message)) => {
                    if attempt >= self.max_retries {
                        error!("sink batch exhausted {} retries: {message}", self.max_retries);
                        self.mark_failed(batch, progress);
                        return RouteSummary { accepted: 0, failed: batch.len() };
                    }
                    warn!("transient sink error (attempt {}/{}): {message}", attempt + 1, self.max_retries);
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier);
                    attempt += 1;
                }
            }
        }
    }

    fn mark_failed(&self, batch: &[Chunk], progress: &ProgressTracker) {
        for chunk in batch {
            progress.update_chunk_status(&chunk.chunk_id, Status::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::RecordingSink;
    use chunk_storage::ChunkKind;

    fn chunk(path: &str, line: u32) -> Chunk {
        Chunk::new(path.to_string(), "python", line, line, "x = 1", ChunkKind::Variable, "python_parser", None)
    }

    #[tokio::test]
    async fn successful_batch_marks_all_chunks_completed() {
        let sink = Arc::new(RecordingSink::new());
        let router = ChunkRouter::new(sink.clone(), 100, 3, Duration::from_millis(1), 2.0);
        let progress = ProgressTracker::new();
        let chunks = vec![chunk("a.py", 1), chunk("a.py", 2)];
        for c in &chunks {
            progress.register_chunk(&c.chunk_id, &c.file_path);
        }

        let summary = router.route(&chunks, &progress).await;
        assert_eq!(summary, RouteSummary { accepted: 2, failed: 0 });
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_retries_then_succeeds() {
        let sink = Arc::new(RecordingSink::failing_n_times(2));
        let router = ChunkRouter::new(sink.clone(), 100, 5, Duration::from_millis(1), 1.5);
        let progress = ProgressTracker::new();
        let chunks = vec![chunk("a.py", 1)];
        progress.register_chunk(&chunks[0].chunk_id, "a.py");

        let summary = router.route(&chunks, &progress).await;
        assert_eq!(summary, RouteSummary { accepted: 1, failed: 0 });
    }

    #[tokio::test]
    async fn retries_exhausted_marks_chunks_failed() {
        let sink = Arc::new(RecordingSink::failing_n_times(100));
        let router = ChunkRouter::new(sink, 100, 2, Duration::from_millis(1), 1.0);
        let progress = ProgressTracker::new();
        let chunks = vec![chunk("a.py", 1)];
        progress.register_chunk(&chunks[0].chunk_id, "a.py");

        let summary = router.route(&chunks, &progress).await;
        assert_eq!(summary, RouteSummary { accepted: 0, failed: 1 });
    }

    #[tokio::test]
    async fn permanent_failure_fails_immediately_without_retry() {
        let sink = Arc::new(RecordingSink::always_permanent_failure());
        let router = ChunkRouter::new(sink, 100, 10, Duration::from_millis(1), 2.0);
        let progress = ProgressTracker::new();
        let chunks = vec![chunk("a.py", 1)];
        progress.register_chunk(&chunks[0].chunk_id, "a.py");

        let summary = router.route(&chunks, &progress).await;
        assert_eq!(summary, RouteSummary { accepted: 0, failed: 1 });
    }

    #[tokio::test]
    async fn batches_are_capped_at_batch_size() {
        let sink = Arc::new(RecordingSink::new());
        let router = ChunkRouter::new(sink.clone(), 2, 3, Duration::from_millis(1), 2.0);
        let progress = ProgressTracker::new();
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk("a.py", i + 1)).collect();
        for c in &chunks {
            progress.register_chunk(&c.chunk_id, &c.file_path);
        }

        let summary = router.route(&chunks, &progress).await;
        assert_eq!(summary.accepted, 5);
        assert_eq!(sink.received.lock().unwrap().len(), 3); // 2 + 2 + 1
    }
}
