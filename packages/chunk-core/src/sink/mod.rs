//! `ChunkSink` — the narrow interface to the external embedding + vector
//! store collaborator (spec.md §6). This crate ships no HTTP implementation;
//! the real adapter (async `reqwest` client against `sink.endpointEmbed` /
//! `sink.endpointUpsert`) is out of scope per spec.md §1.

use async_trait::async_trait;
use chunk_storage::Chunk;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a sink failure should be retried by the `ChunkRouter` (HTTP 5xx,
/// network error) or treated as terminal (HTTP 4xx) — spec.md §6, §4.9.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transient sink error: {0}")]
    Transient(String),
    #[error("permanent sink error: {0}")]
    Permanent(String),
}

impl SinkError {
    pub fn message(&self) -> &str {
        match self {
            SinkError::Transient(m) | SinkError::Permanent(m) => m,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedStatus {
    Completed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub status: EmbedStatus,
    pub ids: Vec<String>,
}

/// `{id, vector, metadata}` per spec.md §6's `upsert` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub ack: bool,
}

/// Downstream embedding + vector-store collaborator. Both calls are
/// bearer-token-authenticated JSON RPCs against `Config::sink` in the real
/// adapter; this trait only specifies the shapes (spec.md §6).
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn embed(&self, batch: &[Chunk]) -> Result<EmbedResponse, SinkError>;
    async fn upsert(&self, vectors: Vec<VectorRecord>) -> Result<UpsertResponse, SinkError>;
}

/// A sink that accepts everything and does nothing — useful as the default
/// collaborator when no real embedder is wired up (local dev, dry runs).
pub struct NullSink;

#[async_trait]
impl ChunkSink for NullSink {
    async fn embed(&self, batch: &[Chunk]) -> Result<EmbedResponse, SinkError> {
        Ok(EmbedResponse {
            status: EmbedStatus::Completed,
            ids: batch.iter().map(|c| c.chunk_id.clone()).collect(),
        })
    }

    async fn upsert(&self, _vectors: Vec<VectorRecord>) -> Result<UpsertResponse, SinkError> {
        Ok(UpsertResponse { ack: true })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every batch it receives and can be told to fail the first
    /// `N` `embed` calls with a transient error before succeeding — used by
    /// the router's retry/backoff tests.
    pub struct RecordingSink {
        fail_first_n: Mutex<u32>,
        permanent: bool,
        pub received: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self { fail_first_n: Mutex::new(0), permanent: false, received: Mutex::new(Vec::new()) }
        }

        pub fn failing_n_times(n: u32) -> Self {
            Self { fail_first_n: Mutex::new(n), permanent: false, received: Mutex::new(Vec::new()) }
        }

        pub fn always_permanent_failure() -> Self {
            Self { fail_first_n: Mutex::new(0), permanent: true, received: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn embed(&self, batch: &[Chunk]) -> Result<EmbedResponse, SinkError> {
            if self.permanent {
                return Err(SinkError::Permanent("rejected (4xx)".to_string()));
            }
            let mut remaining = self.fail_first_n.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SinkError::Transient("service unavailable (5xx)".to_string()));
            }
            drop(remaining);
            self.received.lock().unwrap().push(batch.iter().map(|c| c.chunk_id.clone()).collect());
            Ok(EmbedResponse {
                status: EmbedStatus::Completed,
                ids: batch.iter().map(|c| c.chunk_id.clone()).collect(),
            })
        }

        async fn upsert(&self, _vectors: Vec<VectorRecord>) -> Result<UpsertResponse, SinkError> {
            Ok(UpsertResponse { ack: true })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id_seed: &str) -> Chunk {
        Chunk::new(
            id_seed.to_string(),
            "python",
            1,
            1,
            "x = 1",
            chunk_storage::ChunkKind::Variable,
            "python_parser",
            None,
        )
    }

    #[tokio::test]
    async fn null_sink_echoes_chunk_ids() {
        let sink = NullSink;
        let batch = vec![chunk("a.py")];
        let response = sink.embed(&batch).await.unwrap();
        assert_eq!(response.ids, vec![batch[0].chunk_id.clone()]);
        assert_eq!(response.status, EmbedStatus::Completed);
    }
}
