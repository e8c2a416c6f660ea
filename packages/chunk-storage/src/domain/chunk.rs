//! Chunk data model
//!
//! A `Chunk` is the atomic unit shipped to the embedding sink: a bounded,
//! byte-exact span of a source file, bucketed by an AST-derived (or
//! line-based fallback) category.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ChunkKind;

/// Hard cap on serialized chunk content, in bytes (spec: 9 KiB).
pub const MAX_CHUNK_BYTES: usize = 9216;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub file_path: String,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub kind: ChunkKind,
    pub parser: String,
    pub name: Option<String>,
}

impl Chunk {
    /// `chunkId = sha256(filePath ":" startLine ":" endLine)`, hex lowercase.
    pub fn make_id(file_path: &str, start_line: u32, end_line: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b":");
        hasher.update(start_line.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(end_line.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_path: impl Into<String>,
        language: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
        kind: ChunkKind,
        parser: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        let file_path = file_path.into();
        let chunk_id = Self::make_id(&file_path, start_line, end_line);
        Self {
            chunk_id,
            file_path,
            language: language.into(),
            start_line,
            end_line,
            content: content.into(),
            kind,
            parser: parser.into(),
            name,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    pub fn within_size_cap(&self) -> bool {
        self.byte_len() <= MAX_CHUNK_BYTES
    }

    /// Whether `other` is mergeable with `self`: same kind, starts within 2
    /// lines of self's end (spec.md §4.5 adjacent-merge rule).
    pub fn mergeable_with(&self, other: &Chunk) -> bool {
        self.kind == other.kind && other.start_line <= self.end_line.saturating_add(2)
    }
}

/// `{filePath, fileHash, chunks[], producedAt}` — the cache's value type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkSet {
    pub file_path: String,
    pub file_hash: String,
    pub chunks: Vec<Chunk>,
    pub produced_at: String, // ISO-8601; caller supplies (see note on Date.now in workflow scripts)
}

impl ChunkSet {
    pub fn new(
        file_path: impl Into<String>,
        file_hash: impl Into<String>,
        chunks: Vec<Chunk>,
        produced_at: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_hash: file_hash.into(),
            chunks,
            produced_at: produced_at.into(),
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.byte_len()).sum()
    }
}
