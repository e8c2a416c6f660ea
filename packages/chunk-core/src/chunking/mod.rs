//! Per-language AST chunking and the line-based fallback (spec.md §4.5, §4.6).

pub mod ast_chunker;
pub mod line_chunker;

pub use ast_chunker::{AstChunker, ChunkOutcome};
pub use line_chunker::LineChunker;
