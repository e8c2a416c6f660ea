//! LineChunker — fallback chunker used for non-code files, unparseable
//! files, and to split oversize AST chunks (spec.md §4.6).

use chunk_storage::{Chunk, ChunkKind, MAX_CHUNK_BYTES};

pub struct LineChunker {
    lines_per_chunk: usize,
}

impl LineChunker {
    pub fn new(lines_per_chunk: usize) -> Self {
        Self { lines_per_chunk: lines_per_chunk.max(1) }
    }

    /// Walks lines, starting a new chunk whenever the running line count
    /// reaches `lines_per_chunk` or the next line would push byte length
    /// past the size cap. `kind` lets callers distinguish a genuine
    /// line-based file (`ChunkKind::LineBased`) from an AST escape hatch
    /// (`ChunkKind::Fallback`).
    pub fn chunk(&self, content: &str, file_path: &str, language: &str, kind: ChunkKind) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start_idx = 0usize;
        let mut current: Vec<&str> = Vec::new();
        let mut current_bytes = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            let line_bytes = line.len() + 1; // +1 for the newline we re-insert on join
            let would_exceed_bytes = current_bytes + line_bytes > MAX_CHUNK_BYTES && !current.is_empty();
            let would_exceed_lines = current.len() >= self.lines_per_chunk;

            if would_exceed_bytes || would_exceed_lines {
                chunks.push(self.emit(&current, start_idx, file_path, language, kind));
                start_idx = idx;
                current = Vec::new();
                current_bytes = 0;
            }

            current.push(line);
            current_bytes += line_bytes;
        }

        if !current.is_empty() {
            chunks.push(self.emit(&current, start_idx, file_path, language, kind));
        }

        chunks
    }

    fn emit(&self, lines: &[&str], start_idx: usize, file_path: &str, language: &str, kind: ChunkKind) -> Chunk {
        let start_line = (start_idx + 1) as u32;
        let end_line = start_line + lines.len() as u32 - 1;
        let content = lines.join("\n");
        Chunk::new(file_path.to_string(), language.to_string(), start_line, end_line, content, kind, "line_chunker", None)
    }
}
