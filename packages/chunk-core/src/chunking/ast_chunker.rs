//! AstChunker — walks a parsed tree, buckets nodes into chunk categories,
//! merges adjacent same-kind regions, and enforces the size cap (spec.md
//! §4.5).

use chunk_storage::{Chunk, ChunkKind, MAX_CHUNK_BYTES};
use tracing::warn;
use tree_sitter::{Node, Parser, Tree};

use crate::chunking::line_chunker::LineChunker;
use crate::registry::{name_capture, LanguageId};

const MAX_FILE_BYTES: usize = 1024 * 1024;
const FIRST_N_LINES_RETRY: usize = 100;

pub struct AstChunker {
    lang: LanguageId,
}

/// Output of `AstChunker::chunk`. `split_parents` holds the parent id of
/// every oversize chunk that got split into `_part_<n>` pieces, so the
/// caller can register the parent with `ProgressTracker` for aggregation
/// (spec.md §4.8) — the parent itself is never emitted as a chunk.
pub struct ChunkOutcome {
    pub chunks: Vec<Chunk>,
    pub split_parents: Vec<String>,
}

/// One raw category match, pre-merge. Byte offsets index the UTF-8 buffer
/// that was actually parsed (post fallback-ladder transforms, if any).
struct Candidate {
    start_line: u32,
    end_line: u32,
    kind: ChunkKind,
    name: Option<String>,
    content: String,
}

impl AstChunker {
    pub fn new(lang: LanguageId) -> Self {
        Self { lang }
    }

    /// Parses `bytes` and emits merged, size-bounded chunks. Never returns
    /// an error: exhausts the four-stage fallback ladder and, failing that,
    /// falls through to the line chunker over the original content (spec.md
    /// §4.5 "failure-tolerant parsing").
    pub fn chunk(&self, bytes: &[u8], file_path: &str) -> ChunkOutcome {
        let language_tag = self.lang.name();

        // Stage 0: NUL-strip, and if oversize, parse only the first MiB.
        let nul_stripped: Vec<u8> = bytes.iter().copied().filter(|&b| b != 0).collect();
        let (truncated, was_truncated) = if nul_stripped.len() > MAX_FILE_BYTES {
            (nul_stripped[..MAX_FILE_BYTES].to_vec(), true)
        } else {
            (nul_stripped, false)
        };
        if was_truncated {
            warn!(file = file_path, "file exceeds 1 MiB; parsing only the first MiB");
        }

        if let Some(tree) = self.try_parse(&truncated) {
            return self.finish(&tree, &truncated, file_path, language_tag);
        }

        // Stage 1: strip control chars, normalize CRLF -> LF, retry.
        let normalized = normalize(&truncated);
        warn!(file = file_path, "grammar rejected input; retrying with control-char stripping and CRLF normalization");
        if let Some(tree) = self.try_parse(&normalized) {
            return self.finish(&tree, &normalized, file_path, language_tag);
        }

        // Stage 2: retry with only the first 100 lines.
        let first_lines = first_n_lines(&normalized, FIRST_N_LINES_RETRY);
        warn!(file = file_path, "retrying with only the first {FIRST_N_LINES_RETRY} lines");
        if let Some(tree) = self.try_parse(&first_lines) {
            return self.finish(&tree, &first_lines, file_path, language_tag);
        }

        // Stage 3: fall through to the line chunker over the ORIGINAL,
        // untruncated content.
        warn!(file = file_path, "all parse attempts failed; falling back to the line chunker");
        let original_text = String::from_utf8_lossy(bytes).into_owned();
        let chunks = LineChunker::new(50).chunk(&original_text, file_path, language_tag, ChunkKind::Fallback);
        ChunkOutcome { chunks, split_parents: Vec::new() }
    }

    fn try_parse(&self, bytes: &[u8]) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&self.lang.tree_sitter_language()).ok()?;
        let tree = parser.parse(bytes, None)?;
        if tree.root_node().has_error() {
            None
        } else {
            Some(tree)
        }
    }

    fn finish(&self, tree: &Tree, bytes: &[u8], file_path: &str, language_tag: &str) -> ChunkOutcome {
        let mut candidates = Vec::new();
        let offsets = line_offsets(bytes);
        collect_candidates(self.lang, tree.root_node(), bytes, &offsets, &mut candidates, true);
        candidates.sort_by_key(|c| c.start_line);

        let merged = merge_adjacent(candidates);
        let parser_name = self.lang.parser_name();

        let mut chunks = Vec::with_capacity(merged.len());
        let mut split_parents = Vec::new();
        for candidate in merged {
            let chunk = Chunk::new(
                file_path.to_string(),
                language_tag.to_string(),
                candidate.start_line,
                candidate.end_line,
                candidate.content,
                candidate.kind,
                parser_name,
                candidate.name,
            );
            if chunk.within_size_cap() {
                chunks.push(chunk);
            } else {
                split_parents.push(chunk.chunk_id.clone());
                chunks.extend(split_oversize(&chunk, language_tag));
            }
        }
        ChunkOutcome { chunks, split_parents }
    }
}

/// Byte offset of the start of each source line (index 0 -> line 1).
fn line_offsets(source: &[u8]) -> Vec<usize> {
    let mut offsets = vec![0usize];
    for (i, &b) in source.iter().enumerate() {
        if b == b'\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}

/// Full source text spanning `[start_line, end_line]` (1-based, inclusive),
/// trailing newline excluded. Used instead of a node's own byte span so an
/// indented or nested declaration's content still matches
/// `join('\n', file.lines[startLine..endLine])` (spec.md §3), not just the
/// node's sub-line slice.
fn slice_full_lines(source: &[u8], offsets: &[usize], start_line: u32, end_line: u32) -> String {
    let start_byte = offsets.get((start_line - 1) as usize).copied().unwrap_or(source.len());
    let end_byte = offsets.get(end_line as usize).map(|&b| b.saturating_sub(1)).unwrap_or(source.len());
    String::from_utf8_lossy(&source[start_byte..end_byte.max(start_byte).min(source.len())]).into_owned()
}

fn normalize(bytes: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(bytes);
    let normalized = text.replace("\r\n", "\n");
    normalized
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .into_bytes()
}

fn first_n_lines(bytes: &[u8], n: usize) -> Vec<u8> {
    let text = String::from_utf8_lossy(bytes);
    text.lines().take(n).collect::<Vec<_>>().join("\n").into_bytes()
}

fn collect_candidates<'a>(
    lang: LanguageId,
    node: Node<'a>,
    source: &[u8],
    offsets: &[usize],
    out: &mut Vec<Candidate>,
    children_are_top_level: bool,
) {
    for child in node.children(&mut node.walk()) {
        let category = lang.category_for_node(child.kind());
        match category {
            Some(kind) => {
                out.push(make_candidate(lang, child, source, offsets, kind));
                collect_candidates(lang, child, source, offsets, out, false);
            }
            None if children_are_top_level && is_substantial(&child) => {
                out.push(make_candidate(lang, child, source, offsets, ChunkKind::Other));
                collect_candidates(lang, child, source, offsets, out, false);
            }
            None => collect_candidates(lang, child, source, offsets, out, false),
        }
    }
}

fn is_substantial(node: &Node) -> bool {
    node.is_named() && node.end_byte() > node.start_byte()
}

fn make_candidate(lang: LanguageId, node: Node, source: &[u8], offsets: &[usize], kind: ChunkKind) -> Candidate {
    let start_line = node.start_position().row as u32 + 1;
    let end_line = node.end_position().row as u32 + 1;
    let content = slice_full_lines(source, offsets, start_line, end_line);
    Candidate { start_line, end_line, kind, name: find_name(lang, node, source), content }
}

/// Left-most DFS over a node's descendants for the first identifier/name
/// token (spec.md §4.5 "name capture").
fn find_name(lang: LanguageId, node: Node, source: &[u8]) -> Option<String> {
    let capture = name_capture(lang);
    find_name_rec(node, capture.identifier_kinds, source)
}

fn find_name_rec(node: Node, kinds: &[&str], source: &[u8]) -> Option<String> {
    for child in node.children(&mut node.walk()) {
        if kinds.contains(&child.kind()) {
            return Some(String::from_utf8_lossy(&source[child.start_byte()..child.end_byte()]).into_owned());
        }
    }
    for child in node.children(&mut node.walk()) {
        if let Some(found) = find_name_rec(child, kinds, source) {
            return Some(found);
        }
    }
    None
}

fn merge_adjacent(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Some(last) = merged.last_mut() {
            if last.kind == candidate.kind && candidate.start_line <= last.end_line + 2 {
                let gap = candidate.start_line.saturating_sub(last.end_line);
                last.content.push_str(&"\n".repeat(gap as usize));
                last.content.push_str(&candidate.content);
                last.end_line = candidate.end_line;
                if last.name.is_none() {
                    last.name = candidate.name;
                }
                continue;
            }
        }
        merged.push(candidate);
    }
    merged
}

/// Splits an oversize merged chunk into size-bounded parts, each id'd as
/// `<parent_id>_part_<n>` rather than the usual content hash so
/// `ProgressTracker` can recognize and aggregate them back to the parent
/// (spec.md §4.5, §4.8).
fn split_oversize(chunk: &Chunk, language_tag: &str) -> Vec<Chunk> {
    let parts = LineChunker::new(50).chunk(&chunk.content, &chunk.file_path, language_tag, chunk.kind);
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let start_line = chunk.start_line + part.start_line - 1;
            let end_line = chunk.start_line + part.end_line - 1;
            let mut split = Chunk::new(
                chunk.file_path.clone(),
                language_tag.to_string(),
                start_line,
                end_line,
                part.content,
                chunk.kind,
                chunk.parser.clone(),
                chunk.name.clone(),
            );
            split.chunk_id = format!("{}_part_{i}", chunk.chunk_id);
            split
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_a_simple_python_file() {
        let src = "def foo():\n    return 1\n\n\ndef bar():\n    return 2\n";
        let chunker = AstChunker::new(LanguageId::Python);
        let chunks = chunker.chunk(src.as_bytes(), "m.py").chunks;

        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Function && c.name.as_deref() == Some("foo")));
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Function && c.name.as_deref() == Some("bar")));
    }

    #[test]
    fn merges_adjacent_go_const_declarations() {
        let src = "package main\n\nconst A = 1\nconst B = 2\n";
        let chunker = AstChunker::new(LanguageId::Go);
        let chunks = chunker.chunk(src.as_bytes(), "m.go").chunks;

        let consts: Vec<_> = chunks.iter().filter(|c| c.kind == ChunkKind::Constant).collect();
        assert_eq!(consts.len(), 1);
        assert_eq!(consts[0].start_line, 3);
        assert_eq!(consts[0].end_line, 4);
    }

    #[test]
    fn unparseable_input_falls_through_to_fallback_chunks() {
        let src = "this is not ( valid rust {{{ at all +++ ???";
        let chunker = AstChunker::new(LanguageId::Rust);
        let chunks = chunker.chunk(src.as_bytes(), "m.rs").chunks;
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Fallback || c.within_size_cap()));
    }

    #[test]
    fn oversize_chunk_is_split_and_stays_within_cap() {
        let body = "x".repeat(MAX_CHUNK_BYTES * 2);
        let src = format!("fn huge() {{\n{body}\n}}\n");
        let chunker = AstChunker::new(LanguageId::Rust);
        let outcome = chunker.chunk(src.as_bytes(), "m.rs");
        assert!(outcome.chunks.iter().all(|c| c.within_size_cap()));
        assert!(outcome.chunks.len() > 1);
    }

    #[test]
    fn oversize_chunk_split_parts_link_back_to_a_registered_parent() {
        let body = "x".repeat(MAX_CHUNK_BYTES * 2);
        let src = format!("fn huge() {{\n{body}\n}}\n");
        let chunker = AstChunker::new(LanguageId::Rust);
        let outcome = chunker.chunk(src.as_bytes(), "m.rs");

        assert_eq!(outcome.split_parents.len(), 1);
        let parent_id = &outcome.split_parents[0];
        for (i, chunk) in outcome.chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, format!("{parent_id}_part_{i}"));
        }
    }

    #[test]
    fn indented_method_content_round_trips_full_source_lines() {
        let src = "class Foo:\n    def bar(self):\n        x = 1\n        return x\n";
        let chunker = AstChunker::new(LanguageId::Python);
        let chunks = chunker.chunk(src.as_bytes(), "m.py").chunks;

        let method = chunks
            .iter()
            .find(|c| c.kind == ChunkKind::Function && c.name.as_deref() == Some("bar"))
            .expect("method chunk");

        let lines: Vec<&str> = src.lines().collect();
        let expected = lines[(method.start_line - 1) as usize..method.end_line as usize].join("\n");
        assert_eq!(method.content, expected);
        assert!(method.content.starts_with("    def bar"));
    }
}
