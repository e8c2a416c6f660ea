//! Chunk category/type enum
//!
//! Mirrors the bucket a chunk was extracted into: either a named AST
//! declaration category, a structural category (import/comment/etc.), or a
//! fallback produced by the line-based chunker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Module,
    Class,
    Interface,
    Function,
    Method,
    Field,
    Variable,
    Constant,
    Type,
    Macro,
    Include,
    Using,
    Namespace,
    Import,
    Export,
    Comment,
    Preprocessor,
    Other,
    LineBased,
    Fallback,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Module => "module",
            ChunkKind::Class => "class",
            ChunkKind::Interface => "interface",
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Field => "field",
            ChunkKind::Variable => "variable",
            ChunkKind::Constant => "constant",
            ChunkKind::Type => "type",
            ChunkKind::Macro => "macro",
            ChunkKind::Include => "include",
            ChunkKind::Using => "using",
            ChunkKind::Namespace => "namespace",
            ChunkKind::Import => "import",
            ChunkKind::Export => "export",
            ChunkKind::Comment => "comment",
            ChunkKind::Preprocessor => "preprocessor",
            ChunkKind::Other => "other",
            ChunkKind::LineBased => "line_based",
            ChunkKind::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_serde() {
        let kind = ChunkKind::Function;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"function\"");
        let back: ChunkKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChunkKind::Function);
    }

    #[test]
    fn as_str_matches_spec_vocabulary() {
        assert_eq!(ChunkKind::LineBased.as_str(), "line_based");
        assert_eq!(ChunkKind::Fallback.as_str(), "fallback");
    }
}
