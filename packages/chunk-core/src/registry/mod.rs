//! LanguageRegistry — maps a file extension to a parser plugin and owns the
//! loaded parser instances (spec.md §4.4).

mod node_tables;

pub use node_tables::{lookup_category, name_capture, NameCapture};

use chunk_storage::ChunkKind;
use tree_sitter::Language as TsLanguage;

/// Built-in language set (spec.md §4.4). TypeScript and TSX are distinct
/// plugins sharing one grammar crate (open question resolved in
/// SPEC_FULL.md §5: ship TSX as its own plugin rather than downgrading to
/// JavaScript).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Python,
    Java,
    JavaScript,
    TypeScript,
    Tsx,
    C,
    Cpp,
    CSharp,
    Go,
    Rust,
    Php,
}

impl LanguageId {
    pub fn name(&self) -> &'static str {
        match self {
            LanguageId::Python => "python",
            LanguageId::Java => "java",
            LanguageId::JavaScript => "javascript",
            LanguageId::TypeScript => "typescript",
            LanguageId::Tsx => "typescript", // spec.md §3: "lowercase language tag" shared with ts
            LanguageId::C => "c",
            LanguageId::Cpp => "cpp",
            LanguageId::CSharp => "csharp",
            LanguageId::Go => "go",
            LanguageId::Rust => "rust",
            LanguageId::Php => "php",
        }
    }

    pub fn parser_name(&self) -> &'static str {
        match self {
            LanguageId::Python => "python_parser",
            LanguageId::Java => "java_parser",
            LanguageId::JavaScript => "javascript_parser",
            LanguageId::TypeScript => "typescript_parser",
            LanguageId::Tsx => "tsx_parser",
            LanguageId::C => "c_parser",
            LanguageId::Cpp => "cpp_parser",
            LanguageId::CSharp => "csharp_parser",
            LanguageId::Go => "go_parser",
            LanguageId::Rust => "rust_parser",
            LanguageId::Php => "php_parser",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Some(LanguageId::Python),
            "java" => Some(LanguageId::Java),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageId::JavaScript),
            "ts" => Some(LanguageId::TypeScript),
            "tsx" => Some(LanguageId::Tsx),
            "c" | "h" => Some(LanguageId::C),
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => Some(LanguageId::Cpp),
            "cs" => Some(LanguageId::CSharp),
            "go" => Some(LanguageId::Go),
            "rs" => Some(LanguageId::Rust),
            "php" => Some(LanguageId::Php),
            _ => None,
        }
    }

    pub fn tree_sitter_language(&self) -> TsLanguage {
        match self {
            LanguageId::Python => tree_sitter_python::language(),
            LanguageId::Java => tree_sitter_java::language(),
            LanguageId::JavaScript => tree_sitter_javascript::language(),
            LanguageId::TypeScript => tree_sitter_typescript::language_typescript(),
            LanguageId::Tsx => tree_sitter_typescript::language_tsx(),
            LanguageId::C => tree_sitter_c::language(),
            LanguageId::Cpp => tree_sitter_cpp::language(),
            LanguageId::CSharp => tree_sitter_c_sharp::language(),
            LanguageId::Go => tree_sitter_go::language(),
            LanguageId::Rust => tree_sitter_rust::language(),
            LanguageId::Php => tree_sitter_php::language_php(),
        }
    }

    /// Map a grammar node-type string to a chunk category, per this
    /// language's bucket table (spec.md §4.5).
    pub fn category_for_node(&self, ts_kind: &str) -> Option<ChunkKind> {
        lookup_category(*self, ts_kind)
    }
}

/// Routes an extension either to an AST-capable `LanguageId` or explicitly
/// to the line chunker (spec.md §4.4: "Unmapped or explicitly-routed-to-line
/// extensions ... select the LineChunker").
pub enum Route {
    Ast(LanguageId),
    Line,
}

pub struct LanguageRegistry;

impl LanguageRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, extension: &str) -> Route {
        match LanguageId::from_extension(extension) {
            Some(lang) => Route::Ast(lang),
            None => Route::Line,
        }
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
