//! Per-language node-kind → chunk-category bucket tables (spec.md §4.5).
//!
//! Each language plugin in the teacher repo hand-maps grammar node kinds to
//! IR constructs; we keep that shape but collapse the target down to the
//! flat `ChunkKind` vocabulary this system actually emits.

use std::collections::HashMap;

use chunk_storage::ChunkKind;
use once_cell::sync::Lazy;

use crate::registry::LanguageId;

/// Grammar node kinds that carry a chunk's human-readable name, searched via
/// a left-most DFS over a matched node's children (spec.md §4.5 "name
/// capture").
pub struct NameCapture {
    pub identifier_kinds: &'static [&'static str],
}

const DEFAULT_NAME_CAPTURE: NameCapture = NameCapture {
    identifier_kinds: &["identifier", "type_identifier", "field_identifier", "property_identifier"],
};

const PHP_NAME_CAPTURE: NameCapture = NameCapture {
    identifier_kinds: &["name"],
};

pub fn name_capture(lang: LanguageId) -> &'static NameCapture {
    match lang {
        LanguageId::Php => &PHP_NAME_CAPTURE,
        _ => &DEFAULT_NAME_CAPTURE,
    }
}

type Table = &'static [(&'static str, ChunkKind)];

const PYTHON: Table = &[
    ("module", ChunkKind::Module),
    ("class_definition", ChunkKind::Class),
    ("function_definition", ChunkKind::Function),
    ("decorated_definition", ChunkKind::Function),
    ("import_statement", ChunkKind::Import),
    ("import_from_statement", ChunkKind::Import),
    ("comment", ChunkKind::Comment),
    ("assignment", ChunkKind::Variable),
];

const JAVA: Table = &[
    ("package_declaration", ChunkKind::Module),
    ("class_declaration", ChunkKind::Class),
    ("interface_declaration", ChunkKind::Interface),
    ("enum_declaration", ChunkKind::Type),
    ("method_declaration", ChunkKind::Method),
    ("constructor_declaration", ChunkKind::Method),
    ("field_declaration", ChunkKind::Field),
    ("import_declaration", ChunkKind::Import),
    ("line_comment", ChunkKind::Comment),
    ("block_comment", ChunkKind::Comment),
];

const JAVASCRIPT: Table = &[
    ("class_declaration", ChunkKind::Class),
    ("function_declaration", ChunkKind::Function),
    ("generator_function_declaration", ChunkKind::Function),
    ("method_definition", ChunkKind::Method),
    ("lexical_declaration", ChunkKind::Variable),
    ("variable_declaration", ChunkKind::Variable),
    ("import_statement", ChunkKind::Import),
    ("export_statement", ChunkKind::Export),
    ("comment", ChunkKind::Comment),
];

const TYPESCRIPT: Table = &[
    ("class_declaration", ChunkKind::Class),
    ("abstract_class_declaration", ChunkKind::Class),
    ("interface_declaration", ChunkKind::Interface),
    ("function_declaration", ChunkKind::Function),
    ("method_definition", ChunkKind::Method),
    ("method_signature", ChunkKind::Method),
    ("type_alias_declaration", ChunkKind::Type),
    ("enum_declaration", ChunkKind::Type),
    ("lexical_declaration", ChunkKind::Variable),
    ("variable_declaration", ChunkKind::Variable),
    ("import_statement", ChunkKind::Import),
    ("export_statement", ChunkKind::Export),
    ("comment", ChunkKind::Comment),
];

const C: Table = &[
    ("function_definition", ChunkKind::Function),
    ("struct_specifier", ChunkKind::Type),
    ("union_specifier", ChunkKind::Type),
    ("enum_specifier", ChunkKind::Type),
    ("type_definition", ChunkKind::Type),
    ("declaration", ChunkKind::Variable),
    ("preproc_include", ChunkKind::Include),
    ("preproc_def", ChunkKind::Preprocessor),
    ("preproc_function_def", ChunkKind::Preprocessor),
    ("preproc_ifdef", ChunkKind::Preprocessor),
    ("comment", ChunkKind::Comment),
];

const CPP: Table = &[
    ("function_definition", ChunkKind::Function),
    ("class_specifier", ChunkKind::Class),
    ("struct_specifier", ChunkKind::Type),
    ("union_specifier", ChunkKind::Type),
    ("enum_specifier", ChunkKind::Type),
    ("namespace_definition", ChunkKind::Namespace),
    ("type_definition", ChunkKind::Type),
    ("alias_declaration", ChunkKind::Type),
    ("declaration", ChunkKind::Variable),
    ("preproc_include", ChunkKind::Include),
    ("preproc_def", ChunkKind::Preprocessor),
    ("preproc_function_def", ChunkKind::Preprocessor),
    ("preproc_ifdef", ChunkKind::Preprocessor),
    ("comment", ChunkKind::Comment),
];

const CSHARP: Table = &[
    ("namespace_declaration", ChunkKind::Namespace),
    ("class_declaration", ChunkKind::Class),
    ("interface_declaration", ChunkKind::Interface),
    ("struct_declaration", ChunkKind::Type),
    ("enum_declaration", ChunkKind::Type),
    ("method_declaration", ChunkKind::Method),
    ("constructor_declaration", ChunkKind::Method),
    ("field_declaration", ChunkKind::Field),
    ("property_declaration", ChunkKind::Field),
    ("using_directive", ChunkKind::Using),
    ("comment", ChunkKind::Comment),
];

const GO: Table = &[
    ("package_clause", ChunkKind::Module),
    ("function_declaration", ChunkKind::Function),
    ("method_declaration", ChunkKind::Method),
    ("type_declaration", ChunkKind::Type),
    ("const_declaration", ChunkKind::Constant),
    ("var_declaration", ChunkKind::Variable),
    ("import_declaration", ChunkKind::Import),
    ("comment", ChunkKind::Comment),
];

const RUST: Table = &[
    ("mod_item", ChunkKind::Module),
    ("struct_item", ChunkKind::Type),
    ("enum_item", ChunkKind::Type),
    ("union_item", ChunkKind::Type),
    ("trait_item", ChunkKind::Interface),
    ("impl_item", ChunkKind::Class),
    ("function_item", ChunkKind::Function),
    ("const_item", ChunkKind::Constant),
    ("static_item", ChunkKind::Variable),
    ("let_declaration", ChunkKind::Variable),
    ("use_declaration", ChunkKind::Import),
    ("macro_definition", ChunkKind::Macro),
    ("line_comment", ChunkKind::Comment),
    ("block_comment", ChunkKind::Comment),
];

const PHP: Table = &[
    ("namespace_definition", ChunkKind::Namespace),
    ("class_declaration", ChunkKind::Class),
    ("interface_declaration", ChunkKind::Interface),
    ("trait_declaration", ChunkKind::Interface),
    ("function_definition", ChunkKind::Function),
    ("method_declaration", ChunkKind::Method),
    ("property_declaration", ChunkKind::Field),
    ("const_declaration", ChunkKind::Constant),
    ("namespace_use_declaration", ChunkKind::Import),
    ("comment", ChunkKind::Comment),
];

fn table_for(lang: LanguageId) -> Table {
    match lang {
        LanguageId::Python => PYTHON,
        LanguageId::Java => JAVA,
        LanguageId::JavaScript => JAVASCRIPT,
        LanguageId::TypeScript | LanguageId::Tsx => TYPESCRIPT,
        LanguageId::C => C,
        LanguageId::Cpp => CPP,
        LanguageId::CSharp => CSHARP,
        LanguageId::Go => GO,
        LanguageId::Rust => RUST,
        LanguageId::Php => PHP,
    }
}

struct Maps {
    python: HashMap<&'static str, ChunkKind>,
    java: HashMap<&'static str, ChunkKind>,
    javascript: HashMap<&'static str, ChunkKind>,
    typescript: HashMap<&'static str, ChunkKind>,
    c: HashMap<&'static str, ChunkKind>,
    cpp: HashMap<&'static str, ChunkKind>,
    csharp: HashMap<&'static str, ChunkKind>,
    go: HashMap<&'static str, ChunkKind>,
    rust: HashMap<&'static str, ChunkKind>,
    php: HashMap<&'static str, ChunkKind>,
}

fn build(table: Table) -> HashMap<&'static str, ChunkKind> {
    table.iter().copied().collect()
}

static MAPS: Lazy<Maps> = Lazy::new(|| Maps {
    python: build(PYTHON),
    java: build(JAVA),
    javascript: build(JAVASCRIPT),
    typescript: build(TYPESCRIPT),
    c: build(C),
    cpp: build(CPP),
    csharp: build(CSHARP),
    go: build(GO),
    rust: build(RUST),
    php: build(PHP),
});

pub fn lookup_category(lang: LanguageId, ts_kind: &str) -> Option<ChunkKind> {
    let map = match lang {
        LanguageId::Python => &MAPS.python,
        LanguageId::Java => &MAPS.java,
        LanguageId::JavaScript => &MAPS.javascript,
        LanguageId::TypeScript | LanguageId::Tsx => &MAPS.typescript,
        LanguageId::C => &MAPS.c,
        LanguageId::Cpp => &MAPS.cpp,
        LanguageId::CSharp => &MAPS.csharp,
        LanguageId::Go => &MAPS.go,
        LanguageId::Rust => &MAPS.rust,
        LanguageId::Php => &MAPS.php,
    };
    map.get(ts_kind).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_is_reachable_and_non_empty() {
        for lang in [
            LanguageId::Python,
            LanguageId::Java,
            LanguageId::JavaScript,
            LanguageId::TypeScript,
            LanguageId::Tsx,
            LanguageId::C,
            LanguageId::Cpp,
            LanguageId::CSharp,
            LanguageId::Go,
            LanguageId::Rust,
            LanguageId::Php,
        ] {
            assert!(!table_for(lang).is_empty());
        }
    }

    #[test]
    fn python_function_maps_to_function_kind() {
        assert_eq!(lookup_category(LanguageId::Python, "function_definition"), Some(ChunkKind::Function));
    }

    #[test]
    fn rust_impl_item_maps_to_class_bucket() {
        assert_eq!(lookup_category(LanguageId::Rust, "impl_item"), Some(ChunkKind::Class));
    }

    #[test]
    fn unknown_node_kind_returns_none() {
        assert_eq!(lookup_category(LanguageId::Go, "not_a_real_node"), None);
    }

    #[test]
    fn php_uses_its_own_name_capture() {
        assert_eq!(name_capture(LanguageId::Php).identifier_kinds, &["name"]);
        assert_eq!(name_capture(LanguageId::Go).identifier_kinds, DEFAULT_NAME_CAPTURE.identifier_kinds);
    }
}
