//! End-to-end pipeline tests against `Session`/`SessionManager`, covering
//! the concrete scenarios in spec.md §8.

use std::sync::Arc;

use chunk_core::{CancelToken, Config, NullSink, SearchFilters, Session, SessionManager};
use tempfile::tempdir;

fn read_to_string(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn single_python_file_produces_one_exact_function_chunk() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();

    let manager = SessionManager::new();
    manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();

    let hits = session.search("f", 10, &SearchFilters::default());
    let function_hit = hits.iter().find(|h| h.chunk.name.as_deref() == Some("f")).expect("function chunk");

    assert_eq!(function_hit.chunk.kind, chunk_storage::ChunkKind::Function);
    assert_eq!(function_hit.chunk.start_line, 1);
    assert_eq!(function_hit.chunk.end_line, 2);
    assert_eq!(function_hit.chunk.content, "def f():\n    return 1");
}

#[tokio::test]
async fn unchanged_workspace_rerun_is_fully_cached_and_root_hash_is_stable() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "y = 2\n").unwrap();
    let workspace = dir.path().to_string_lossy().to_string();

    let manager = SessionManager::new();
    let first_ok = manager.process_workspace("u", "d", &workspace, "tok", &[], Arc::new(NullSink)).await.unwrap();
    assert!(first_ok);

    let session = manager.get("u", "d", &workspace).unwrap();
    let second_ok = session.process_workspace(CancelToken::new()).await.unwrap();

    assert!(second_ok);
    assert_eq!(session.get_file_processing_progress(), 100.0);
}

#[tokio::test]
async fn modifying_one_file_only_reprocesses_that_file() {
    let dir = tempdir().unwrap();
    let a_path = dir.path().join("a.py");
    std::fs::write(&a_path, "x = 1\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "y = 2\n").unwrap();
    let workspace = dir.path().to_string_lossy().to_string();

    let manager = SessionManager::new();
    manager.process_workspace("u", "d", &workspace, "tok", &[], Arc::new(NullSink)).await.unwrap();
    let session = manager.get("u", "d", &workspace).unwrap();

    std::fs::write(&a_path, "x = 2\ny = 3\n").unwrap();
    let ok = session.process_workspace(CancelToken::new()).await.unwrap();

    assert!(ok);
    assert_eq!(session.get_file_processing_progress(), 100.0);
    assert_eq!(read_to_string(&a_path), "x = 2\ny = 3\n");
}

#[tokio::test]
async fn unparseable_file_falls_back_and_pipeline_still_succeeds() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("broken.rs"), b"fn ((( not valid +++ ???").unwrap();

    let manager = SessionManager::new();
    let ok = manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();

    assert!(ok);
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();
    assert_eq!(session.get_file_processing_progress(), 100.0);
}

#[tokio::test]
async fn multibyte_identifiers_round_trip_without_mojibake() {
    let dir = tempdir().unwrap();
    let source = "def \u{8a08}\u{7b97}():\n    return 1\n"; // "def 計算():\n    return 1\n"
    std::fs::write(dir.path().join("m.py"), source.as_bytes()).unwrap();

    let manager = SessionManager::new();
    manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();

    let hits = session.search("return", 10, &SearchFilters::default());
    let function_hit = hits.iter().find(|h| h.chunk.kind == chunk_storage::ChunkKind::Function).expect("function chunk");
    assert!(function_hit.chunk.content.contains('\u{8a08}'));
    assert!(function_hit.chunk.content.contains('\u{7b97}'));
}

#[tokio::test]
async fn empty_workspace_yields_zero_chunks() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("empty.py"), b"").unwrap();

    let manager = SessionManager::new();
    manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();

    let hits = session.search("", 1000, &SearchFilters::default());
    assert!(hits.is_empty());
}

#[tokio::test]
async fn oversize_comment_block_splits_into_size_bounded_slices() {
    let dir = tempdir().unwrap();
    let comment_body: String = (0..1000).map(|i| format!("// filler line {i}\n")).collect();
    std::fs::write(dir.path().join("c.rs"), comment_body.as_bytes()).unwrap();

    let manager = SessionManager::new();
    manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();

    let hits = session.search("filler", 1000, &SearchFilters::default());
    assert!(hits.len() > 1, "a merged comment block well over the size cap must split into more than one chunk");
    for hit in &hits {
        assert!(hit.chunk.within_size_cap());
    }
}

#[tokio::test]
async fn search_filters_by_language() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "def handler():\n    return 1\n").unwrap();
    std::fs::write(dir.path().join("b.go"), "package main\n\nfunc handler() int {\n\treturn 1\n}\n").unwrap();

    let manager = SessionManager::new();
    manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();

    let filters = SearchFilters { language: Some("go".to_string()), file_path_prefix: None };
    let hits = session.search("handler", 10, &filters);

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.chunk.language == "go"));
}

#[tokio::test]
async fn session_manager_reuses_the_same_session_for_repeated_calls() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    let workspace = dir.path().to_string_lossy().to_string();

    let manager = SessionManager::new();
    manager.process_workspace("u", "d", &workspace, "tok", &[], Arc::new(NullSink)).await.unwrap();
    let first = manager.get("u", "d", &workspace).unwrap();

    manager.process_workspace("u", "d", &workspace, "tok", &[], Arc::new(NullSink)).await.unwrap();
    let second = manager.get("u", "d", &workspace).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn invalid_config_is_rejected_at_session_construction() {
    let dir = tempdir().unwrap();
    let mut config = Config::default_for_workspace(dir.path().to_string_lossy().to_string());
    config.batch_size = 0;

    let result = Session::new(config, Arc::new(NullSink));
    assert!(result.is_err());
}

#[tokio::test]
async fn ignored_directories_and_globs_are_never_scanned() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
    std::fs::write(dir.path().join("node_modules/pkg/index.js"), "function skip() {}\n").unwrap();
    std::fs::write(dir.path().join("keep.js"), "function keep() {}\n").unwrap();

    let manager = SessionManager::new();
    manager
        .process_workspace("u", "d", &dir.path().to_string_lossy(), "tok", &[], Arc::new(NullSink))
        .await
        .unwrap();
    let session = manager.get("u", "d", &dir.path().to_string_lossy()).unwrap();

    let hits = session.search("function", 100, &SearchFilters::default());
    assert!(hits.iter().any(|h| h.chunk.name.as_deref() == Some("keep")));
    assert!(!hits.iter().any(|h| h.chunk.name.as_deref() == Some("skip")));
}

#[tokio::test]
async fn shutdown_then_reprocess_creates_a_fresh_session() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    let workspace = dir.path().to_string_lossy().to_string();

    let manager = SessionManager::new();
    manager.process_workspace("u", "d", &workspace, "tok", &[], Arc::new(NullSink)).await.unwrap();
    manager.shutdown("u", "d", &workspace).unwrap();
    assert!(manager.get("u", "d", &workspace).is_none());

    let ok = manager.process_workspace("u", "d", &workspace, "tok", &[], Arc::new(NullSink)).await.unwrap();
    assert!(ok);
    assert!(manager.get("u", "d", &workspace).is_some());
}
