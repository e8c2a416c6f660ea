//! ProgressTracker — keyed status map over files and chunks, with a
//! derivation rule and split-chunk (`_part_<n>`) aggregation (spec.md §4.8).

use std::collections::HashMap;
use std::sync::RwLock;

use chunk_storage::Status;

#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub file_path: String,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct FileProgress {
    pub path: String,
    pub status: Status,
    pub total_chunks: usize,
    pub completed_chunks: usize,
}

struct State {
    files: HashMap<String, Status>,
    chunks: HashMap<String, ChunkMeta>,
    /// path -> ordered chunk ids, in the order they were registered.
    chunks_by_file: HashMap<String, Vec<String>>,
}

pub struct ProgressTracker {
    state: RwLock<State>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                files: HashMap::new(),
                chunks: HashMap::new(),
                chunks_by_file: HashMap::new(),
            }),
        }
    }

    pub fn register_files(&self, paths: impl IntoIterator<Item = String>) {
        let mut state = self.state.write().unwrap();
        for path in paths {
            state.files.entry(path.clone()).or_insert(Status::Pending);
            state.chunks_by_file.entry(path).or_default();
        }
    }

    pub fn register_chunk(&self, chunk_id: &str, file_path: &str) {
        let mut state = self.state.write().unwrap();
        state.chunks.insert(
            chunk_id.to_string(),
            ChunkMeta { file_path: file_path.to_string(), status: Status::Pending },
        );
        state.chunks_by_file.entry(file_path.to_string()).or_default().push(chunk_id.to_string());
    }

    /// Explicit file status override (spec.md §4.8: "cache hits mark files
    /// `completed` without per-chunk transitions").
    pub fn update_file_status(&self, path: &str, status: Status) {
        let mut state = self.state.write().unwrap();
        state.files.insert(path.to_string(), status);
    }

    pub fn update_chunk_status(&self, chunk_id: &str, status: Status) {
        let mut state = self.state.write().unwrap();

        let file_path = match state.chunks.get_mut(chunk_id) {
            Some(meta) => {
                meta.status = status;
                meta.file_path.clone()
            }
            None => return,
        };

        if let Some(parent_id) = parent_chunk_id(chunk_id) {
            self.propagate_to_parent(&mut state, &parent_id);
        }

        let derived = derive_file_status(&state, &file_path);
        state.files.insert(file_path, derived);
    }

    fn propagate_to_parent(&self, state: &mut State, parent_id: &str) {
        if !state.chunks.contains_key(parent_id) {
            return;
        }
        let part_ids: Vec<String> =
            state.chunks.keys().filter(|id| parent_chunk_id(id).as_deref() == Some(parent_id)).cloned().collect();
        if part_ids.is_empty() {
            return;
        }
        let statuses: Vec<Status> = part_ids.iter().map(|id| state.chunks[id].status).collect();
        let all_completed = statuses.iter().all(|s| *s == Status::Completed);
        let all_terminal = statuses.iter().all(|s| s.is_terminal());
        let any_failed = statuses.iter().any(|s| *s == Status::Failed);

        let parent_status = if all_completed {
            Status::Completed
        } else if all_terminal && any_failed {
            Status::Failed
        } else {
            Status::Processing
        };
        if let Some(parent) = state.chunks.get_mut(parent_id) {
            parent.status = parent_status;
        }
    }

    pub fn get_overall_progress(&self) -> f64 {
        let state = self.state.read().unwrap();
        if state.files.is_empty() {
            return 100.0;
        }
        let completed = state.files.values().filter(|s| **s == Status::Completed).count();
        (completed as f64 / state.files.len() as f64) * 100.0
    }

    pub fn get_file_progress(&self) -> Vec<FileProgress> {
        let state = self.state.read().unwrap();
        let mut out: Vec<FileProgress> = state
            .files
            .iter()
            .map(|(path, status)| {
                let chunk_ids = state.chunks_by_file.get(path).cloned().unwrap_or_default();
                let total_chunks = chunk_ids.len();
                let completed_chunks =
                    chunk_ids.iter().filter(|id| state.chunks.get(*id).map(|c| c.status) == Some(Status::Completed)).count();
                FileProgress { path: path.clone(), status: *status, total_chunks, completed_chunks }
            })
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_chunk_id(chunk_id: &str) -> Option<String> {
    let idx = chunk_id.rfind("_part_")?;
    Some(chunk_id[..idx].to_string())
}

/// Derivation rule (spec.md §4.8): `processing` if any chunk is
/// `processing`; `completed` if all chunks are `completed`; `failed` if at
/// least one chunk is `failed` and none is `processing`; else `pending`.
fn derive_file_status(state: &State, path: &str) -> Status {
    let chunk_ids = match state.chunks_by_file.get(path) {
        Some(ids) if !ids.is_empty() => ids,
        _ => return state.files.get(path).copied().unwrap_or(Status::Pending),
    };
    let statuses: Vec<Status> = chunk_ids.iter().filter_map(|id| state.chunks.get(id).map(|c| c.status)).collect();

    if statuses.iter().any(|s| *s == Status::Processing) {
        Status::Processing
    } else if statuses.iter().all(|s| *s == Status::Completed) {
        Status::Completed
    } else if statuses.iter().any(|s| *s == Status::Failed) {
        Status::Failed
    } else {
        Status::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_status_derives_from_chunk_statuses() {
        let tracker = ProgressTracker::new();
        tracker.register_files(["a.py".to_string()]);
        tracker.register_chunk("c1", "a.py");
        tracker.register_chunk("c2", "a.py");

        tracker.update_chunk_status("c1", Status::Completed);
        assert_eq!(tracker.get_file_progress()[0].status, Status::Pending);

        tracker.update_chunk_status("c2", Status::Processing);
        assert_eq!(tracker.get_file_progress()[0].status, Status::Processing);

        tracker.update_chunk_status("c2", Status::Completed);
        assert_eq!(tracker.get_file_progress()[0].status, Status::Completed);
    }

    #[test]
    fn failed_chunk_without_processing_marks_file_failed() {
        let tracker = ProgressTracker::new();
        tracker.register_files(["a.py".to_string()]);
        tracker.register_chunk("c1", "a.py");
        tracker.update_chunk_status("c1", Status::Failed);
        assert_eq!(tracker.get_file_progress()[0].status, Status::Failed);
    }

    #[test]
    fn explicit_file_status_override_for_cache_hits() {
        let tracker = ProgressTracker::new();
        tracker.register_files(["a.py".to_string()]);
        tracker.update_file_status("a.py", Status::Completed);
        assert_eq!(tracker.get_file_progress()[0].status, Status::Completed);
    }

    #[test]
    fn split_chunk_parent_aggregates_from_parts() {
        let tracker = ProgressTracker::new();
        tracker.register_files(["a.py".to_string()]);
        tracker.register_chunk("parent", "a.py");
        tracker.register_chunk("parent_part_0", "a.py");
        tracker.register_chunk("parent_part_1", "a.py");

        tracker.update_chunk_status("parent_part_0", Status::Completed);
        tracker.update_chunk_status("parent_part_1", Status::Completed);

        let state = tracker.state.read().unwrap();
        assert_eq!(state.chunks["parent"].status, Status::Completed);
    }

    #[test]
    fn split_chunk_parent_fails_when_any_part_fails_and_all_are_terminal() {
        let tracker = ProgressTracker::new();
        tracker.register_files(["a.py".to_string()]);
        tracker.register_chunk("parent", "a.py");
        tracker.register_chunk("parent_part_0", "a.py");
        tracker.register_chunk("parent_part_1", "a.py");

        tracker.update_chunk_status("parent_part_0", Status::Completed);
        tracker.update_chunk_status("parent_part_1", Status::Failed);

        let state = tracker.state.read().unwrap();
        assert_eq!(state.chunks["parent"].status, Status::Failed);
    }

    #[test]
    fn overall_progress_is_percentage_of_completed_files() {
        let tracker = ProgressTracker::new();
        tracker.register_files(["a.py".to_string(), "b.py".to_string()]);
        tracker.update_file_status("a.py", Status::Completed);
        assert_eq!(tracker.get_overall_progress(), 50.0);
    }
}
