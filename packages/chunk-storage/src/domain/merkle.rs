//! Merkle snapshot domain model — persisted form and in-memory diff result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current persisted schema version. A loaded snapshot with a different
/// value is discarded (spec.md §4.2).
pub const SCHEMA_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileHashEntry {
    pub hash: String,
    pub size: u64,
}

/// `{ rootHash, orderedFileHashes[], fileHashMap, producedAt, schemaVersion }`
///
/// `orderedFileHashes` is reconstructible from `file_hash_map` iterated in
/// path order (the scanner's emission order), so it is derived rather than
/// stored twice; `to_wire`/`from_wire` produce the exact persisted shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MerkleSnapshot {
    pub schema_version: String,
    pub root_hash: String,
    pub timestamp_ms: i64,
    pub workspace_path: String,
    pub file_hash_map: BTreeMap<String, FileHashEntry>,
}

impl MerkleSnapshot {
    pub fn ordered_file_hashes(&self) -> Vec<&str> {
        self.file_hash_map.values().map(|e| e.hash.as_str()).collect()
    }

    pub fn empty(workspace_path: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            root_hash: String::new(),
            timestamp_ms,
            workspace_path: workspace_path.into(),
            file_hash_map: BTreeMap::new(),
        }
    }
}

/// `{ added[], modified[], removed[] }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl MerkleDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// On-disk JSON shape (spec.md §6). Kept separate from `MerkleSnapshot` so
/// the domain type can use `BTreeMap` (deterministic iteration) while the
/// wire format stays exactly what the spec documents.
#[derive(Debug, Serialize, Deserialize)]
pub struct MerkleSnapshotWire {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "rootHash")]
    pub root_hash: String,
    pub timestamp: i64,
    #[serde(rename = "workspacePath")]
    pub workspace_path: String,
    #[serde(rename = "fileHashMap")]
    pub file_hash_map: BTreeMap<String, FileHashEntry>,
}

impl From<&MerkleSnapshot> for MerkleSnapshotWire {
    fn from(s: &MerkleSnapshot) -> Self {
        Self {
            schema_version: s.schema_version.clone(),
            root_hash: s.root_hash.clone(),
            timestamp: s.timestamp_ms,
            workspace_path: s.workspace_path.clone(),
            file_hash_map: s.file_hash_map.clone(),
        }
    }
}

impl From<MerkleSnapshotWire> for MerkleSnapshot {
    fn from(w: MerkleSnapshotWire) -> Self {
        Self {
            schema_version: w.schema_version,
            root_hash: w.root_hash,
            timestamp_ms: w.timestamp,
            workspace_path: w.workspace_path,
            file_hash_map: w.file_hash_map,
        }
    }
}
