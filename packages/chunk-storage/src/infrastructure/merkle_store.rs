//! Merkle tree over file content hashes, with JSON(+gzip+base64) snapshot
//! persistence (spec.md §4.2, §6).

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::{FileHashEntry, MerkleDiff, MerkleSnapshot, MerkleSnapshotWire, SCHEMA_VERSION};
use crate::error::Result;

pub const SNAPSHOT_FILE_NAME: &str = "merkle-state.json";

fn sha256_concat(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build a Merkle root over an ordered list of leaf hashes (hex strings).
/// Odd layers duplicate the last node (spec.md §4.2).
pub fn build_root_hash(ordered_leaf_hashes: &[String]) -> String {
    if ordered_leaf_hashes.is_empty() {
        return hex(&Sha256::digest(b""));
    }

    let mut layer: Vec<Vec<u8>> = ordered_leaf_hashes
        .iter()
        .map(|h| h.as_bytes().to_vec())
        .collect();

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut i = 0;
        while i < layer.len() {
            let left = &layer[i];
            let right = if i + 1 < layer.len() { &layer[i + 1] } else { &layer[i] };
            next.push(sha256_concat(left, right));
            i += 2;
        }
        layer = next;
    }

    hex(&layer[0])
}

pub struct MerkleStore {
    cache_dir: PathBuf,
    compression: bool,
}

impl MerkleStore {
    pub fn new(cache_dir: impl Into<PathBuf>, compression: bool) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            compression,
        }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Build a fresh snapshot from `(path, hash, size)` triples. Files are
    /// expected to already be sorted lexicographically by the caller (the
    /// scanner's emission order); this function sorts defensively via the
    /// `BTreeMap` it stores into.
    pub fn build_snapshot(
        &self,
        workspace_path: &str,
        timestamp_ms: i64,
        files: impl IntoIterator<Item = (String, String, u64)>,
    ) -> MerkleSnapshot {
        let mut file_hash_map = BTreeMap::new();
        for (path, hash, size) in files {
            file_hash_map.insert(path, FileHashEntry { hash, size });
        }

        let ordered: Vec<String> = file_hash_map.values().map(|e| e.hash.clone()).collect();
        let root_hash = build_root_hash(&ordered);

        MerkleSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            root_hash,
            timestamp_ms,
            workspace_path: workspace_path.to_string(),
            file_hash_map,
        }
    }

    /// `diff(previous, current)`. Short-circuits to an empty diff when the
    /// root hashes match (spec.md §4.2).
    pub fn diff(previous: &MerkleSnapshot, current: &MerkleSnapshot) -> MerkleDiff {
        if previous.root_hash == current.root_hash {
            return MerkleDiff::default();
        }

        let mut diff = MerkleDiff::default();
        for (path, entry) in &current.file_hash_map {
            match previous.file_hash_map.get(path) {
                None => diff.added.push(path.clone()),
                Some(prev_entry) if prev_entry.hash != entry.hash => diff.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        for path in previous.file_hash_map.keys() {
            if !current.file_hash_map.contains_key(path) {
                diff.removed.push(path.clone());
            }
        }
        diff
    }

    pub fn persist(&self, snapshot: &MerkleSnapshot) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let wire = MerkleSnapshotWire::from(snapshot);
        let json = serde_json::to_vec(&wire)?;

        let bytes = if self.compression {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json)?;
            let gz = encoder.finish()?;
            base64_encode(&gz)
        } else {
            json
        };

        std::fs::write(self.snapshot_path(), bytes)?;
        Ok(())
    }

    /// Load the persisted snapshot. A missing file, corrupt JSON, or schema
    /// mismatch all yield `Ok(None)` (warning logged) so the caller treats it
    /// as an "initial build" per spec.md §4.2's failure mode.
    pub fn load(&self) -> Result<Option<MerkleSnapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read(&path)?;
        let json = if self.compression {
            match base64_decode(&raw) {
                Ok(gz) => {
                    let mut decoder = GzDecoder::new(gz.as_slice());
                    let mut out = Vec::new();
                    match decoder.read_to_end(&mut out) {
                        Ok(_) => out,
                        Err(e) => {
                            warn!("merkle snapshot gzip decode failed, discarding: {e}");
                            return Ok(None);
                        }
                    }
                }
                Err(e) => {
                    warn!("merkle snapshot base64 decode failed, discarding: {e}");
                    return Ok(None);
                }
            }
        } else {
            raw
        };

        let wire: MerkleSnapshotWire = match serde_json::from_slice(&json) {
            Ok(w) => w,
            Err(e) => {
                warn!("merkle snapshot JSON parse failed, discarding: {e}");
                return Ok(None);
            }
        };

        if wire.schema_version != SCHEMA_VERSION {
            warn!(
                "merkle snapshot schema version {} != {}, discarding",
                wire.schema_version, SCHEMA_VERSION
            );
            return Ok(None);
        }

        Ok(Some(wire.into()))
    }
}

fn base64_encode(bytes: &[u8]) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes).into_bytes()
}

fn base64_decode(bytes: &[u8]) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(bytes)
}
