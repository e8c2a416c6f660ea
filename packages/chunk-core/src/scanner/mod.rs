//! FileScanner — walk the workspace, apply allow/deny globs, read bytes,
//! compute content hashes (spec.md §4.1).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{CoreError, Result};

/// One admitted file (spec.md §3 "File"). Lives only for the duration of a
/// single `scan` call; never mutated.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: String, // workspace-relative
    pub absolute_path: PathBuf,
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub extension: String,
    pub language: Option<String>,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub file_hashes: HashMap<String, String>,
}

pub struct FileScanner {
    allowed_extensions: std::collections::HashSet<String>,
    ignore_globs: GlobSet,
    ignored_dirs: std::collections::HashSet<String>,
    max_file_size: u64,
}

impl FileScanner {
    pub fn new(config: &Config) -> Self {
        let allowed_extensions = config
            .allowed_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore_globs {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("ignoring malformed ignore glob '{pattern}': {e}"),
            }
        }
        let ignore_globs = builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap());

        Self {
            allowed_extensions,
            ignore_globs,
            ignored_dirs: config.ignored_dirs.iter().cloned().collect(),
            max_file_size: config.max_file_size,
        }
    }

    /// Walk the tree depth-first, skipping ignored directories, glob-matched
    /// paths, disallowed extensions, and oversize files. Emission order is
    /// stable: sorted lexicographically by workspace-relative path (spec.md
    /// §4.2's requirement for the Merkle tree's leaf order).
    pub fn scan(&self, root: &Path) -> Result<ScanResult> {
        let mut candidates = Vec::new();

        for entry in WalkDir::new(root).into_iter() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("scan: failed to read directory entry: {e}");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let absolute_path = entry.path().to_path_buf();
            let relative = match absolute_path.strip_prefix(root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let relative_str = relative.to_string_lossy().replace('\\', "/");

            if self.is_ignored(relative) {
                continue;
            }

            let extension = absolute_path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !self.allowed_extensions.contains(&extension) {
                continue;
            }

            let metadata = match std::fs::metadata(&absolute_path) {
                Ok(m) => m,
                Err(e) => {
                    warn!("scan: stat failed for {relative_str}: {e}");
                    continue;
                }
            };
            if metadata.len() > self.max_file_size {
                continue;
            }

            candidates.push((relative_str, absolute_path, extension, metadata.len()));
        }

        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut files = Vec::with_capacity(candidates.len());
        let mut file_hashes = HashMap::with_capacity(candidates.len());

        for (relative_str, absolute_path, extension, size) in candidates {
            let bytes = std::fs::read(&absolute_path).map_err(|e| CoreError::Io {
                path: relative_str.clone(),
                source: e,
            })?;

            let content_hash = sha256_hex(&bytes);
            file_hashes.insert(relative_str.clone(), content_hash.clone());

            files.push(ScannedFile {
                path: relative_str,
                absolute_path,
                bytes,
                content_hash,
                extension,
                language: None,
                size,
            });
        }

        Ok(ScanResult { files, file_hashes })
    }

    fn is_ignored(&self, relative: &Path) -> bool {
        for component in relative.components() {
            if let std::path::Component::Normal(name) = component {
                if self.ignored_dirs.contains(&name.to_string_lossy().to_string()) {
                    return true;
                }
            }
        }
        self.ignore_globs.is_match(relative)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn make_config(root: &Path) -> Config {
        let mut cfg = Config::default_for_workspace(root.to_string_lossy().to_string());
        cfg.allowed_extensions = vec!["py".to_string(), "rs".to_string()];
        cfg.ignore_globs = vec!["**/ignored/**".to_string()];
        cfg.ignored_dirs = vec![".git".to_string()];
        cfg.max_file_size = 1024;
        cfg
    }

    #[test]
    fn scan_admits_allowed_extensions_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), b"print(1)").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"ignored").unwrap();

        let cfg = make_config(dir.path());
        let scanner = FileScanner::new(&cfg);
        let result = scanner.scan(dir.path()).unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].path, "a.py");
    }

    #[test]
    fn scan_skips_ignored_directories_and_globs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config.py"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("ignored")).unwrap();
        std::fs::write(dir.path().join("ignored/skip.py"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.py"), b"x").unwrap();

        let cfg = make_config(dir.path());
        let scanner = FileScanner::new(&cfg);
        let result = scanner.scan(dir.path()).unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].path, "keep.py");
    }

    #[test]
    fn scan_skips_oversize_files() {
        let dir = tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("big.py")).unwrap();
        f.write_all(&vec![b'x'; 2048]).unwrap();

        let cfg = make_config(dir.path());
        let scanner = FileScanner::new(&cfg);
        let result = scanner.scan(dir.path()).unwrap();

        assert!(result.files.is_empty());
    }

    #[test]
    fn scan_emission_order_is_lexicographic() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("z.py"), b"z").unwrap();
        std::fs::write(dir.path().join("a.py"), b"a").unwrap();
        std::fs::write(dir.path().join("m.py"), b"m").unwrap();

        let cfg = make_config(dir.path());
        let scanner = FileScanner::new(&cfg);
        let result = scanner.scan(dir.path()).unwrap();

        let paths: Vec<_> = result.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec!["a.py".to_string(), "m.py".to_string(), "z.py".to_string()]);
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), b"hello").unwrap();

        let cfg = make_config(dir.path());
        let scanner = FileScanner::new(&cfg);
        let result = scanner.scan(dir.path()).unwrap();

        assert_eq!(result.files[0].content_hash, sha256_hex(b"hello"));
        assert_eq!(result.file_hashes["a.py"], result.files[0].content_hash);
    }
}
