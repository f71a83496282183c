//! On-disk crawl document store.
//!
//! One JSON document per node, stored under the crawl directory with a
//! filename derived from the node name. Presence of a document means
//! the node was already fetched: a crawl interrupted and restarted on
//! the same directory replays those results instead of refetching.

use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors related to store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store path {path} exists and is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("failed to create store directory {path}: {source}")]
    Create {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Escape a node name into a filesystem-safe file stem.
///
/// Alphanumerics and `-` pass through, everything else becomes `_`.
/// Deterministic, and unique per node for the hostname/address
/// alphabet nodes actually use.
pub fn file_key(node: &str) -> String {
    node.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Reverse of [`file_key`] for stored entries: `_` back to `.`.
pub fn node_name(key: &str) -> String {
    key.replace('_', ".")
}

/// Identity-keyed JSON document store backed by a directory.
pub struct DocStore {
    dir: PathBuf,
}

impl DocStore {
    /// Open a store at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if dir.exists() {
            if !dir.is_dir() {
                return Err(StoreError::NotADirectory { path: dir });
            }
        } else {
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::Create {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(Self { dir })
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `node`.
    pub fn path_for(&self, node: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_key(node)))
    }

    /// Whether a document for `node` is already stored.
    pub fn contains(&self, node: &str) -> bool {
        self.path_for(node).is_file()
    }

    /// Load the stored document for `node`, if any.
    pub fn load(&self, node: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(node);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| StoreError::Read {
            path: path.clone(),
            source: e,
        })?;
        let doc = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Parse { path, source: e })?;
        Ok(Some(doc))
    }

    /// Persist the document for `node`.
    ///
    /// Callers check [`contains`](Self::contains) first; a stored
    /// document is never rewritten by a later visit.
    pub fn save(&self, node: &str, doc: &Value) -> Result<(), StoreError> {
        let path = self.path_for(node);
        let body = serde_json::to_string(doc).map_err(|e| StoreError::Parse {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, body).map_err(|e| StoreError::Write { path, source: e })
    }

    /// Node names of every stored document, sorted.
    pub fn nodes(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::Read {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Read {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                nodes.push(node_name(stem));
            }
        }
        nodes.sort();
        Ok(nodes)
    }
}
