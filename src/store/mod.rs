//! Checksum Store
//!
//! The single in-memory map from normalized absolute path to last known digest.
//! Every strategy reads and writes through it; callers on arbitrary threads query it
//! while one background thread keeps it current.

use crate::types::Digest;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

/// Thread-safe path → digest map
///
/// Keys are expected to be normalized (see [`crate::tree::path::normalize_path`]).
/// A `BTreeMap` keeps every subtree contiguous, which makes child and subtree
/// lookups range scans.
#[derive(Debug, Default)]
pub struct ChecksumStore {
    entries: RwLock<BTreeMap<PathBuf, Digest>>,
}

impl ChecksumStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last computed digest for the path, if any
    pub fn get(&self, path: &Path) -> Option<Digest> {
        self.entries.read().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Insert or overwrite the digest for a path
    pub fn put(&self, path: PathBuf, digest: Digest) {
        self.entries.write().insert(path, digest);
    }

    /// Remove exactly one entry, returning its last digest
    pub fn remove(&self, path: &Path) -> Option<Digest> {
        self.entries.write().remove(path)
    }

    /// Remove a path and every entry beneath it
    ///
    /// Returns the number of entries removed.
    pub fn remove_subtree(&self, path: &Path) -> usize {
        let mut entries = self.entries.write();
        let doomed: Vec<PathBuf> = entries
            .range::<Path, _>((Bound::Included(path), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(path))
            .cloned()
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Direct children of a directory, sorted by their path string
    pub fn children_of(&self, dir: &Path) -> Vec<(PathBuf, Digest)> {
        let entries = self.entries.read();
        let mut children: Vec<(PathBuf, Digest)> = entries
            .range::<Path, _>((Bound::Excluded(dir), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(dir))
            .filter(|(key, _)| key.parent() == Some(dir))
            .map(|(key, digest)| (key.clone(), digest.clone()))
            .collect();
        children.sort_by(|(a, _), (b, _)| {
            a.to_string_lossy()
                .cmp(&b.to_string_lossy())
                .then_with(|| a.cmp(b))
        });
        children
    }

    /// Copy of every entry, ordered by path
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Digest> {
        self.entries.read().clone()
    }

    /// Swap the whole map in one step
    pub fn replace_all(&self, entries: BTreeMap<PathBuf, Digest>) {
        *self.entries.write() = entries;
    }

    /// Move all entries out, leaving the store empty
    pub fn take(&self) -> BTreeMap<PathBuf, Digest> {
        std::mem::take(&mut *self.entries.write())
    }
}
