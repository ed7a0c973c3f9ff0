//! State and operations shared by every strategy

use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::tree::hasher::DigestFunction;
use crate::tree::path::{is_within_root, normalize_path};
use crate::tree::walker::{DirectoryWatch, TreeWalker, WalkReport};
use crate::types::{Digest, HashAlgorithm};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, trace};

/// Root directory, digest function and store of one strategy instance
#[derive(Debug)]
pub struct ChecksumTree {
    root: PathBuf,
    digests: DigestFunction,
    store: Arc<ChecksumStore>,
}

impl ChecksumTree {
    /// Check that `root` is a readable directory and normalize it
    pub fn open(root: &Path, algorithm: HashAlgorithm) -> Result<Self, ChecksumError> {
        let metadata = fs::metadata(root)
            .map_err(|e| ChecksumError::InvalidRoot(root.to_path_buf(), e.to_string()))?;
        if !metadata.is_dir() {
            return Err(ChecksumError::InvalidRoot(
                root.to_path_buf(),
                "not a directory".to_string(),
            ));
        }
        fs::read_dir(root)
            .map_err(|e| ChecksumError::InvalidRoot(root.to_path_buf(), e.to_string()))?;

        Ok(Self {
            root: normalize_path(root)?,
            digests: DigestFunction::new(algorithm),
            store: Arc::new(ChecksumStore::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn digests(&self) -> DigestFunction {
        self.digests
    }

    pub fn store(&self) -> &Arc<ChecksumStore> {
        &self.store
    }

    /// Normalize a path and check that it lies under the root
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, ChecksumError> {
        let key = normalize_path(path)?;
        if !is_within_root(&key, &self.root) {
            return Err(ChecksumError::OutsideRoot(key));
        }
        Ok(key)
    }

    /// Last known digest; unknown, unnormalizable or foreign paths yield `None`
    pub fn checksum(&self, path: &Path) -> Option<Digest> {
        let key = self.resolve(path).ok()?;
        self.store.get(&key)
    }

    /// Recompute exactly one path from disk
    ///
    /// Files are re-hashed, directories are re-folded from their stored children,
    /// and a path that no longer exists is dropped together with anything stored
    /// beneath it.
    pub fn recalculate(&self, path: &Path) -> Result<(), ChecksumError> {
        let key = self.resolve(path)?;
        match fs::metadata(&key) {
            Ok(metadata) if metadata.is_dir() => {
                let digest = self.digests.directory_digest(&key, &self.store);
                debug!(path = %key.display(), digest = %digest, "Recalculated directory checksum");
                self.store.put(key, digest);
            }
            Ok(metadata) if metadata.is_file() => {
                let digest = self.digests.file_digest(&key)?;
                debug!(path = %key.display(), digest = %digest, "Recalculated file checksum");
                self.store.put(key, digest);
            }
            Ok(_) => {
                trace!(path = %key.display(), "Skipping special file");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let removed = self.store.remove_subtree(&key);
                debug!(path = %key.display(), removed, "Dropped checksums of missing path");
            }
            Err(source) => return Err(ChecksumError::Checksum { path: key, source }),
        }
        Ok(())
    }

    /// Walk the root into the live store
    pub fn walk(
        &self,
        watch: Option<&mut dyn DirectoryWatch>,
        stop: Option<&AtomicBool>,
    ) -> Result<WalkReport, ChecksumError> {
        self.walk_subtree(&self.root, watch, stop)
    }

    /// Walk a normalized directory beneath the root into the live store
    pub fn walk_subtree(
        &self,
        dir: &Path,
        watch: Option<&mut dyn DirectoryWatch>,
        stop: Option<&AtomicBool>,
    ) -> Result<WalkReport, ChecksumError> {
        let mut walker = TreeWalker::new(dir.to_path_buf(), self.digests);
        if let Some(stop) = stop {
            walker = walker.with_stop_flag(stop);
        }
        if let Some(watch) = watch {
            walker = walker.with_watch(watch);
        }
        walker.walk_into(&self.store)
    }

    /// Walk the root into a fresh store and swap it in wholesale
    ///
    /// Readers keep seeing the previous digests until the swap. A cancelled walk
    /// leaves the live store untouched.
    pub fn rebuild(
        &self,
        watch: Option<&mut dyn DirectoryWatch>,
        stop: Option<&AtomicBool>,
    ) -> Result<WalkReport, ChecksumError> {
        let fresh = ChecksumStore::new();
        let mut walker = TreeWalker::new(self.root.clone(), self.digests);
        if let Some(stop) = stop {
            walker = walker.with_stop_flag(stop);
        }
        if let Some(watch) = watch {
            walker = walker.with_watch(watch);
        }
        let report = walker.walk_into(&fresh)?;
        if !report.cancelled {
            self.store.replace_all(fresh.take());
        }
        Ok(report)
    }

    /// Recompute every stored ancestor directory of `key`, up to and including the root
    ///
    /// Ancestors missing from the store (already deleted) are skipped rather than
    /// resurrected.
    pub fn update_ancestors(&self, key: &Path) {
        let mut current = key.parent();
        while let Some(dir) = current {
            if !is_within_root(dir, &self.root) {
                break;
            }
            if self.store.contains(dir) {
                let digest = self.digests.directory_digest(dir, &self.store);
                trace!(path = %dir.display(), digest = %digest, "Updated ancestor checksum");
                self.store.put(dir.to_path_buf(), digest);
            }
            if dir == self.root {
                break;
            }
            current = dir.parent();
        }
    }
}
