//! Digest computation for files and directories

use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::types::{Digest, HashAlgorithm};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Computes file and directory digests with a configured algorithm
///
/// Every call builds its own hasher, so one instance can be shared freely across
/// the watcher thread and caller threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestFunction {
    algorithm: HashAlgorithm,
}

impl DigestFunction {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest of a file's raw bytes
    ///
    /// The file is read fully into memory through a buffered reader.
    pub fn file_digest(&self, path: &Path) -> Result<Digest, ChecksumError> {
        let read = || -> std::io::Result<Vec<u8>> {
            let mut reader = BufReader::new(File::open(path)?);
            let mut content = Vec::new();
            reader.read_to_end(&mut content)?;
            Ok(content)
        };
        let content = read().map_err(|source| ChecksumError::Checksum {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.algorithm.digest_bytes(&content))
    }

    /// Digest of a directory composed from the digests of its direct children
    /// currently held in the store
    ///
    /// `dir` must be normalized. Children are folded in lexicographic order of
    /// their normalized path strings.
    pub fn directory_digest(&self, dir: &Path, store: &ChecksumStore) -> Digest {
        let children = store.children_of(dir);
        self.combine(children.iter().map(|(_, digest)| digest))
    }

    /// Fold child digests, in the given order, into one digest
    ///
    /// Each child contributes its raw digest bytes.
    pub fn combine<'a, I>(&self, children: I) -> Digest
    where
        I: IntoIterator<Item = &'a Digest>,
    {
        let mut buffer = Vec::new();
        for digest in children {
            buffer.extend_from_slice(&digest.to_bytes());
        }
        self.algorithm.digest_bytes(&buffer)
    }
}
