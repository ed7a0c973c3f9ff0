//! Manual strategy: one walk at startup, explicit recalculation afterwards

use crate::config::ChecksumConfig;
use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::strategy::shared::ChecksumTree;
use crate::strategy::{ChecksumStrategy, StrategyKind};
use crate::tree::walker::WalkReport;
use crate::types::Digest;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Walks the root once when created and never updates on its own
///
/// [`ChecksumStrategy::recalculate`] refreshes exactly the given path. Callers that
/// change a file and want the directories above it to follow must recalculate
/// those too.
#[derive(Debug)]
pub struct ManualStrategy {
    tree: ChecksumTree,
}

impl ManualStrategy {
    pub fn new(config: &ChecksumConfig) -> Result<Self, ChecksumError> {
        let tree = ChecksumTree::open(&config.root, config.algorithm)?;
        let report = tree.walk(None, None)?;
        info!(
            root = %tree.root().display(),
            files = report.files,
            directories = report.directories,
            "Manual checksum strategy initialized"
        );
        Ok(Self { tree })
    }
}

impl ChecksumStrategy for ManualStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Manual
    }

    fn root(&self) -> &Path {
        self.tree.root()
    }

    fn checksum(&self, path: &Path) -> Option<Digest> {
        self.tree.checksum(path)
    }

    fn recalculate(&self, path: &Path) -> Result<(), ChecksumError> {
        self.tree.recalculate(path)
    }

    fn recalculate_all(&self) -> Result<WalkReport, ChecksumError> {
        self.tree.rebuild(None, None)
    }

    fn store(&self) -> Arc<ChecksumStore> {
        Arc::clone(self.tree.store())
    }

    fn shutdown(&mut self) -> Result<(), ChecksumError> {
        Ok(())
    }
}
