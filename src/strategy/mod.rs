//! Checksum strategies
//!
//! A strategy owns a [`ChecksumTree`] and decides when its store is populated and
//! kept current:
//!
//! - [`ManualStrategy`]: one walk at startup, then only explicit recalculation
//! - [`RefreshStrategy`]: periodic full re-walks on a background thread
//! - [`FileWatcherStrategy`]: incremental updates driven by filesystem events

pub mod shared;
pub mod listeners;
pub mod manual;
pub mod refresh;
pub mod watcher;

pub use shared::ChecksumTree;
pub use listeners::{ListenerId, ListenerRegistry};
pub use manual::ManualStrategy;
pub use refresh::RefreshStrategy;
pub use watcher::{FileWatcherStrategy, WatchState};

use crate::config::ChecksumConfig;
use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::tree::walker::WalkReport;
use crate::types::Digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Policy for keeping the checksum store current
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    Manual,
    Refresh,
    #[default]
    FileWatcher,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Manual => "manual",
            StrategyKind::Refresh => "refresh",
            StrategyKind::FileWatcher => "file_watcher",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "manual" => Ok(StrategyKind::Manual),
            "refresh" => Ok(StrategyKind::Refresh),
            "file_watcher" | "watch" => Ok(StrategyKind::FileWatcher),
            other => Err(format!(
                "Unknown strategy: {} (expected manual, refresh or file_watcher)",
                other
            )),
        }
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Common contract of every strategy
///
/// Queries never block on the strategy's background thread; they only go
/// through the store's own lock.
pub trait ChecksumStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Normalized root directory
    fn root(&self) -> &Path;

    /// Last known digest of a path; `None` if unknown or outside the root
    fn checksum(&self, path: &Path) -> Option<Digest>;

    /// Recompute the digest of exactly one file or directory
    ///
    /// Ancestors are not updated.
    fn recalculate(&self, path: &Path) -> Result<(), ChecksumError>;

    /// Re-walk the whole root
    fn recalculate_all(&self) -> Result<WalkReport, ChecksumError>;

    /// Shared handle to the backing store
    fn store(&self) -> Arc<ChecksumStore>;

    /// Change and delete listeners, for strategies that publish events
    fn listeners(&self) -> Option<Arc<ListenerRegistry>> {
        None
    }

    /// Stop background work and wait for it to finish
    fn shutdown(&mut self) -> Result<(), ChecksumError>;
}

/// Validate the configuration and start the configured strategy
pub fn build_strategy(config: &ChecksumConfig) -> Result<Box<dyn ChecksumStrategy>, ChecksumError> {
    config.validate()?;
    info!(
        root = %config.root.display(),
        strategy = %config.strategy,
        algorithm = %config.algorithm,
        "Starting checksum strategy"
    );

    let strategy: Box<dyn ChecksumStrategy> = match config.strategy {
        StrategyKind::Manual => Box::new(ManualStrategy::new(config)?),
        StrategyKind::Refresh => Box::new(RefreshStrategy::start(config)?),
        StrategyKind::FileWatcher => {
            let mut watcher = FileWatcherStrategy::new(config)?;
            watcher.start()?;
            Box::new(watcher)
        }
    };
    Ok(strategy)
}
