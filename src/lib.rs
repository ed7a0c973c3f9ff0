//! Sumtree: cached content fingerprints for a directory tree
//!
//! Keeps a digest for every file and directory under a root. File digests hash
//! the file's bytes; directory digests fold the digests of their direct
//! children, so a change anywhere in a subtree changes every digest on the way
//! up to the root. A strategy decides how the cache follows the filesystem:
//! explicit recalculation, periodic full re-walks, or filesystem notifications.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod strategy;
pub mod tree;
pub mod types;

pub use config::{ChecksumConfig, ConfigLoader};
pub use error::ChecksumError;
pub use strategy::{build_strategy, ChecksumStrategy, StrategyKind};
pub use types::{Digest, HashAlgorithm};
