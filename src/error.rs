//! Error types for the checksum cache.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while computing or maintaining checksums
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// A file could not be opened or read while hashing it
    #[error("Failed to compute checksum of {path:?}: {source}")]
    Checksum {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem watch mechanism could not be acquired or a directory
    /// could not be registered with it
    #[error("Watch service error: {0}")]
    WatchService(String),

    /// A tree walk was aborted by a failure on one of its entries
    #[error("Tree walk failed at {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: Box<ChecksumError>,
    },

    #[error("Invalid root directory {0:?}: {1}")]
    InvalidRoot(PathBuf, String),

    #[error("Path {0:?} is outside of the checksum root")]
    OutsideRoot(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background thread error: {0}")]
    Thread(String),

    /// Rendering command output failed
    #[error("Output error: {0}")]
    Output(String),
}

impl From<config::ConfigError> for ChecksumError {
    fn from(err: config::ConfigError) -> Self {
        ChecksumError::Config(err.to_string())
    }
}

impl From<notify::Error> for ChecksumError {
    fn from(err: notify::Error) -> Self {
        ChecksumError::WatchService(err.to_string())
    }
}

impl From<serde_json::Error> for ChecksumError {
    fn from(err: serde_json::Error) -> Self {
        ChecksumError::Output(err.to_string())
    }
}
