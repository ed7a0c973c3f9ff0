//! Configuration System
//!
//! Hierarchical configuration for the checksum cache: built-in defaults, a global
//! config file, a workspace config file, then `SUMTREE_*` environment overrides.

use crate::error::ChecksumError;
use crate::logging::LoggingConfig;
use crate::types::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::strategy::StrategyKind;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::{workspace_config_path, WORKSPACE_CONFIG_FILE};

/// Checksum cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumConfig {
    /// Root directory whose tree is fingerprinted
    pub root: PathBuf,

    /// Strategy keeping the store current
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Hash algorithm identifier: md5, sha256, blake3
    #[serde(default)]
    pub algorithm: HashAlgorithm,

    /// How long the watcher thread blocks waiting for events before checking for shutdown
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Interval between full re-walks for the refresh strategy
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Name given to the background thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_poll_timeout_ms() -> u64 {
    500
}

fn default_refresh_interval_ms() -> u64 {
    60_000
}

fn default_thread_name() -> String {
    "sumtree-checksum".to_string()
}

impl ChecksumConfig {
    /// Configuration with defaults for the given root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            strategy: StrategyKind::default(),
            algorithm: HashAlgorithm::default(),
            poll_timeout_ms: default_poll_timeout_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            thread_name: default_thread_name(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ChecksumError> {
        let mut errors = Vec::new();

        if self.root.as_os_str().is_empty() {
            errors.push("root cannot be empty".to_string());
        }
        if self.poll_timeout_ms == 0 {
            errors.push("poll_timeout_ms must be greater than zero".to_string());
        }
        if self.refresh_interval_ms == 0 {
            errors.push("refresh_interval_ms must be greater than zero".to_string());
        }
        if self.thread_name.trim().is_empty() {
            errors.push("thread_name cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChecksumError::Config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }
}

/// Loads [`ChecksumConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace
    ///
    /// Precedence, lowest first: defaults (root = `workspace_root`), global config
    /// file, `<workspace_root>/.sumtree.toml`, `SUMTREE_*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<ChecksumConfig, ChecksumError> {
        let builder = merge::merge_policy::builder_with_defaults(workspace_root)?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);

        let config: ChecksumConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring environment overrides
    pub fn load_from_file(path: &Path) -> Result<ChecksumConfig, ChecksumError> {
        if !path.exists() {
            return Err(ChecksumError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let workspace_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let builder = merge::merge_policy::builder_with_defaults(&workspace_root)?
            .add_source(config::File::from(path.to_path_buf()));
        let builder = sources::environment::add_to_builder(builder);

        let config: ChecksumConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
