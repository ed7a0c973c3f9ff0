//! CLI route: run context and the single route table.

use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{format_scan_json, format_scan_text, ScanReport};
use crate::config::{ChecksumConfig, ConfigLoader};
use crate::error::ChecksumError;
use crate::strategy::{build_strategy, ChecksumStrategy, StrategyKind};
use crate::types::HashAlgorithm;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Runtime context for CLI execution: the resolved configuration
pub struct RunContext {
    config: ChecksumConfig,
}

impl RunContext {
    /// Load configuration for `root` (or from `config_path`) and apply command-line overrides
    ///
    /// Without a root the current directory is used, unless the explicit config
    /// file names one.
    pub fn new(
        root: Option<PathBuf>,
        config_path: Option<PathBuf>,
        strategy: Option<StrategyKind>,
        algorithm: Option<HashAlgorithm>,
    ) -> Result<Self, ChecksumError> {
        let mut config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(root.as_deref().unwrap_or(Path::new(".")))?,
        };
        if let Some(root) = root {
            config.root = root;
        }
        if let Some(strategy) = strategy {
            config.strategy = strategy;
        }
        if let Some(algorithm) = algorithm {
            config.algorithm = algorithm;
        }
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_config(config: ChecksumConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChecksumConfig {
        &self.config
    }

    /// Execute a command and return its output
    pub fn execute(&self, command: &Commands) -> Result<String, ChecksumError> {
        match command {
            Commands::Scan { format } => self.handle_scan(*format),
            Commands::Checksum { path } => self.handle_checksum(path),
            Commands::Watch { for_secs } => self.handle_watch(*for_secs),
        }
    }

    fn manual_strategy(&self) -> Result<Box<dyn ChecksumStrategy>, ChecksumError> {
        build_strategy(&self.config.clone().with_strategy(StrategyKind::Manual))
    }

    fn handle_scan(&self, format: OutputFormat) -> Result<String, ChecksumError> {
        let mut strategy = self.manual_strategy()?;
        let report = ScanReport::from_snapshot(
            strategy.root(),
            self.config.algorithm,
            strategy.store().snapshot(),
        );
        strategy.shutdown()?;
        match format {
            OutputFormat::Text => Ok(format_scan_text(&report)),
            OutputFormat::Json => format_scan_json(&report),
        }
    }

    fn handle_checksum(&self, path: &Path) -> Result<String, ChecksumError> {
        let mut strategy = self.manual_strategy()?;
        let digest = strategy.checksum(path);
        strategy.shutdown()?;
        digest
            .map(|d| d.to_string())
            .ok_or_else(|| ChecksumError::InvalidPath(format!("No checksum for {}", path.display())))
    }

    fn handle_watch(&self, for_secs: Option<u64>) -> Result<String, ChecksumError> {
        let mut strategy = build_strategy(&self.config)?;
        let changes = Arc::new(AtomicUsize::new(0));
        let deletions = Arc::new(AtomicUsize::new(0));

        match strategy.listeners() {
            Some(listeners) => {
                let store = strategy.store();
                let counter = Arc::clone(&changes);
                listeners.register_change_listener(move |path: &Path| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    let digest = store.get(path).map(|d| d.to_string()).unwrap_or_default();
                    info!(path = %path.display(), digest = %digest, "Checksum changed");
                    println!("changed {} {}", path.display(), digest);
                });
                let counter = Arc::clone(&deletions);
                listeners.register_delete_listener(move |path: &Path| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    info!(path = %path.display(), "Checksum removed");
                    println!("deleted {}", path.display());
                });
            }
            None => warn!(
                strategy = %strategy.kind(),
                "Strategy does not publish change events; only the final state is reported"
            ),
        }

        match for_secs {
            Some(secs) => thread::sleep(Duration::from_secs(secs)),
            None => {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    if line.is_err() {
                        break;
                    }
                }
            }
        }

        let root_digest = strategy
            .checksum(strategy.root())
            .map(|d| d.to_string())
            .unwrap_or_default();
        let root = strategy.root().to_path_buf();
        strategy.shutdown()?;

        Ok(format!(
            "Stopped watching {}: {} changes, {} deletions, root checksum {}",
            root.display(),
            changes.load(Ordering::Relaxed),
            deletions.load(Ordering::Relaxed),
            root_digest
        ))
    }
}
