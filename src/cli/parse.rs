//! CLI parse: clap types for sumtree. No behavior; definitions only.

use crate::strategy::StrategyKind;
use crate::types::HashAlgorithm;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sumtree CLI - cached content fingerprints for a directory tree
#[derive(Parser)]
#[command(name = "sumtree")]
#[command(about = "Compute and maintain checksums for every file and directory under a root")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory to fingerprint (default: current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Strategy keeping checksums current (manual, refresh, file_watcher)
    #[arg(long)]
    pub strategy: Option<StrategyKind>,

    /// Hash algorithm (md5, sha256, blake3)
    #[arg(long)]
    pub algorithm: Option<HashAlgorithm>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Walk the root once and print every checksum
    Scan {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the checksum of one file or directory
    Checksum {
        /// Path under the root
        path: PathBuf,
    },
    /// Keep checksums current and report changes until stopped
    Watch {
        /// Stop after this many seconds (default: wait for end of stdin)
        #[arg(long)]
        for_secs: Option<u64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
