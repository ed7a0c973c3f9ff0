//! CLI presentation: text tables and JSON documents for command results.

use crate::error::ChecksumError;
use crate::types::{Digest, HashAlgorithm};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One stored checksum, with its path relative to the root
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: String,
    pub digest: Digest,
}

/// Result of `sumtree scan`
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub algorithm: HashAlgorithm,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    /// Build from a store snapshot; the root itself is listed as `.`
    pub fn from_snapshot(
        root: &Path,
        algorithm: HashAlgorithm,
        snapshot: BTreeMap<PathBuf, Digest>,
    ) -> Self {
        let entries = snapshot
            .into_iter()
            .map(|(path, digest)| ScanEntry {
                path: relative_display(root, &path),
                digest,
            })
            .collect();
        Self {
            root: root.to_path_buf(),
            algorithm,
            entries,
        }
    }
}

fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

pub fn format_scan_text(report: &ScanReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Path", "Checksum"]);
    for entry in &report.entries {
        table.add_row(vec![entry.path.as_str(), entry.digest.as_str()]);
    }
    format!(
        "Root: {}\nAlgorithm: {}\n{}",
        report.root.display(),
        report.algorithm,
        table
    )
}

pub fn format_scan_json(report: &ScanReport) -> Result<String, ChecksumError> {
    Ok(serde_json::to_string_pretty(report)?)
}
