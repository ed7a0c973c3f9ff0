//! Merge rules: defaults applied before any file or environment source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use std::path::Path;

/// Create a Config builder with merge policy defaults applied.
///
/// The workspace root doubles as the default checksum root.
pub fn builder_with_defaults(
    workspace_root: &Path,
) -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("root", workspace_root.to_string_lossy().to_string())?
        .set_default("strategy", "file_watcher")?
        .set_default("algorithm", "md5")
}
