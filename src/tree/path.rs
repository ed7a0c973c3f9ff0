//! Path canonicalization and normalization utilities

use crate::error::ChecksumError;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path into the form used as a checksum store key
///
/// This function:
/// 1. Makes the path absolute (relative to the current directory)
/// 2. Canonicalizes the deepest existing prefix, letting the OS resolve symlinks
///    together with the `..` that follow them
/// 3. Appends the missing tail, resolving `.` and `..` lexically, so deleted paths
///    still normalize
/// 4. Normalizes each UTF-8 component to NFC; other components are kept byte for byte
pub fn normalize_path(path: &Path) -> Result<PathBuf, ChecksumError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| {
                ChecksumError::InvalidPath(format!("Failed to resolve current directory: {}", e))
            })?
            .join(path)
    };

    let components: Vec<Component> = absolute.components().collect();
    let mut split = components.len();
    let canonical = loop {
        let prefix: PathBuf = components[..split].iter().collect();
        match dunce::canonicalize(&prefix) {
            Ok(canonical) => break canonical,
            Err(_) if split > 1 => split -= 1,
            Err(e) => {
                return Err(ChecksumError::InvalidPath(format!(
                    "Failed to canonicalize path {:?}: {}",
                    path, e
                )))
            }
        }
    };

    let mut resolved = canonical;
    for component in &components[split..] {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }

    Ok(normalize_components(&resolved))
}

/// NFC-normalize every UTF-8 component of a path without filesystem access
///
/// Components that are not valid UTF-8 are kept unchanged so that distinct
/// names never collapse into one key.
pub fn normalize_components(path: &Path) -> PathBuf {
    path.components()
        .map(|component| match component {
            Component::Normal(name) => normalize_name(name),
            other => other.as_os_str().to_os_string(),
        })
        .collect()
}

/// NFC form of a single file name, or the name itself if it is not UTF-8
pub fn normalize_name(name: &OsStr) -> OsString {
    match name.to_str() {
        Some(name) => OsString::from(name.nfc().collect::<String>()),
        None => name.to_os_string(),
    }
}

/// Whether a normalized path lies at or beneath a normalized root
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
