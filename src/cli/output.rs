//! CLI output: error mapping from domain errors to the CLI surface.

use crate::error::ChecksumError;
use std::error::Error;

/// Render an error with its chain of causes, one per line
pub fn map_error(e: &ChecksumError) -> String {
    let mut message = format!("error: {}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    message
}
