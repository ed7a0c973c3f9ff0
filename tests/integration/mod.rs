//! Integration tests for the sumtree checksum cache

mod refresh_strategy;
mod watcher_strategy;
