//! Integration tests for the refresh strategy

use super::test_utils::{md5_hex, refresh_config, wait_until, EVENT_TIMEOUT};
use std::fs;
use sumtree::strategy::{ChecksumStrategy, RefreshStrategy};
use tempfile::TempDir;

#[test]
fn test_refresh_follows_modifications_and_deletions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir(root.join("data")).unwrap();
    fs::write(root.join("data").join("keep.txt"), "keep").unwrap();
    fs::write(root.join("data").join("drop.txt"), "drop").unwrap();

    let mut strategy = RefreshStrategy::start(&refresh_config(root, 50)).unwrap();
    let before_root = strategy.checksum(root).unwrap();

    fs::write(root.join("data").join("keep.txt"), "keep v2").unwrap();
    fs::remove_file(root.join("data").join("drop.txt")).unwrap();

    let expected = md5_hex(b"keep v2");
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(&root.join("data").join("drop.txt")).is_none()
            && strategy
                .checksum(&root.join("data").join("keep.txt"))
                .map(|d| d.as_str() == expected)
                .unwrap_or(false)
    }));
    assert_ne!(strategy.checksum(root).unwrap(), before_root);

    strategy.shutdown().unwrap();
}

/// Until the next cycle the store keeps the previous digests
#[test]
fn test_changes_lag_until_next_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("slow.txt"), "v1").unwrap();

    let mut strategy = RefreshStrategy::start(&refresh_config(root, 3_600_000)).unwrap();
    fs::write(root.join("slow.txt"), "v2").unwrap();
    assert_eq!(
        strategy.checksum(&root.join("slow.txt")).unwrap().as_str(),
        md5_hex(b"v1")
    );

    // An explicit full recalculation does not wait for the interval
    strategy.recalculate_all().unwrap();
    assert_eq!(
        strategy.checksum(&root.join("slow.txt")).unwrap().as_str(),
        md5_hex(b"v2")
    );
    strategy.shutdown().unwrap();
}

#[test]
fn test_refresh_stops_after_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let mut strategy = RefreshStrategy::start(&refresh_config(root, 20)).unwrap();
    strategy.shutdown().unwrap();
    assert!(!strategy.is_running());

    fs::write(root.join("ignored.txt"), "ignored").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(200));
    assert!(strategy.checksum(&root.join("ignored.txt")).is_none());
}
