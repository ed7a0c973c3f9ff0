//! Integration tests for the file watcher strategy
//!
//! Events arrive asynchronously, so every assertion on watcher-maintained state
//! polls with a deadline.

use super::test_utils::{md5_hex, wait_until, watcher_config, EVENT_TIMEOUT};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use sumtree::strategy::{ChecksumStrategy, FileWatcherStrategy, WatchState};
use sumtree::tree::path::normalize_path;
use sumtree::tree::walker::WalkReport;
use tempfile::TempDir;

fn fixture() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("src").join("nested")).unwrap();
    fs::create_dir(root.join("sibling")).unwrap();
    fs::write(root.join("src").join("nested").join("leaf.txt"), "leaf v1").unwrap();
    fs::write(root.join("src").join("main.txt"), "main").unwrap();
    fs::write(root.join("sibling").join("other.txt"), "other").unwrap();
    temp_dir
}

fn started(root: &Path) -> FileWatcherStrategy {
    let mut strategy = FileWatcherStrategy::new(&watcher_config(root)).unwrap();
    strategy.start().unwrap();
    strategy
}

#[test]
fn test_lifecycle_states() {
    let temp_dir = fixture();
    let mut strategy = FileWatcherStrategy::new(&watcher_config(temp_dir.path())).unwrap();
    assert_eq!(strategy.state(), WatchState::Stopped);
    assert!(strategy.checksum(temp_dir.path()).is_none());

    strategy.start().unwrap();
    assert_eq!(strategy.state(), WatchState::Running);
    assert!(strategy.checksum(temp_dir.path()).is_some());
    assert!(strategy.start().is_err());

    strategy.shutdown().unwrap();
    assert_eq!(strategy.state(), WatchState::Stopped);
    strategy.shutdown().unwrap();
}

/// A file change updates the file and every ancestor, not its siblings
#[test]
fn test_change_propagates_to_ancestors_only() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);

    let leaf = root.join("src").join("nested").join("leaf.txt");
    let before_root = strategy.checksum(root).unwrap();
    let before_src = strategy.checksum(&root.join("src")).unwrap();
    let before_nested = strategy.checksum(&root.join("src").join("nested")).unwrap();
    let before_sibling = strategy.checksum(&root.join("sibling")).unwrap();

    fs::write(&leaf, "leaf v2").unwrap();

    let expected = md5_hex(b"leaf v2");
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy
            .checksum(&leaf)
            .map(|d| d.as_str() == expected)
            .unwrap_or(false)
            && strategy.checksum(root) != Some(before_root.clone())
    }));
    assert_ne!(strategy.checksum(&root.join("src")).unwrap(), before_src);
    assert_ne!(
        strategy.checksum(&root.join("src").join("nested")).unwrap(),
        before_nested
    );
    assert_eq!(strategy.checksum(&root.join("sibling")).unwrap(), before_sibling);

    strategy.shutdown().unwrap();
}

/// After events settle the store matches a fresh walk
#[test]
fn test_settled_store_matches_fresh_walk() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);

    fs::write(root.join("src").join("main.txt"), "main v2").unwrap();
    fs::write(root.join("sibling").join("added.txt"), "added").unwrap();

    let expected = md5_hex(b"main v2");
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(&root.join("sibling").join("added.txt")).is_some()
            && strategy
                .checksum(&root.join("src").join("main.txt"))
                .map(|d| d.as_str() == expected)
                .unwrap_or(false)
    }));

    let mut fresh = FileWatcherStrategy::new(&watcher_config(root)).unwrap();
    fresh.start().unwrap();
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.store().snapshot() == fresh.store().snapshot()
    }));

    fresh.shutdown().unwrap();
    strategy.shutdown().unwrap();
}

/// Deleting a file removes its entry and changes every ancestor
#[test]
fn test_file_deletion_propagates() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);

    let leaf = root.join("src").join("nested").join("leaf.txt");
    let before_root = strategy.checksum(root).unwrap();
    let before_nested = strategy.checksum(&root.join("src").join("nested")).unwrap();

    fs::remove_file(&leaf).unwrap();

    assert!(wait_until(EVENT_TIMEOUT, || strategy.checksum(&leaf).is_none()));
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(root) != Some(before_root.clone())
    }));
    let nested = strategy.checksum(&root.join("src").join("nested")).unwrap();
    assert_ne!(nested, before_nested);
    // Now empty
    assert_eq!(nested.as_str(), md5_hex(b""));

    strategy.shutdown().unwrap();
}

/// Removing a directory tree eventually removes every descendant entry
#[test]
fn test_directory_deletion_removes_subtree() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);
    let src = root.join("src");
    let key = normalize_path(&src).unwrap();

    fs::remove_dir_all(&src).unwrap();

    let store = strategy.store();
    assert!(wait_until(EVENT_TIMEOUT, || {
        store.snapshot().keys().all(|path| !path.starts_with(&key))
    }));
    assert!(strategy.checksum(&src.join("main.txt")).is_none());
    assert!(strategy.checksum(&root.join("sibling").join("other.txt")).is_some());

    strategy.shutdown().unwrap();
}

/// A directory created after start is walked and then watched
#[test]
fn test_new_directory_is_walked_and_watched() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);

    let fresh_dir = root.join("fresh");
    fs::create_dir(&fresh_dir).unwrap();
    fs::write(fresh_dir.join("one.txt"), "one").unwrap();

    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(&fresh_dir.join("one.txt")).is_some()
    }));

    fs::write(fresh_dir.join("one.txt"), "one v2").unwrap();
    let expected = md5_hex(b"one v2");
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy
            .checksum(&fresh_dir.join("one.txt"))
            .map(|d| d.as_str() == expected)
            .unwrap_or(false)
    }));

    strategy.shutdown().unwrap();
}

#[test]
fn test_rename_moves_entry() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);

    let from = root.join("sibling").join("other.txt");
    let to = root.join("sibling").join("renamed.txt");
    fs::rename(&from, &to).unwrap();

    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(&from).is_none() && strategy.checksum(&to).is_some()
    }));
    assert_eq!(strategy.checksum(&to).unwrap().as_str(), md5_hex(b"other"));

    strategy.shutdown().unwrap();
}

#[test]
fn test_listeners_receive_events() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = FileWatcherStrategy::new(&watcher_config(root)).unwrap();
    let registry = strategy.listener_registry().clone();

    let (init_tx, init_rx) = mpsc::channel::<WalkReport>();
    let init_tx = std::sync::Mutex::new(init_tx);
    registry.register_initialized_listener(move |report: &WalkReport| {
        let _ = init_tx.lock().unwrap().send(*report);
    });

    let (change_tx, change_rx) = mpsc::channel::<PathBuf>();
    let change_tx = std::sync::Mutex::new(change_tx);
    registry.register_change_listener(move |path: &Path| {
        let _ = change_tx.lock().unwrap().send(path.to_path_buf());
    });

    let (delete_tx, delete_rx) = mpsc::channel::<PathBuf>();
    let delete_tx = std::sync::Mutex::new(delete_tx);
    registry.register_delete_listener(move |path: &Path| {
        let _ = delete_tx.lock().unwrap().send(path.to_path_buf());
    });

    strategy.start().unwrap();
    let report = init_rx.recv_timeout(EVENT_TIMEOUT).unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(report.directories, 4);

    let main = root.join("src").join("main.txt");
    let main_key = normalize_path(&main).unwrap();
    fs::write(&main, "changed").unwrap();
    assert!(received(&change_rx, &main_key));

    fs::remove_file(&main).unwrap();
    assert!(received(&delete_rx, &main_key));

    strategy.shutdown().unwrap();
    assert_eq!(registry.change_listener_count(), 0);
    assert_eq!(registry.delete_listener_count(), 0);
}

fn received(rx: &mpsc::Receiver<PathBuf>, expected: &Path) -> bool {
    wait_until(EVENT_TIMEOUT, || {
        while let Ok(path) = rx.try_recv() {
            if path == expected {
                return true;
            }
        }
        false
    })
}

#[test]
fn test_no_updates_after_shutdown() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);
    strategy.shutdown().unwrap();

    let main = root.join("src").join("main.txt");
    let before = strategy.checksum(&main).unwrap();
    fs::write(&main, "after shutdown").unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(strategy.checksum(&main).unwrap(), before);
}

#[test]
fn test_recalculate_all_while_running() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);

    let report = strategy.recalculate_all().unwrap();
    assert_eq!(report.files, 3);
    assert!(!report.cancelled);
    assert!(strategy.checksum(&root.join("src").join("main.txt")).is_some());

    strategy.shutdown().unwrap();
}

#[test]
fn test_restart_after_shutdown() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);
    strategy.shutdown().unwrap();

    fs::write(root.join("late.txt"), "late").unwrap();
    strategy.start().unwrap();
    assert!(strategy.checksum(&root.join("late.txt")).is_some());
    strategy.shutdown().unwrap();
}

fn no_keys_under(strategy: &FileWatcherStrategy, dir: &Path) -> bool {
    strategy
        .store()
        .snapshot()
        .keys()
        .all(|path| !path.starts_with(dir))
}

/// Renaming a directory inside the root drops every entry under the old name
#[test]
fn test_directory_rename_within_root_drops_old_subtree() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut strategy = started(root);
    let src_key = normalize_path(&root.join("src")).unwrap();
    let moved = root.join("moved");

    fs::rename(root.join("src"), &moved).unwrap();

    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(&moved.join("main.txt")).is_some()
            && strategy
                .checksum(&moved.join("nested").join("leaf.txt"))
                .is_some()
            && no_keys_under(&strategy, &src_key)
    }));
    assert!(strategy.checksum(&root.join("src").join("main.txt")).is_none());
    assert_eq!(
        strategy.checksum(&moved.join("main.txt")).unwrap().as_str(),
        md5_hex(b"main")
    );

    strategy.shutdown().unwrap();
}

/// Moving a directory out of the root drops its whole subtree
#[test]
fn test_directory_moved_out_of_root_drops_subtree() {
    let temp_dir = fixture();
    let outside = TempDir::new().unwrap();
    let root = temp_dir.path();
    let mut strategy = started(root);
    let src_key = normalize_path(&root.join("src")).unwrap();
    let before_root = strategy.checksum(root).unwrap();

    fs::rename(root.join("src"), outside.path().join("src")).unwrap();

    assert!(wait_until(EVENT_TIMEOUT, || no_keys_under(&strategy, &src_key)));
    assert!(strategy
        .checksum(&root.join("src").join("nested").join("leaf.txt"))
        .is_none());
    assert!(wait_until(EVENT_TIMEOUT, || {
        strategy.checksum(root) != Some(before_root.clone())
    }));
    assert!(strategy.checksum(&root.join("sibling").join("other.txt")).is_some());

    strategy.shutdown().unwrap();
}

/// A listener may ask for a full recalculation without deadlocking the watcher thread
#[test]
fn test_recalculate_all_from_listener() {
    use parking_lot::Mutex;
    use std::sync::Arc;

    let temp_dir = fixture();
    let root = temp_dir.path();
    let strategy = Arc::new(Mutex::new(
        FileWatcherStrategy::new(&watcher_config(root)).unwrap(),
    ));
    let registry = strategy.lock().listener_registry().clone();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let weak = Arc::downgrade(&strategy);
    registry.register_change_listener(move |_: &Path| {
        let Some(strategy) = weak.upgrade() else {
            return;
        };
        // Skip while the test thread holds the lock to shut down
        let Some(strategy) = strategy.try_lock() else {
            return;
        };
        let result = strategy.recalculate_all().map(|report| report.files);
        let _ = tx.lock().send(result);
    });

    strategy.lock().start().unwrap();
    fs::write(root.join("sibling").join("trigger.txt"), "go").unwrap();

    let files = rx.recv_timeout(EVENT_TIMEOUT).unwrap().unwrap();
    assert_eq!(files, 4);

    registry.clear_all();
    strategy.lock().shutdown().unwrap();
}
