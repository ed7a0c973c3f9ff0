//! Refresh strategy: periodic full re-walks on a background thread

use crate::config::ChecksumConfig;
use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::strategy::shared::ChecksumTree;
use crate::strategy::{ChecksumStrategy, StrategyKind};
use crate::tree::walker::WalkReport;
use crate::types::Digest;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Re-walks the whole root every `refresh_interval`
///
/// Each cycle walks into a fresh store and swaps it in, so readers see either the
/// previous or the new generation. Digests may lag the filesystem by up to one
/// interval.
#[derive(Debug)]
pub struct RefreshStrategy {
    tree: Arc<ChecksumTree>,
    stop: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshStrategy {
    /// Walk the root, then start the refresh thread
    pub fn start(config: &ChecksumConfig) -> Result<Self, ChecksumError> {
        let tree = Arc::new(ChecksumTree::open(&config.root, config.algorithm)?);
        let stop = Arc::new(AtomicBool::new(false));
        let report = tree.walk(None, Some(&*stop))?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let interval = config.refresh_interval();
        let thread_tree = Arc::clone(&tree);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || refresh_loop(&thread_tree, &thread_stop, &shutdown_rx, interval))
            .map_err(|e| ChecksumError::Thread(format!("Failed to spawn refresh thread: {}", e)))?;

        info!(
            root = %tree.root().display(),
            files = report.files,
            directories = report.directories,
            interval_ms = interval.as_millis() as u64,
            "Refresh checksum strategy started"
        );

        Ok(Self {
            tree,
            stop,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

/// Sleep for `interval` or until shutdown, then rebuild; repeat
fn refresh_loop(
    tree: &ChecksumTree,
    stop: &AtomicBool,
    shutdown_rx: &mpsc::Receiver<()>,
    interval: Duration,
) {
    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match tree.rebuild(None, Some(stop)) {
            Ok(report) if report.cancelled => break,
            Ok(report) => debug!(
                files = report.files,
                directories = report.directories,
                "Refreshed checksums"
            ),
            Err(e) => error!(error = %e, "Checksum refresh failed, keeping previous checksums"),
        }
    }
    debug!("Refresh loop exited");
}

impl ChecksumStrategy for RefreshStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Refresh
    }

    fn root(&self) -> &Path {
        self.tree.root()
    }

    fn checksum(&self, path: &Path) -> Option<Digest> {
        self.tree.checksum(path)
    }

    fn recalculate(&self, path: &Path) -> Result<(), ChecksumError> {
        self.tree.recalculate(path)
    }

    fn recalculate_all(&self) -> Result<WalkReport, ChecksumError> {
        self.tree.rebuild(None, Some(&*self.stop))
    }

    fn store(&self) -> Arc<ChecksumStore> {
        Arc::clone(self.tree.store())
    }

    fn shutdown(&mut self) -> Result<(), ChecksumError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        handle
            .join()
            .map_err(|_| ChecksumError::Thread("Refresh thread panicked".to_string()))?;
        info!(root = %self.tree.root().display(), "Refresh checksum strategy stopped");
        Ok(())
    }
}

impl Drop for RefreshStrategy {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "Failed to stop refresh strategy");
        }
    }
}
