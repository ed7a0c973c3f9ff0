//! File watcher strategy
//!
//! Keeps the checksum store current from filesystem notifications. Every directory
//! under the root is registered non-recursively with a `notify` watcher; a single
//! background thread applies events in delivery order, recomputes the affected
//! entry and its ancestors up to the root, and then tells listeners.

use crate::config::ChecksumConfig;
use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::strategy::listeners::ListenerRegistry;
use crate::strategy::shared::ChecksumTree;
use crate::strategy::{ChecksumStrategy, StrategyKind};
use crate::tree::path::{is_within_root, normalize_path};
use crate::tree::walker::{DirectoryWatch, WalkReport};
use crate::types::Digest;
use notify::event::{Flag, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a [`FileWatcherStrategy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatchState::Stopped => "stopped",
            WatchState::Starting => "starting",
            WatchState::Running => "running",
            WatchState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Filesystem change relevant to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// Created or modified; recompute it
    Changed(PathBuf),
    /// Removed or renamed away; drop it and everything stored beneath it
    Deleted(PathBuf),
    /// The backend lost events; re-walk the whole root
    Rescan,
}

/// Messages consumed by the watcher thread
enum WatchMessage {
    Event(notify::Result<Event>),
    Rescan(mpsc::Sender<Result<WalkReport, ChecksumError>>),
    Shutdown,
}

/// Translate a notify event into store changes
///
/// Access and metadata-only events carry no content change and are dropped.
/// An event flagged for rescan means the backend overflowed, so individual
/// paths can no longer be trusted.
pub fn classify_event(event: &Event) -> Vec<FsChange> {
    fn changed(paths: &[PathBuf]) -> Vec<FsChange> {
        paths.iter().cloned().map(FsChange::Changed).collect()
    }
    fn deleted(paths: &[PathBuf]) -> Vec<FsChange> {
        paths.iter().cloned().map(FsChange::Deleted).collect()
    }

    if matches!(event.flag(), Some(Flag::Rescan)) {
        return vec![FsChange::Rescan];
    }

    match &event.kind {
        EventKind::Create(_) => changed(&event.paths),
        EventKind::Remove(_) => deleted(&event.paths),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => deleted(&event.paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => changed(&event.paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => vec![
            FsChange::Deleted(event.paths[0].clone()),
            FsChange::Changed(event.paths[1].clone()),
        ],
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if p.symlink_metadata().is_ok() {
                    FsChange::Changed(p.clone())
                } else {
                    FsChange::Deleted(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => changed(&event.paths),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// `notify` watcher registering directories one level at a time
struct NotifyWatch {
    watcher: RecommendedWatcher,
}

impl DirectoryWatch for NotifyWatch {
    fn watch_directory(&mut self, dir: &Path) -> Result<(), ChecksumError> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                ChecksumError::WatchService(format!("Failed to watch {}: {}", dir.display(), e))
            })?;
        trace!(path = %dir.display(), "Watching directory");
        Ok(())
    }
}

/// Incrementally maintained checksums driven by filesystem events
///
/// Create with [`FileWatcherStrategy::new`], register listeners, then
/// [`start`](FileWatcherStrategy::start). Listeners run on the watcher thread; a
/// slow listener delays every event after it.
pub struct FileWatcherStrategy {
    tree: Arc<ChecksumTree>,
    listeners: Arc<ListenerRegistry>,
    state: WatchState,
    stop: Arc<AtomicBool>,
    sender: Option<mpsc::Sender<WatchMessage>>,
    handle: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
    poll_timeout: Duration,
    thread_name: String,
}

impl FileWatcherStrategy {
    /// Validate the root; nothing is walked or watched until [`start`](Self::start)
    pub fn new(config: &ChecksumConfig) -> Result<Self, ChecksumError> {
        Ok(Self {
            tree: Arc::new(ChecksumTree::open(&config.root, config.algorithm)?),
            listeners: Arc::new(ListenerRegistry::new()),
            state: WatchState::Stopped,
            stop: Arc::new(AtomicBool::new(false)),
            sender: None,
            handle: None,
            thread_id: None,
            poll_timeout: config.poll_timeout(),
            thread_name: config.thread_name.clone(),
        })
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn listener_registry(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Acquire the watcher, walk and register the tree, and start the event thread
    ///
    /// Failure leaves the strategy stopped; it never runs degraded.
    pub fn start(&mut self) -> Result<(), ChecksumError> {
        if self.state != WatchState::Stopped {
            return Err(ChecksumError::Thread(format!(
                "Cannot start file watcher while {}",
                self.state
            )));
        }
        self.state = WatchState::Starting;
        self.stop.store(false, Ordering::SeqCst);

        match self.launch() {
            Ok(report) => {
                self.state = WatchState::Running;
                info!(
                    root = %self.tree.root().display(),
                    files = report.files,
                    directories = report.directories,
                    "File watcher checksum strategy started"
                );
                self.listeners.notify_initialized(&report);
                Ok(())
            }
            Err(e) => {
                self.state = WatchState::Stopped;
                error!(error = %e, "File watcher failed to start");
                Err(e)
            }
        }
    }

    fn launch(&mut self) -> Result<WalkReport, ChecksumError> {
        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if event_tx.send(WatchMessage::Event(res)).is_err() {
                trace!("Dropping watch event after shutdown");
            }
        })
        .map_err(|e| ChecksumError::WatchService(format!("Failed to create watcher: {}", e)))?;

        let mut watch = NotifyWatch { watcher };
        self.tree.store().clear();
        let report = self
            .tree
            .walk(Some(&mut watch as &mut dyn DirectoryWatch), Some(&*self.stop))?;

        let event_loop = EventLoop {
            tree: Arc::clone(&self.tree),
            listeners: Arc::clone(&self.listeners),
            stop: Arc::clone(&self.stop),
            watch,
            rx,
            poll_timeout: self.poll_timeout,
        };
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || event_loop.run())
            .map_err(|e| ChecksumError::Thread(format!("Failed to spawn watcher thread: {}", e)))?;

        self.sender = Some(tx);
        self.thread_id = Some(handle.thread().id());
        self.handle = Some(handle);
        Ok(report)
    }
}

impl ChecksumStrategy for FileWatcherStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FileWatcher
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

    /// Re-walk on the watcher thread so the rebuild is ordered with pending events
    ///
    /// Called from a listener (already on the watcher thread) the rebuild runs
    /// inline; queueing it would wait on the thread that is waiting on us.
    fn recalculate_all(&self) -> Result<WalkReport, ChecksumError> {
        if self.thread_id == Some(thread::current().id()) {
            return self.tree.rebuild(None, Some(&*self.stop));
        }
        let sender = match (&self.sender, self.state) {
            (Some(sender), WatchState::Running) => sender,
            _ => return self.tree.rebuild(None, None),
        };
        let (reply_tx, reply_rx) = mpsc::channel();
        sender
            .send(WatchMessage::Rescan(reply_tx))
            .map_err(|_| ChecksumError::Thread("Watcher thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| ChecksumError::Thread("Watcher thread exited during rescan".to_string()))?
    }

    fn store(&self) -> Arc<ChecksumStore> {
        Arc::clone(self.tree.store())
    }

    fn listeners(&self) -> Option<Arc<ListenerRegistry>> {
        Some(Arc::clone(&self.listeners))
    }

    fn shutdown(&mut self) -> Result<(), ChecksumError> {
        if self.state != WatchState::Running {
            return Ok(());
        }
        self.state = WatchState::Stopping;
        self.stop.store(true, Ordering::SeqCst);
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(WatchMessage::Shutdown);
        }
        let joined = match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ChecksumError::Thread("Watcher thread panicked".to_string())),
            None => Ok(()),
        };
        self.thread_id = None;
        self.listeners.clear_all();
        self.state = WatchState::Stopped;
        info!(root = %self.tree.root().display(), "File watcher checksum strategy stopped");
        joined
    }
}

impl Drop for FileWatcherStrategy {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "Failed to stop file watcher");
        }
    }
}

impl fmt::Debug for FileWatcherStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcherStrategy")
            .field("root", &self.tree.root())
            .field("state", &self.state)
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// State owned by the watcher thread
struct EventLoop {
    tree: Arc<ChecksumTree>,
    listeners: Arc<ListenerRegistry>,
    stop: Arc<AtomicBool>,
    watch: NotifyWatch,
    rx: mpsc::Receiver<WatchMessage>,
    poll_timeout: Duration,
}

impl EventLoop {
    fn run(mut self) {
        debug!("Watcher thread started");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            match self.rx.recv_timeout(self.poll_timeout) {
                Ok(WatchMessage::Event(Ok(event))) => {
                    for change in classify_event(&event) {
                        if let Err(e) = self.apply(&change) {
                            warn!(change = ?change, error = %e, "Failed to apply filesystem change");
                        }
                    }
                }
                Ok(WatchMessage::Event(Err(e))) => {
                    warn!(error = %e, "Watch error");
                }
                Ok(WatchMessage::Rescan(reply)) => {
                    let result = self.tree.rebuild(
                        Some(&mut self.watch as &mut dyn DirectoryWatch),
                        Some(&*self.stop),
                    );
                    let _ = reply.send(result);
                }
                Ok(WatchMessage::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Watcher channel disconnected");
                    break;
                }
            }
        }
        debug!("Watcher thread exited");
    }

    fn apply(&mut self, change: &FsChange) -> Result<(), ChecksumError> {
        match change {
            FsChange::Changed(path) => self.apply_change(path),
            FsChange::Deleted(path) => self.apply_delete(path),
            FsChange::Rescan => {
                let report = self.tree.rebuild(
                    Some(&mut self.watch as &mut dyn DirectoryWatch),
                    Some(&*self.stop),
                )?;
                info!(
                    files = report.files,
                    directories = report.directories,
                    "Rescanned after lost watch events"
                );
                Ok(())
            }
        }
    }

    fn apply_change(&mut self, path: &Path) -> Result<(), ChecksumError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // A later remove event accounts for it.
                trace!(path = %path.display(), "Changed path vanished before processing");
                return Ok(());
            }
            Err(source) => {
                return Err(ChecksumError::Checksum {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let Some(key) = self.key_for(path)? else {
            return Ok(());
        };

        let store = self.tree.store();
        if metadata.is_dir() {
            if store.contains(&key) {
                let digest = self.tree.digests().directory_digest(&key, store);
                store.put(key.clone(), digest);
            } else {
                let report = self.tree.walk_subtree(
                    &key,
                    Some(&mut self.watch as &mut dyn DirectoryWatch),
                    Some(&*self.stop),
                )?;
                debug!(
                    path = %key.display(),
                    files = report.files,
                    directories = report.directories,
                    "Registered new directory"
                );
            }
        } else if metadata.is_file() {
            let digest = self.tree.digests().file_digest(path)?;
            debug!(path = %key.display(), digest = %digest, "File changed");
            store.put(key.clone(), digest);
        } else {
            return Ok(());
        }

        self.tree.update_ancestors(&key);
        self.listeners.notify_change(&key);
        Ok(())
    }

    fn apply_delete(&mut self, path: &Path) -> Result<(), ChecksumError> {
        let Some(key) = self.key_for(path)? else {
            return Ok(());
        };
        // A rename away sends no events for the entries beneath it.
        let removed = self.tree.store().remove_subtree(&key);
        debug!(path = %key.display(), removed, "Path deleted");
        if key.as_path() != self.tree.root() {
            self.tree.update_ancestors(&key);
        }
        self.listeners.notify_delete(&key);
        Ok(())
    }

    /// Store key for an event path, or `None` for paths outside the root
    fn key_for(&self, path: &Path) -> Result<Option<PathBuf>, ChecksumError> {
        let key = normalize_path(path)?;
        if is_within_root(&key, self.tree.root()) {
            Ok(Some(key))
        } else {
            trace!(path = %key.display(), "Ignoring event outside root");
            Ok(None)
        }
    }
}
