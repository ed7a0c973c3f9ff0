//! Listener registry for change, delete and initialization notifications

use crate::tree::walker::WalkReport;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback receiving the normalized path affected by an event
pub type PathListener = Arc<dyn Fn(&Path) + Send + Sync>;

/// Callback invoked once the initial walk has completed
pub type InitializedListener = Arc<dyn Fn(&WalkReport) + Send + Sync>;

/// Opaque handle returned on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Subscriptions owned by a watching strategy
///
/// Listeners run synchronously on the notifying thread in registration order.
/// They are snapshotted before invocation, so a listener may register or
/// deregister listeners without deadlocking.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    change: RwLock<BTreeMap<ListenerId, PathListener>>,
    delete: RwLock<BTreeMap<ListenerId, PathListener>>,
    initialized: RwLock<BTreeMap<ListenerId, InitializedListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.change.write().insert(id, Arc::new(listener));
        id
    }

    pub fn register_delete_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.delete.write().insert(id, Arc::new(listener));
        id
    }

    pub fn register_initialized_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&WalkReport) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.initialized.write().insert(id, Arc::new(listener));
        id
    }

    /// Returns false if the id was not registered
    pub fn deregister_change_listener(&self, id: ListenerId) -> bool {
        self.change.write().remove(&id).is_some()
    }

    pub fn deregister_delete_listener(&self, id: ListenerId) -> bool {
        self.delete.write().remove(&id).is_some()
    }

    pub fn deregister_initialized_listener(&self, id: ListenerId) -> bool {
        self.initialized.write().remove(&id).is_some()
    }

    pub fn clear_change_listeners(&self) {
        self.change.write().clear();
    }

    pub fn clear_delete_listeners(&self) {
        self.delete.write().clear();
    }

    pub fn clear_all(&self) {
        self.change.write().clear();
        self.delete.write().clear();
        self.initialized.write().clear();
    }

    pub fn change_listener_count(&self) -> usize {
        self.change.read().len()
    }

    pub fn delete_listener_count(&self) -> usize {
        self.delete.read().len()
    }

    pub fn notify_change(&self, path: &Path) {
        let listeners: Vec<PathListener> = self.change.read().values().cloned().collect();
        for listener in listeners {
            listener(path);
        }
    }

    pub fn notify_delete(&self, path: &Path) {
        let listeners: Vec<PathListener> = self.delete.read().values().cloned().collect();
        for listener in listeners {
            listener(path);
        }
    }

    pub fn notify_initialized(&self, report: &WalkReport) {
        let listeners: Vec<InitializedListener> =
            self.initialized.read().values().cloned().collect();
        for listener in listeners {
            listener(report);
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("change", &self.change.read().len())
            .field("delete", &self.delete.read().len())
            .field("initialized", &self.initialized.read().len())
            .finish()
    }
}
