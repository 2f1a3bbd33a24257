//! Explicit state-change notifications for store consumers.

use crate::medium::lock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by `on_change`.
pub type ListenerId = u64;

/// Callback invoked after a store's state changed.
pub type StoreListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub(crate) struct ChangeNotifier {
    next_id: AtomicU64,
    revision: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, StoreListener)>>,
}

impl ChangeNotifier {
    pub(crate) fn add(&self, listener: StoreListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.listeners).push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Bumps the revision, then calls listeners outside the registry lock.
    pub(crate) fn notify(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        let targets: Vec<StoreListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in targets {
            listener();
        }
    }
}
