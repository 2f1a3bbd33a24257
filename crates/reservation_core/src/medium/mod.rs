//! Persistence medium shared by every execution context.
//!
//! # Responsibility
//! - Define the string-keyed, whole-value storage contract used by the
//!   record channel.
//! - Deliver change events for writes made by *other* contexts.
//!
//! # Invariants
//! - `set_item`/`remove_item` replace the whole value for a key.
//! - A listener never observes writes made through its own context.
//! - Listeners are invoked after internal locks are released.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

mod memory;
mod sqlite;

pub use memory::MemoryMedium;
pub use sqlite::SqliteMedium;

/// Identity of one execution context (one "tab").
pub type ContextId = Uuid;

/// Handle returned by [`StorageMedium::subscribe`].
pub type SubscriptionId = u64;

/// Callback invoked for external changes.
pub type ChangeListener = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

pub type MediumResult<T> = Result<T, MediumError>;

/// Notification that a key changed through another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key whose value was replaced or removed.
    pub key: String,
    /// Context that performed the write.
    pub origin: ContextId,
}

#[derive(Debug)]
pub enum MediumError {
    Db(DbError),
    InvalidData(String),
}

impl Display for MediumError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored record data: {message}"),
        }
    }
}

impl Error for MediumError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for MediumError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for MediumError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Synchronous key-value medium scoped to one context.
///
/// Several handles may point at the same underlying data; each handle is one
/// context and carries its own [`ContextId`].
pub trait StorageMedium: Send + Sync {
    fn context_id(&self) -> ContextId;
    fn get_item(&self, key: &str) -> MediumResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> MediumResult<()>;
    fn remove_item(&self, key: &str) -> MediumResult<()>;
    /// Registers a listener for changes made by other contexts.
    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId;
    /// Returns `false` when the id was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

struct ListenerEntry {
    id: SubscriptionId,
    context: ContextId,
    listener: ChangeListener,
}

/// Listener table keyed by owning context.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<ListenerEntry>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, context: ContextId, listener: ChangeListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.entries).push(ListenerEntry {
            id,
            context,
            listener,
        });
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Invokes every listener not owned by the event origin.
    pub(crate) fn dispatch(&self, event: &StorageEvent) -> usize {
        let targets: Vec<ChangeListener> = lock(&self.entries)
            .iter()
            .filter(|entry| entry.context != event.origin)
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
