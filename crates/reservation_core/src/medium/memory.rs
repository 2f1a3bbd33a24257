//! Process-local shared medium.
//!
//! Every handle opened from the same [`MemoryMedium`] sees the same data, the
//! way tabs of one browser profile share storage. Change events are delivered
//! synchronously to the listeners of the other handles.

use super::{
    lock, ChangeListener, ContextId, ListenerRegistry, MediumResult, StorageEvent, StorageMedium,
    SubscriptionId,
};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct SharedArea {
    items: Mutex<BTreeMap<String, String>>,
    listeners: ListenerRegistry,
}

/// One context handle over an in-memory storage area.
pub struct MemoryMedium {
    context: ContextId,
    area: Arc<SharedArea>,
}

impl MemoryMedium {
    /// Creates an empty storage area and returns its first context.
    pub fn new() -> Self {
        Self {
            context: Uuid::new_v4(),
            area: Arc::new(SharedArea::default()),
        }
    }

    /// Opens another context over the same storage area.
    pub fn open_context(&self) -> Self {
        Self {
            context: Uuid::new_v4(),
            area: Arc::clone(&self.area),
        }
    }

    /// Returns every stored key in ascending order.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.area.items).keys().cloned().collect()
    }

    fn notify(&self, key: &str) {
        let delivered = self.area.listeners.dispatch(&StorageEvent {
            key: key.to_string(),
            origin: self.context,
        });
        debug!(
            "event=medium_notify module=medium status=ok backend=memory key={} listeners={}",
            key, delivered
        );
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageMedium for MemoryMedium {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn get_item(&self, key: &str) -> MediumResult<Option<String>> {
        Ok(lock(&self.area.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> MediumResult<()> {
        let previous = lock(&self.area.items).insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.notify(key);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> MediumResult<()> {
        let removed = lock(&self.area.items).remove(key);
        if removed.is_some() {
            self.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.area.listeners.add(self.context, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.area.listeners.remove(id)
    }
}
