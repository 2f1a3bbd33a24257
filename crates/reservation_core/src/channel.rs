//! Durable record channel.
//!
//! # Responsibility
//! - Translate typed values to and from whole-value records on a medium.
//! - Forward external change notifications for one key.
//!
//! # Invariants
//! - Malformed or unreadable records degrade to "absent"; nothing is raised.
//! - Same-context writes never trigger `on_external_change` callbacks.
//! - The channel holds no record state of its own.

use crate::medium::{StorageEvent, StorageMedium, SubscriptionId};
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Typed access to named records on a shared medium.
#[derive(Clone)]
pub struct RecordChannel {
    medium: Arc<dyn StorageMedium>,
}

impl RecordChannel {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self { medium }
    }

    /// Returns the underlying medium handle.
    pub fn medium(&self) -> &Arc<dyn StorageMedium> {
        &self.medium
    }

    /// Reads and deserializes the record stored under `key`.
    ///
    /// Returns `None` when the key was never written, was cleared, or holds
    /// data that cannot be read back as `T`. Failures emit a diagnostic.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.medium.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(
                    "event=record_read module=channel status=error key={} error_code=medium_read_failed error={}",
                    key, err
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    "event=record_read module=channel status=error key={} error_code=record_malformed bytes={} error={}",
                    key,
                    raw.len(),
                    err
                );
                None
            }
        }
    }

    /// Serializes `value` and replaces the record under `key`.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                error!(
                    "event=record_write module=channel status=error key={} error_code=record_serialize_failed error={}",
                    key, err
                );
                return;
            }
        };

        if let Err(err) = self.medium.set_item(key, &raw) {
            error!(
                "event=record_write module=channel status=error key={} error_code=medium_write_failed error={}",
                key, err
            );
        }
    }

    /// Removes the record under `key`.
    pub fn clear(&self, key: &str) {
        if let Err(err) = self.medium.remove_item(key) {
            error!(
                "event=record_clear module=channel status=error key={} error_code=medium_write_failed error={}",
                key, err
            );
        }
    }

    /// Calls `callback` whenever another context changes `key`.
    ///
    /// The returned guard unsubscribes when dropped.
    pub fn on_external_change(
        &self,
        key: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ChannelSubscription {
        let watched = key.to_string();
        let id = self
            .medium
            .subscribe(Arc::new(move |event: &StorageEvent| {
                if event.key == watched {
                    callback();
                }
            }));
        ChannelSubscription {
            medium: Arc::clone(&self.medium),
            id,
        }
    }
}

/// Live registration created by [`RecordChannel::on_external_change`].
pub struct ChannelSubscription {
    medium: Arc<dyn StorageMedium>,
    id: SubscriptionId,
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.medium.unsubscribe(self.id);
    }
}
