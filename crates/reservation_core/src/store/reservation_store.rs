//! Reservation store: reserved slots per calendar date.
//!
//! # Responsibility
//! - Apply slot mutations and persist the whole calendar after each one.
//! - Reconcile with the persisted calendar when another context writes it.
//!
//! # Invariants
//! - No date-key maps to an empty slot set.
//! - Slot sets are deduplicated and sorted; dates enumerate ascending.
//! - Reconciliation is a full replace: the in-memory calendar becomes equal
//!   to the last persisted one (last writer wins).

use super::notify::{ChangeNotifier, ListenerId, StoreListener};
use crate::channel::{ChannelSubscription, RecordChannel};
use crate::config::ReservationStoreConfig;
use crate::medium::lock;
use crate::model::calendar::{
    calendar_from_entries, entries_from_calendar, normalize_slots, Calendar, ReservationEntry,
};
use log::{debug, info};
use std::sync::{Arc, Mutex, Weak};

struct ReservationInner {
    channel: RecordChannel,
    key: String,
    calendar: Mutex<Calendar>,
    notifier: ChangeNotifier,
}

impl ReservationInner {
    fn load(&self) -> Calendar {
        load_calendar(&self.channel, &self.key)
    }

    /// Runs `op` on the calendar and persists the result when it reports a
    /// mutation.
    fn mutate(&self, op: &'static str, date: &str, op_fn: impl FnOnce(&mut Calendar) -> bool) {
        let snapshot = {
            let mut calendar = lock(&self.calendar);
            if !op_fn(&mut calendar) {
                debug!(
                    "event=reservation_{} module=store status=skipped date={}",
                    op, date
                );
                return;
            }
            entries_from_calendar(&calendar)
        };

        self.channel.write(&self.key, &snapshot);
        self.notifier.notify();
        debug!(
            "event=reservation_{} module=store status=ok date={} dates={}",
            op,
            date,
            snapshot.len()
        );
    }

    fn sync_from_storage(&self) -> bool {
        let fresh = self.load();
        let changed = {
            let mut calendar = lock(&self.calendar);
            if *calendar == fresh {
                false
            } else {
                *calendar = fresh;
                true
            }
        };
        info!(
            "event=reservation_sync module=store status=ok key={} changed={}",
            self.key, changed
        );
        if changed {
            self.notifier.notify();
        }
        changed
    }
}

/// Owner of the reservation calendar for one context.
pub struct ReservationStore {
    inner: Arc<ReservationInner>,
    _subscription: ChannelSubscription,
}

impl ReservationStore {
    /// Creates a store over the default reservations key.
    pub fn new(channel: RecordChannel) -> Self {
        Self::with_config(channel, ReservationStoreConfig::default())
    }

    /// Creates a store seeded from the persisted calendar and subscribes to
    /// external changes of its key.
    pub fn with_config(channel: RecordChannel, config: ReservationStoreConfig) -> Self {
        let calendar = load_calendar(&channel, &config.key);
        info!(
            "event=reservation_init module=store status=ok key={} dates={}",
            config.key,
            calendar.len()
        );

        let inner = Arc::new(ReservationInner {
            channel,
            key: config.key,
            calendar: Mutex::new(calendar),
            notifier: ChangeNotifier::default(),
        });

        let weak: Weak<ReservationInner> = Arc::downgrade(&inner);
        let subscription = inner.channel.on_external_change(&inner.key, move || {
            if let Some(inner) = weak.upgrade() {
                inner.sync_from_storage();
            }
        });

        Self {
            inner,
            _subscription: subscription,
        }
    }

    /// Replaces the slots of `date` with the sorted, deduplicated `slots`.
    ///
    /// Ignored when `date` is empty. An empty `slots` removes the date.
    pub fn set_slots<I, S>(&self, date: &str, slots: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = normalize_slots(slots);
        self.inner.mutate("set", date, |calendar| {
            if date.is_empty() {
                return false;
            }
            if slots.is_empty() {
                calendar.remove(date);
            } else {
                calendar.insert(date.to_string(), slots);
            }
            true
        });
    }

    /// Adds `slots` to whatever is already reserved on `date`.
    pub fn add_slots<I, S>(&self, date: &str, slots: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged = lock(&self.inner.calendar)
            .get(date)
            .cloned()
            .unwrap_or_default();
        merged.extend(slots.into_iter().map(Into::into));
        self.set_slots(date, merged);
    }

    /// Removes one slot; a date left without slots is removed entirely.
    ///
    /// No-op when `date` has no reservations.
    pub fn remove_slot(&self, date: &str, slot: &str) {
        self.inner.mutate("remove", date, |calendar| {
            let Some(slots) = calendar.get_mut(date) else {
                return false;
            };
            slots.remove(slot);
            if slots.is_empty() {
                calendar.remove(date);
            }
            true
        });
    }

    /// Returns every reserved date in ascending order.
    pub fn list(&self) -> Vec<ReservationEntry> {
        entries_from_calendar(&lock(&self.inner.calendar))
    }

    /// Returns the sorted slots of `date`, empty when none are reserved.
    pub fn get_for_date(&self, date: &str) -> Vec<String> {
        lock(&self.inner.calendar)
            .get(date)
            .map(|slots| slots.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes the in-memory calendar equal to the persisted one.
    ///
    /// Runs automatically when another context changes the record. Returns
    /// whether anything changed.
    pub fn sync_from_storage(&self) -> bool {
        self.inner.sync_from_storage()
    }

    pub fn on_change(&self, listener: StoreListener) -> ListenerId {
        self.inner.notifier.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.notifier.remove(id)
    }

    /// Number of state changes observed so far.
    pub fn revision(&self) -> u64 {
        self.inner.notifier.revision()
    }
}

fn load_calendar(channel: &RecordChannel, key: &str) -> Calendar {
    channel
        .read::<Vec<ReservationEntry>>(key)
        .map(calendar_from_entries)
        .unwrap_or_default()
}
