//! Session store: the current authenticated identity.
//!
//! # Responsibility
//! - Run login/signup/logout/profile-update transitions.
//! - Persist the identity record after every transition.
//!
//! # Invariants
//! - At most one identity is held at a time.
//! - Validation failures leave the current identity untouched.
//! - Identity is not live-synced from other contexts unless
//!   `follow_external_changes` is enabled.

use super::notify::{ChangeNotifier, ListenerId, StoreListener};
use crate::channel::{ChannelSubscription, RecordChannel};
use crate::config::SessionStoreConfig;
use crate::medium::lock;
use crate::model::identity::{
    display_name_from_email, IdentityRecord, ProfileUpdate, ValidationError,
};
use log::{debug, info};
use std::sync::{Arc, Mutex, Weak};

struct SessionInner {
    channel: RecordChannel,
    key: String,
    current: Mutex<Option<IdentityRecord>>,
    notifier: ChangeNotifier,
}

impl SessionInner {
    /// Sets the identity and persists it. Listeners are skipped when the
    /// store was already signed out and stays signed out.
    fn replace(&self, next: Option<IdentityRecord>) {
        let previous = std::mem::replace(&mut *lock(&self.current), next.clone());
        let unchanged = previous.is_none() && next.is_none();
        match next {
            Some(record) => self.channel.write(&self.key, &record),
            None => self.channel.clear(&self.key),
        }
        if !unchanged {
            self.notifier.notify();
        }
    }

    fn sync_from_storage(&self) -> bool {
        let fresh = self.channel.read::<IdentityRecord>(&self.key);
        let changed = {
            let mut current = lock(&self.current);
            if *current == fresh {
                false
            } else {
                *current = fresh;
                true
            }
        };
        debug!(
            "event=session_sync module=store status=ok key={} changed={}",
            self.key, changed
        );
        if changed {
            self.notifier.notify();
        }
        changed
    }
}

/// Owner of the current identity for one context.
pub struct SessionStore {
    inner: Arc<SessionInner>,
    _subscription: Option<ChannelSubscription>,
}

impl SessionStore {
    /// Creates a store over the default identity key.
    pub fn new(channel: RecordChannel) -> Self {
        Self::with_config(channel, SessionStoreConfig::default())
    }

    /// Creates a store seeded from the persisted identity, if readable.
    pub fn with_config(channel: RecordChannel, config: SessionStoreConfig) -> Self {
        let current = channel.read::<IdentityRecord>(&config.key);
        info!(
            "event=session_init module=store status=ok key={} authenticated={}",
            config.key,
            current.is_some()
        );

        let inner = Arc::new(SessionInner {
            channel,
            key: config.key,
            current: Mutex::new(current),
            notifier: ChangeNotifier::default(),
        });

        let subscription = config.follow_external_changes.then(|| {
            let weak: Weak<SessionInner> = Arc::downgrade(&inner);
            inner.channel.on_external_change(&inner.key, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.sync_from_storage();
                }
            })
        });

        Self {
            inner,
            _subscription: subscription,
        }
    }

    /// Signs in with any non-empty credentials.
    ///
    /// The display name is derived from the email local part.
    ///
    /// # Errors
    /// - `ValidationError::MissingCredentials` when `email` or `password` is
    ///   empty.
    pub fn login(&self, email: &str, password: &str) -> Result<IdentityRecord, ValidationError> {
        if email.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingCredentials);
        }

        let record = IdentityRecord::new(email, display_name_from_email(email));
        self.inner.replace(Some(record.clone()));
        info!(
            "event=session_login module=store status=ok user_id={}",
            record.id
        );
        Ok(record)
    }

    /// Creates a new identity with an explicit display name.
    ///
    /// # Errors
    /// - `ValidationError::MissingSignupFields` when any argument is empty.
    pub fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<IdentityRecord, ValidationError> {
        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(ValidationError::MissingSignupFields);
        }

        let record = IdentityRecord::new(email, name);
        self.inner.replace(Some(record.clone()));
        info!(
            "event=session_signup module=store status=ok user_id={}",
            record.id
        );
        Ok(record)
    }

    /// Drops the current identity and its record. Idempotent.
    pub fn logout(&self) {
        self.inner.replace(None);
        info!("event=session_logout module=store status=ok");
    }

    /// Merges `update` into the current identity; no-op when signed out.
    pub fn update_profile(&self, update: ProfileUpdate) -> Option<IdentityRecord> {
        let updated = {
            let mut current = lock(&self.inner.current);
            let record = current.as_mut()?;
            record.apply(update);
            record.clone()
        };

        self.inner.channel.write(&self.inner.key, &updated);
        self.inner.notifier.notify();
        info!(
            "event=session_update module=store status=ok user_id={}",
            updated.id
        );
        Some(updated)
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.inner.current).is_some()
    }

    /// Returns a copy of the current identity.
    pub fn current_user(&self) -> Option<IdentityRecord> {
        lock(&self.inner.current).clone()
    }

    /// Replaces the in-memory identity with the persisted one.
    ///
    /// Returns whether the identity changed.
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
