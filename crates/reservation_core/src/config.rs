//! Store configuration.
//!
//! Defaults match the record keys used by existing installations, so a store
//! built with `Default` reads data written by any earlier context.

/// Record key holding the current identity.
pub const DEFAULT_IDENTITY_KEY: &str = "reservation-app-user";
/// Record key holding the reservation calendar.
pub const DEFAULT_RESERVATIONS_KEY: &str = "reservation-app-reservations";

/// Fixed record keys for both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub identity: String,
    pub reservations: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY_KEY.to_string(),
            reservations: DEFAULT_RESERVATIONS_KEY.to_string(),
        }
    }
}

impl StoreKeys {
    pub fn session_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            key: self.identity.clone(),
            ..SessionStoreConfig::default()
        }
    }

    pub fn reservation_config(&self) -> ReservationStoreConfig {
        ReservationStoreConfig {
            key: self.reservations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStoreConfig {
    pub key: String,
    /// Reload the identity whenever another context rewrites it.
    ///
    /// Off by default: each context keeps the identity it started with.
    pub follow_external_changes: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_IDENTITY_KEY.to_string(),
            follow_external_changes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationStoreConfig {
    pub key: String,
}

impl Default for ReservationStoreConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_RESERVATIONS_KEY.to_string(),
        }
    }
}
