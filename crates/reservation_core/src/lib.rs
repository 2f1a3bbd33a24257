//! Core state synchronization for the reservation tracker.
//! This crate is the single source of truth for session and calendar
//! invariants across every context sharing one storage medium.

pub mod channel;
pub mod config;
pub mod db;
pub mod logging;
pub mod medium;
pub mod model;
pub mod store;

pub use channel::{ChannelSubscription, RecordChannel};
pub use config::{ReservationStoreConfig, SessionStoreConfig, StoreKeys};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use medium::{
    ContextId, MediumError, MediumResult, MemoryMedium, SqliteMedium, StorageEvent, StorageMedium,
};
pub use model::calendar::ReservationEntry;
pub use model::identity::{IdentityRecord, ProfileUpdate, ValidationError};
pub use store::reservation_store::ReservationStore;
pub use store::session_store::SessionStore;
pub use store::{ListenerId, StoreListener};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
