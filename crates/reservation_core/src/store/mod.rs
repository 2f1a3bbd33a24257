//! In-memory stores kept consistent with durable records.
//!
//! # Responsibility
//! - Own the current identity and the reservation calendar for one context.
//! - Persist every mutation as a whole-value record through the channel.
//! - Reconcile with writes made by other contexts.
//!
//! # Invariants
//! - Store locks are never held while writing to the medium or while calling
//!   listeners, so cross-context notification cannot deadlock.
//! - Persistence failures are logged, never returned to callers.

mod notify;
pub mod reservation_store;
pub mod session_store;

pub use notify::{ListenerId, StoreListener};
