//! Domain records owned by the stores.
//!
//! # Responsibility
//! - Define the identity and reservation shapes persisted as durable records.
//! - Keep slot normalization in one place.
//!
//! # Invariants
//! - Identity ids are generated once and never reassigned.
//! - Slot lists are always deduplicated and sorted ascending.

pub mod calendar;
pub mod identity;
