//! Record persistence.
//!
//! # Responsibility
//! - Define the storage contract the sync engine writes through.
//! - Isolate filesystem details (timestamps, scratch retention).
//!
//! # Invariants
//! - Every write preserves the record file's prior timestamps.

pub mod record_store;
