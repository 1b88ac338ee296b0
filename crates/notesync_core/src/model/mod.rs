//! Domain model for plain-text note records.
//!
//! # Responsibility
//! - Define the record value type and its on-disk text format.
//!
//! # Invariants
//! - Every record is addressed by a stable `NotePath`.
//! - Records are replaced wholesale, never patched in place.

pub mod record;
