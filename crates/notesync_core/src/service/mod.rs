//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, summary, session and sync components into use-case
//!   level APIs.
//! - Keep the CLI decoupled from engine details.

pub mod sync_service;
