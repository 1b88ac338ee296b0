//! Core engine for notesync.
//! Composes many note records into one editable document, writes edits back
//! while the editor is open, and escalates external collisions to a merge.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod session;
pub mod summary;
pub mod sync;

pub use config::{ConfigError, SyncConfig, DEFAULT_CONFIG_FILE};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{NotePath, Record, RecordEntry};
pub use repo::record_store::{prune_scratch_dir, FsRecordStore, RecordStore, StoreError, StoreResult};
pub use search::{
    parse_time_bound, select_modified_between, select_records, select_tail, DateRange, SelectError,
    SelectQuery, SelectResult, Selection, TailQuery,
};
pub use service::sync_service::{CreateOutcome, SessionEvent, SessionOutcome, SyncService};
pub use session::{EditSession, Editor, ExternalEditor, PollStatus, SessionError, SessionResult};
pub use summary::{ComposeOptions, ComposedSummary, SummaryError, SummaryParser};
pub use sync::diff::DiffOp;
pub use sync::{
    ChangePropagator, ConflictMerger, MergeReport, PropagationReport, SessionState, SyncError,
    SyncResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
