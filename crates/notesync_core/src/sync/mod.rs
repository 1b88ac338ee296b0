//! Write-back and conflict resolution for aggregate edit sessions.
//!
//! # Responsibility
//! - Track what the session last synchronized for every record.
//! - Write safe edits through while the editor is open.
//! - Escalate edits that collide with external writes to a manual merge.
//!
//! # Invariants
//! - A write happens only after re-reading the file and finding it equal to
//!   the session state for that path.
//! - A structural parse error aborts before any write of that batch.
//! - Conflicts are never auto-resolved by content heuristics.

use crate::model::record::{NotePath, Record};
use crate::repo::record_store::StoreError;
use crate::session::SessionError;
use crate::summary::SummaryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod diff;
mod merge;
mod propagate;

pub use merge::{ConflictMerger, MergeReport};
pub use propagate::{ChangePropagator, PropagationReport};

pub type SyncResult<T> = Result<T, SyncError>;

/// Error raised by a sync session.
#[derive(Debug)]
pub enum SyncError {
    /// Filesystem failure on a record, document or scratch file.
    Store(StoreError),
    /// The edited document lost its record structure. Fatal.
    Structure(SummaryError),
    /// The editor could not be launched or awaited.
    Session(SessionError),
    /// A parsed segment refers to a path the session does not track.
    UnknownRecord(NotePath),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Structure(err) => write!(f, "aggregate document is invalid: {err}"),
            Self::Session(err) => write!(f, "{err}"),
            Self::UnknownRecord(path) => write!(f, "record not part of this session: {path}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Structure(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::UnknownRecord(_) => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<SummaryError> for SyncError {
    fn from(value: SummaryError) -> Self {
        Self::Structure(value)
    }
}

impl From<SessionError> for SyncError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

/// Last-synchronized record per path, in aggregate-document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    records: Vec<Record>,
}

impl SessionState {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Records in document order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, path: &NotePath) -> Option<&Record> {
        self.records.iter().find(|record| &record.path == path)
    }

    /// Replaces the known state for `record.path`.
    pub fn advance(&mut self, record: Record) -> SyncResult<()> {
        let slot = self
            .records
            .iter_mut()
            .find(|known| known.path == record.path)
            .ok_or_else(|| SyncError::UnknownRecord(record.path.clone()))?;
        *slot = record;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
