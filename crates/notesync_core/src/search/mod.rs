//! Record selection.
//!
//! # Responsibility
//! - Choose which records participate in a session.
//! - Keep the external search tool behind a typed API.
//! - Offer time-based selection (date range, most recent) over file mtimes.

use crate::config::SyncConfig;
use crate::model::record::NotePath;
use crate::repo::record_store::{FsRecordStore, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub mod grep;
pub mod modified;

pub use grep::{select_records, SelectQuery};
pub use modified::{parse_time_bound, select_modified_between, select_tail, DateRange, TailQuery};

/// Every way a session's records can be chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Grep the records directory (or take everything without a pattern).
    Search(SelectQuery),
    /// Records modified inside a time range.
    Modified(DateRange),
    /// The most recently modified records.
    Tail(TailQuery),
}

impl Selection {
    pub fn select(&self, store: &FsRecordStore, config: &SyncConfig) -> SelectResult<Vec<NotePath>> {
        match self {
            Self::Search(query) => select_records(store, config, query),
            Self::Modified(range) => select_modified_between(store, range),
            Self::Tail(query) => select_tail(store, query),
        }
    }
}

impl From<SelectQuery> for Selection {
    fn from(value: SelectQuery) -> Self {
        Self::Search(value)
    }
}

pub type SelectResult<T> = Result<T, SelectError>;

/// Selection failure.
#[derive(Debug)]
pub enum SelectError {
    /// Nothing matched. Not fatal: the session simply does not start.
    NoMatches { pattern: Option<String> },
    /// The search program could not be run.
    Spawn { program: String, source: io::Error },
    /// The search program exited with an unexpected status.
    SearchFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    /// A date-range bound could not be understood.
    InvalidTime { input: String },
    Store(StoreError),
}

impl Display for SelectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatches { pattern: Some(pattern) } => {
                write!(f, "no matching notes found for `{pattern}`")
            }
            Self::NoMatches { pattern: None } => write!(f, "no notes found"),
            Self::Spawn { program, source } => {
                write!(f, "failed to run search program `{program}`: {source}")
            }
            Self::SearchFailed {
                program,
                code,
                stderr,
            } => write!(
                f,
                "search program `{program}` failed with status {code:?}: {}",
                stderr.trim()
            ),
            Self::InvalidTime { input } => write!(
                f,
                "cannot read `{input}` as a time (try `now`, `@<seconds>`, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM[:SS]`)"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SelectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            Self::NoMatches { .. } | Self::SearchFailed { .. } | Self::InvalidTime { .. } => None,
        }
    }
}

impl From<StoreError> for SelectError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl SelectError {
    /// Returns whether this error only means "nothing to do".
    pub fn is_no_matches(&self) -> bool {
        matches!(self, Self::NoMatches { .. })
    }
}
