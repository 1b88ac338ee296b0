//! Aggregate document composition and parsing.
//!
//! # Responsibility
//! - Render many records into one editable document with per-record headers.
//! - Split an edited document back into per-record segments.
//!
//! # Invariants
//! - The number of record headers equals the number of source records.
//! - Segment `i` always belongs to record `i` of the composed order.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod compose;
mod parse;

pub use compose::{compose, ComposedSummary};
pub use parse::SummaryParser;

/// Presentation switches shared by composer and parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Emit a date-group header whenever the UTC date changes.
    pub show_date: bool,
    /// Include each record's tag block in its segment.
    pub show_tags: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            show_date: true,
            show_tags: false,
        }
    }
}

pub type SummaryResult<T> = Result<T, SummaryError>;

/// Structural error in an edited aggregate document.
///
/// All variants are fatal: segment identity cannot be trusted, so nothing
/// from the document may be written through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    /// Record boundaries were added or deleted.
    SegmentCount { expected: usize, found: usize },
    /// Non-blank text appears before the first record header.
    UnattributedText,
    /// The header at `position` names a different file than expected.
    HeaderMismatch {
        position: usize,
        expected: String,
        found: String,
    },
}

impl Display for SummaryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SegmentCount { expected, found } => write!(
                f,
                "expected {expected} record segments but found {found}; record headers must not be added or removed"
            ),
            Self::UnattributedText => {
                write!(f, "text before the first record header belongs to no record")
            }
            Self::HeaderMismatch {
                position,
                expected,
                found,
            } => write!(
                f,
                "segment {position} should be `{expected}` but its header names `{found}`"
            ),
        }
    }
}

impl Error for SummaryError {}
