//! Record selection by modification time.
//!
//! # Responsibility
//! - Select records whose mtime falls inside a time range.
//! - Select the most recently modified records by rank.
//!
//! # Invariants
//! - A range is half-open at the start: `from < mtime <= to`.
//! - Rank 1 is the newest record; ties on mtime are ordered by path.

use super::{SelectError, SelectResult};
use crate::model::record::NotePath;
use crate::repo::record_store::FsRecordStore;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::info;

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Modification-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Exclusive lower bound.
    pub from: DateTime<Utc>,
    /// Inclusive upper bound.
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Parses both bounds with [`parse_time_bound`].
    pub fn parse(from: &str, to: &str, now: DateTime<Local>) -> SelectResult<Self> {
        Ok(Self {
            from: parse_time_bound(from, now)?,
            to: parse_time_bound(to, now)?,
        })
    }

    pub fn contains(&self, modified: DateTime<Utc>) -> bool {
        self.from < modified && modified <= self.to
    }
}

/// Window over the records ranked newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailQuery {
    /// Rank of the last record shown, counting back from the newest (1).
    pub final_index: usize,
    /// How many records end at `final_index`; `0` means all of them.
    pub count: usize,
}

impl Default for TailQuery {
    fn default() -> Self {
        Self {
            final_index: 1,
            count: 0,
        }
    }
}

/// Reads a time bound.
///
/// Accepts `now`, `@<unix seconds>`, RFC 3339, `YYYY-MM-DD` (local
/// midnight) and `YYYY-MM-DD HH:MM[:SS]` in local time.
pub fn parse_time_bound(input: &str, now: DateTime<Local>) -> SelectResult<DateTime<Utc>> {
    let trimmed = input.trim();
    let invalid = || SelectError::InvalidTime {
        input: input.to_string(),
    };

    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(now.with_timezone(&Utc));
    }
    if let Some(seconds) = trimmed.strip_prefix('@') {
        let seconds: i64 = seconds.parse().map_err(|_| invalid())?;
        return Utc.timestamp_opt(seconds, 0).single().ok_or_else(invalid);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(stamp.with_timezone(&Utc));
    }

    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(invalid)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Selects records modified inside `range`.
///
/// # Errors
/// - `NoMatches` when no record falls inside the range.
pub fn select_modified_between(
    store: &FsRecordStore,
    range: &DateRange,
) -> SelectResult<Vec<NotePath>> {
    let paths: Vec<NotePath> = store
        .list_modified()?
        .into_iter()
        .filter(|(_, modified)| range.contains(*modified))
        .map(|(path, _)| path)
        .collect();
    if paths.is_empty() {
        return Err(SelectError::NoMatches { pattern: None });
    }

    info!(
        "event=select module=search status=ok mode=date from={} to={} matches={}",
        range.from.to_rfc3339(),
        range.to.to_rfc3339(),
        paths.len()
    );
    Ok(paths)
}

/// Selects ranks `final_index - count + 1 ..= final_index` of the records
/// ordered newest first, or ranks `1 ..= final_index` when `count` is 0.
///
/// # Errors
/// - `NoMatches` when the window holds no record.
pub fn select_tail(store: &FsRecordStore, query: &TailQuery) -> SelectResult<Vec<NotePath>> {
    let ranked = store.list_modified()?;
    let end = query.final_index.min(ranked.len());
    let start = if query.count == 0 {
        0
    } else {
        query.final_index.saturating_sub(query.count)
    };
    if start >= end {
        return Err(SelectError::NoMatches { pattern: None });
    }

    let paths: Vec<NotePath> = ranked[start..end]
        .iter()
        .map(|(path, _)| path.clone())
        .collect();
    info!(
        "event=select module=search status=ok mode=tail final={} count={} matches={}",
        query.final_index,
        query.count,
        paths.len()
    );
    Ok(paths)
}
