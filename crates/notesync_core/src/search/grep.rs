//! Record selection via directory listing or an external grep.
//!
//! # Responsibility
//! - Pick the records that take part in one session.
//! - Map grep's "no match" exit code to a typed, non-fatal error.
//!
//! # Invariants
//! - Returned paths always point inside the records directory.
//! - An empty selection is reported as `NoMatches`, never as `Ok(vec![])`.

use super::{SelectError, SelectResult};
use crate::config::SyncConfig;
use crate::model::record::NotePath;
use crate::repo::record_store::FsRecordStore;
use log::{error, info};
use std::process::Command;
use std::time::Instant;

/// Content search over the records directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// Grep pattern; `None` selects every record.
    pub pattern: Option<String>,
    /// Restrict the pattern to tag lines.
    pub tags_only: bool,
}

/// Selects records for one session.
///
/// # Errors
/// - `NoMatches` when the directory is empty or grep exits with status 1.
/// - `Spawn`/`SearchFailed` when grep cannot run or reports an error.
pub fn select_records(
    store: &FsRecordStore,
    config: &SyncConfig,
    query: &SelectQuery,
) -> SelectResult<Vec<NotePath>> {
    let started_at = Instant::now();
    let Some(pattern) = query.pattern.as_deref() else {
        let paths = store.list()?;
        if paths.is_empty() {
            return Err(SelectError::NoMatches { pattern: None });
        }
        info!(
            "event=select module=search status=ok mode=all matches={}",
            paths.len()
        );
        return Ok(paths);
    };

    // Make sure grep sees a directory rather than failing with status 2.
    store.list()?;

    let needle = if query.tags_only {
        format!("{}{}", config.tag_marker, pattern)
    } else {
        pattern.to_string()
    };

    let output = Command::new(&config.search_program)
        .args(["-R", "-l", "-e"])
        .arg(&needle)
        .arg(store.note_dir())
        .output()
        .map_err(|source| SelectError::Spawn {
            program: config.search_program.clone(),
            source,
        })?;

    match output.status.code() {
        Some(0) => {}
        Some(1) => {
            info!("event=select module=search status=ok mode=grep matches=0");
            return Err(SelectError::NoMatches {
                pattern: Some(pattern.to_string()),
            });
        }
        code => {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!(
                "event=select module=search status=error mode=grep code={:?} duration_ms={}",
                code,
                started_at.elapsed().as_millis()
            );
            return Err(SelectError::SearchFailed {
                program: config.search_program.clone(),
                code,
                stderr,
            });
        }
    }

    let mut paths: Vec<NotePath> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(NotePath::from)
        .collect();
    paths.sort();
    paths.dedup();

    if paths.is_empty() {
        return Err(SelectError::NoMatches {
            pattern: Some(pattern.to_string()),
        });
    }

    info!(
        "event=select module=search status=ok mode=grep matches={} duration_ms={}",
        paths.len(),
        started_at.elapsed().as_millis()
    );
    Ok(paths)
}

#[cfg(all(test, unix))]
mod tests {
    use super::{select_records, SelectQuery};
    use crate::search::SelectError;
    use crate::config::SyncConfig;
    use crate::repo::record_store::FsRecordStore;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, FsRecordStore, SyncConfig) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "apples and pears\n\n::fruit\n").unwrap();
        fs::write(dir.path().join("b.md"), "fruit salad recipe\n\n::cooking\n").unwrap();
        let config = SyncConfig {
            note_dir: dir.path().to_path_buf(),
            ..SyncConfig::default()
        };
        let store = FsRecordStore::new(dir.path(), config.tag_marker.clone());
        (dir, store, config)
    }

    #[test]
    fn no_pattern_selects_every_file() {
        let (_dir, store, config) = fixture();
        let paths = select_records(&store, &config, &SelectQuery::default()).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn pattern_matches_body_text() {
        let (_dir, store, config) = fixture();
        let query = SelectQuery {
            pattern: Some("fruit".to_string()),
            tags_only: false,
        };
        let paths = select_records(&store, &config, &query).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn tags_only_restricts_to_tag_lines() {
        let (_dir, store, config) = fixture();
        let query = SelectQuery {
            pattern: Some("fruit".to_string()),
            tags_only: true,
        };
        let paths = select_records(&store, &config, &query).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].file_name(), "a.md");
    }

    #[test]
    fn unmatched_pattern_is_no_matches() {
        let (_dir, store, config) = fixture();
        let query = SelectQuery {
            pattern: Some("zebra".to_string()),
            tags_only: false,
        };
        let err = select_records(&store, &config, &query).unwrap_err();
        assert!(err.is_no_matches());
        assert!(matches!(err, SelectError::NoMatches { pattern: Some(_) }));
    }

    #[test]
    fn empty_directory_is_no_matches() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::default();
        let store = FsRecordStore::new(dir.path().join("notes"), "::");
        let err = select_records(&store, &config, &SelectQuery::default()).unwrap_err();
        assert!(err.is_no_matches());
    }
}
