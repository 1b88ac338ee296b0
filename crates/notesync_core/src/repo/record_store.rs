//! Record store contracts and filesystem implementation.
//!
//! # Responsibility
//! - Load and save records by path in the plain-text record format.
//! - Keep filesystem timestamps stable across write-through.
//! - Create timestamped record paths and prune scratch directories.
//!
//! # Invariants
//! - `save` restores the access/modification times the file had before the
//!   write, so ordering and date grouping survive round-trip edits.
//! - Freshness is never inferred from metadata; callers compare content.

use crate::model::record::{NotePath, Record, RecordEntry};
use chrono::{DateTime, Local, Utc};
use filetime::FileTime;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub type StoreResult<T> = Result<T, StoreError>;

/// Filesystem error with the offending path attached.
#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns whether the underlying failure was a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "`{}`: {source}", path.display()),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Storage interface used by the sync engine.
pub trait RecordStore {
    /// Reads one record.
    fn load(&self, path: &NotePath) -> StoreResult<Record>;
    /// Reads one record plus its modification time.
    fn load_entry(&self, path: &NotePath) -> StoreResult<RecordEntry>;
    /// Writes one record, preserving the file's previous timestamps.
    fn save(&self, record: &Record) -> StoreResult<()>;

    /// Reads the current on-disk state, mapping a vanished file to `None`.
    fn load_current(&self, path: &NotePath) -> StoreResult<Option<Record>> {
        match self.load(path) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Record store over a directory of plain-text files.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    note_dir: PathBuf,
    tag_marker: String,
}

impl FsRecordStore {
    pub fn new(note_dir: impl Into<PathBuf>, tag_marker: impl Into<String>) -> Self {
        Self {
            note_dir: note_dir.into(),
            tag_marker: tag_marker.into(),
        }
    }

    pub fn note_dir(&self) -> &Path {
        &self.note_dir
    }

    pub fn tag_marker(&self) -> &str {
        &self.tag_marker
    }

    /// Lists every regular file in the records directory, creating it first
    /// when missing.
    pub fn list(&self) -> StoreResult<Vec<NotePath>> {
        fs::create_dir_all(&self.note_dir).map_err(|err| StoreError::io(&self.note_dir, err))?;
        let mut paths = Vec::new();
        let entries =
            fs::read_dir(&self.note_dir).map_err(|err| StoreError::io(&self.note_dir, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(&self.note_dir, err))?;
            let file_type = entry
                .file_type()
                .map_err(|err| StoreError::io(entry.path(), err))?;
            if file_type.is_file() {
                paths.push(NotePath::new(entry.path()));
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Lists every record with its modification time, newest first.
    ///
    /// Ties are ordered by path so repeated listings agree.
    pub fn list_modified(&self) -> StoreResult<Vec<(NotePath, DateTime<Utc>)>> {
        let mut listed = self
            .list()?
            .into_iter()
            .map(|path| {
                let modified = modified_at(&path)?;
                Ok((path, modified))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        listed.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        Ok(listed)
    }

    /// Builds `<name>_<YYYY>_<MM>_<DD>_<HH>_<MM>_<SS>.md` inside the records
    /// directory. Nothing is written.
    pub fn create_path(&self, name: &str, now: DateTime<Local>) -> NotePath {
        let stem = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        let stamp = now.format("%Y_%m_%d_%H_%M_%S");
        let file_name = if stem.is_empty() {
            format!("{stamp}.md")
        } else {
            format!("{stem}_{stamp}.md")
        };
        NotePath::new(self.note_dir.join(file_name))
    }

    /// Removes `path` when it exists but holds only whitespace.
    ///
    /// Returns `true` when a non-empty file is present afterwards.
    pub fn discard_if_empty(&self, path: &NotePath) -> StoreResult<bool> {
        match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => {
                fs::remove_file(path).map_err(|err| StoreError::io(path.as_path(), err))?;
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io(path.as_path(), err)),
        }
    }
}

impl RecordStore for FsRecordStore {
    fn load(&self, path: &NotePath) -> StoreResult<Record> {
        let contents =
            fs::read_to_string(path).map_err(|err| StoreError::io(path.as_path(), err))?;
        Ok(Record::parse(path.clone(), &contents, &self.tag_marker))
    }

    fn load_entry(&self, path: &NotePath) -> StoreResult<RecordEntry> {
        Ok(RecordEntry {
            modified: modified_at(path)?,
            record: self.load(path)?,
        })
    }

    fn save(&self, record: &Record) -> StoreResult<()> {
        let path = record.path.as_path();
        let previous_times = match fs::metadata(path) {
            Ok(metadata) => Some((
                FileTime::from_last_access_time(&metadata),
                FileTime::from_last_modification_time(&metadata),
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(StoreError::io(path, err)),
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
        fs::write(path, record.serialize(&self.tag_marker))
            .map_err(|err| StoreError::io(path, err))?;

        if let Some((atime, mtime)) = previous_times {
            filetime::set_file_times(path, atime, mtime)
                .map_err(|err| StoreError::io(path, err))?;
        }

        debug!(
            "event=record_save module=store status=ok path={} tags={} times_restored={}",
            record.path,
            record.tags.len(),
            previous_times.is_some()
        );
        Ok(())
    }
}

fn modified_at(path: &NotePath) -> StoreResult<DateTime<Utc>> {
    let metadata = fs::metadata(path).map_err(|err| StoreError::io(path.as_path(), err))?;
    let modified = metadata
        .modified()
        .map_err(|err| StoreError::io(path.as_path(), err))?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Deletes the oldest regular files in `dir` so that one more file can be
/// added without exceeding `cap`. Creates `dir` when missing.
///
/// Returns how many files were removed.
pub fn prune_scratch_dir(dir: &Path, cap: usize) -> StoreResult<usize> {
    fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;

    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| StoreError::io(dir, err))? {
        let entry = entry.map_err(|err| StoreError::io(dir, err))?;
        let metadata = entry
            .metadata()
            .map_err(|err| StoreError::io(entry.path(), err))?;
        if metadata.is_file() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, entry.path()));
        }
    }

    let keep = cap.saturating_sub(1);
    if files.len() <= keep {
        return Ok(0);
    }

    files.sort();
    let overflow = files.len() - keep;
    let mut removed = 0;
    for (_, path) in files.into_iter().take(overflow) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => warn!(
                "event=scratch_prune module=store status=error path={} error={}",
                path.display(),
                err
            ),
        }
    }

    info!(
        "event=scratch_prune module=store status=ok dir={} removed={}",
        dir.display(),
        removed
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::{prune_scratch_dir, FsRecordStore, RecordStore};
    use crate::model::record::{NotePath, Record};
    use chrono::{Local, TimeZone};
    use filetime::FileTime;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path(), "::");
        let record = Record::new(dir.path().join("nested/deep/a.md"), "body", vec![]);

        store.save(&record).unwrap();
        assert_eq!(store.load(&record.path).unwrap(), record);
    }

    #[test]
    fn save_restores_previous_modification_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "old\n").unwrap();
        let pinned = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_times(&path, pinned, pinned).unwrap();

        let store = FsRecordStore::new(dir.path(), "::");
        store
            .save(&Record::new(path.clone(), "new", vec!["t".to_string()]))
            .unwrap();

        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), pinned);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n\n::t\n");
    }

    #[test]
    fn load_current_maps_missing_file_to_none() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path(), "::");
        let missing = NotePath::new(dir.path().join("gone.md"));
        assert_eq!(store.load_current(&missing).unwrap(), None);
        assert!(store.load(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn list_returns_only_regular_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let store = FsRecordStore::new(dir.path(), "::");
        let names: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(NotePath::file_name)
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }

    #[test]
    fn list_modified_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        for (name, secs) in [("old.md", 1_600_000_000), ("new.md", 1_700_000_000), ("mid.md", 1_650_000_000)] {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            filetime::set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
        }

        let store = FsRecordStore::new(dir.path(), "::");
        let listed = store.list_modified().unwrap();
        let names: Vec<String> = listed.iter().map(|(path, _)| path.file_name()).collect();
        assert_eq!(names, vec!["new.md", "mid.md", "old.md"]);
        assert_eq!(listed[0].1.timestamp(), 1_700_000_000);
    }

    #[test]
    fn create_path_embeds_name_and_timestamp() {
        let store = FsRecordStore::new("/notes", "::");
        let now = Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let path = store.create_path("grocery list", now);
        assert_eq!(path.file_name(), "grocery_list_2024_03_05_07_08_09.md");
    }

    #[test]
    fn discard_if_empty_removes_blank_files() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path(), "::");
        let blank = NotePath::new(dir.path().join("blank.md"));
        fs::write(&blank, "  \n").unwrap();

        assert!(!store.discard_if_empty(&blank).unwrap());
        assert!(!blank.as_path().exists());
    }

    #[test]
    fn prune_keeps_room_for_one_new_file() {
        let dir = TempDir::new().unwrap();
        for idx in 0..5 {
            let path = dir.path().join(format!("s{idx}.md"));
            fs::write(&path, "x").unwrap();
            let time = FileTime::from_unix_time(1_600_000_000 + idx, 0);
            filetime::set_file_mtime(&path, time).unwrap();
        }

        let removed = prune_scratch_dir(dir.path(), 3).unwrap();
        assert_eq!(removed, 3);
        assert!(!dir.path().join("s0.md").exists());
        assert!(dir.path().join("s3.md").exists());
        assert!(dir.path().join("s4.md").exists());
    }
}
