//! Session use-case service.
//!
//! # Responsibility
//! - Run one aggregate edit session end to end: load, compose, supervise the
//!   editor, propagate on every tick, merge once at the end.
//! - Provide the read-only view and record creation flows.
//!
//! # Invariants
//! - The sync loop is single-threaded; the bounded editor wait is its only
//!   suspension point.
//! - The conflict merge runs exactly once per session, after the editor exits.
//! - A structural error stops all write-back for the rest of the session.

use crate::config::SyncConfig;
use crate::model::record::{NotePath, Record, RecordEntry};
use crate::repo::record_store::{prune_scratch_dir, FsRecordStore, RecordStore, StoreError};
use crate::search::{SelectResult, Selection};
use crate::session::{Editor, ExternalEditor, PollStatus};
use crate::summary::{compose, ComposeOptions};
use crate::sync::{
    ChangePropagator, ConflictMerger, MergeReport, SessionState, SyncError, SyncResult,
};
use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Summary of one finished edit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Aggregate document the session edited.
    pub document: PathBuf,
    /// Number of poll timeouts observed while the editor was open.
    pub ticks: usize,
    /// Paths written during the session, in write order (may repeat).
    pub propagated: Vec<NotePath>,
    /// Post-session reconciliation result.
    pub merge: MergeReport,
    /// Final session state in document order.
    pub records: Vec<Record>,
}

/// Progress reported while the editor is still open.
#[derive(Debug)]
pub enum SessionEvent<'a> {
    /// A segment was written through to its record.
    Written(&'a NotePath),
    /// A segment collided with an external write; it waits for the merge.
    /// Reported once per record.
    Deferred(&'a NotePath),
    /// Write-back stopped for the rest of the session.
    Aborted(&'a SyncError),
}

/// Result of the record creation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Saved(NotePath),
    /// The editor exited without leaving any content; nothing was kept.
    NotSaved(NotePath),
}

/// Service facade over the record store and the sync engine.
pub struct SyncService {
    config: SyncConfig,
    store: FsRecordStore,
}

impl SyncService {
    pub fn new(config: SyncConfig) -> Self {
        let store = FsRecordStore::new(config.note_dir.clone(), config.tag_marker.clone());
        Self { config, store }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &FsRecordStore {
        &self.store
    }

    /// Selects participating records.
    pub fn select(&self, selection: &Selection) -> SelectResult<Vec<NotePath>> {
        selection.select(&self.store, &self.config)
    }

    /// Loads every selected record with its modification time.
    pub fn load_entries(&self, paths: &[NotePath]) -> SyncResult<Vec<RecordEntry>> {
        paths
            .iter()
            .map(|path| self.store.load_entry(path).map_err(Into::into))
            .collect()
    }

    /// Runs a full edit session with the configured editor.
    pub fn edit<F>(
        &self,
        paths: &[NotePath],
        options: ComposeOptions,
        on_event: F,
    ) -> SyncResult<SessionOutcome>
    where
        F: FnMut(SessionEvent<'_>),
    {
        let entries = self.load_entries(paths)?;
        let editor = ExternalEditor::new(self.config.editor.clone());
        self.run_session(&entries, options, &editor, &editor, on_event)
    }

    /// Supervises `editor` on a freshly composed document, propagating on
    /// each poll timeout and merging once the editor exits. `merge_editor`
    /// handles the per-record conflict edits. `on_event` hears about writes,
    /// deferrals and an abort as they happen.
    ///
    /// # Errors
    /// - `SyncError::Structure` when the document loses its record structure
    ///   (reported through `SessionEvent::Aborted` at once, returned after the
    ///   editor exits; no further writes happen).
    /// - `SyncError::Session` when the editor cannot be launched or awaited.
    pub fn run_session<E, F>(
        &self,
        entries: &[RecordEntry],
        options: ComposeOptions,
        editor: &ExternalEditor,
        merge_editor: &E,
        mut on_event: F,
    ) -> SyncResult<SessionOutcome>
    where
        E: Editor + ?Sized,
        F: FnMut(SessionEvent<'_>),
    {
        let started_at = Instant::now();
        let summary = compose(entries, options, &self.config);
        let document = self.write_summary(&summary.text)?;
        let mut state = SessionState::new(summary.records);
        info!(
            "event=session module=service status=start records={} document={}",
            state.len(),
            document.display()
        );

        let mut propagator = ChangePropagator::new(&self.store, &self.config, options);
        propagator.observe(&document)?;
        let mut session = editor.start(&document)?;

        let mut ticks = 0;
        let mut propagated = Vec::new();
        let mut announced = BTreeSet::new();
        loop {
            match session.poll(self.config.propagate_interval())? {
                PollStatus::Running => {
                    ticks += 1;
                    match propagator.propagate(&mut state, &document) {
                        Ok(report) => {
                            for path in &report.written {
                                on_event(SessionEvent::Written(path));
                            }
                            for path in report.deferred {
                                if !announced.contains(&path) {
                                    on_event(SessionEvent::Deferred(&path));
                                    announced.insert(path);
                                }
                            }
                            propagated.extend(report.written);
                        }
                        Err(err) => {
                            error!(
                                "event=session module=service status=error phase=propagate error={}",
                                err
                            );
                            on_event(SessionEvent::Aborted(&err));
                            if let Err(wait_err) = session.wait() {
                                warn!(
                                    "event=session module=service status=error phase=wait error={}",
                                    wait_err
                                );
                            }
                            return Err(err);
                        }
                    }
                }
                PollStatus::Finished(status) => {
                    if !status.success() {
                        warn!(
                            "event=editor_exit module=service status=error code={:?}",
                            status.code()
                        );
                    }
                    break;
                }
            }
        }

        let merger = ConflictMerger::new(&self.store, merge_editor, &self.config, options);
        let merge = merger.resolve(&mut state, &document)?;

        info!(
            "event=session module=service status=ok ticks={} propagated={} merged={} duration_ms={}",
            ticks,
            propagated.len(),
            merge.merged.len(),
            started_at.elapsed().as_millis()
        );
        Ok(SessionOutcome {
            document,
            ticks,
            propagated,
            merge,
            records: state.into_records(),
        })
    }

    /// Composes the selection and opens it read-only in `viewer`.
    pub fn view<E: Editor + ?Sized>(
        &self,
        paths: &[NotePath],
        options: ComposeOptions,
        viewer: &E,
    ) -> SyncResult<PathBuf> {
        let entries = self.load_entries(paths)?;
        let summary = compose(&entries, options, &self.config);
        let document = self.write_summary(&summary.text)?;
        viewer.edit_blocking(&document)?;
        Ok(document)
    }

    /// Opens `editor` on a new timestamped record path; keeps the file only
    /// when the user wrote something.
    ///
    /// Without a `name` the tags joined by `_` name the file. `tags` are
    /// stored on the new record ahead of any tags typed into the editor.
    pub fn create<E: Editor + ?Sized>(
        &self,
        name: Option<&str>,
        tags: &[String],
        now: DateTime<Local>,
        editor: &E,
    ) -> SyncResult<CreateOutcome> {
        let stem = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => tags.join("_"),
        };
        let path = self.store.create_path(&stem, now);
        let note_dir = self.store.note_dir();
        fs::create_dir_all(note_dir).map_err(|err| StoreError::io(note_dir, err))?;

        editor.edit_blocking(path.as_path())?;

        if self.store.discard_if_empty(&path)? {
            if !tags.is_empty() {
                let mut record = self.store.load(&path)?;
                let typed = std::mem::take(&mut record.tags);
                record.tags = tags.to_vec();
                for tag in typed {
                    if !record.tags.contains(&tag) {
                        record.tags.push(tag);
                    }
                }
                self.store.save(&record)?;
            }
            info!(
                "event=note_create module=service status=ok path={} tags={}",
                path,
                tags.len()
            );
            Ok(CreateOutcome::Saved(path))
        } else {
            warn!(
                "event=note_create module=service status=skipped reason=empty path={}",
                path
            );
            Ok(CreateOutcome::NotSaved(path))
        }
    }

    fn write_summary(&self, text: &str) -> SyncResult<PathBuf> {
        let dir: &Path = &self.config.summary_dir;
        prune_scratch_dir(dir, self.config.max_retained_summaries)?;
        let document = dir.join(format!("summary-{}.md", Uuid::new_v4()));
        fs::write(&document, text).map_err(|err| StoreError::io(&document, err))?;
        Ok(document)
    }
}
