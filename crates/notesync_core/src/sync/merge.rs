use super::diff::{diff_lines, render_conflict, union_tags};
use super::{SessionState, SyncError, SyncResult};
use crate::config::SyncConfig;
use crate::model::record::{NotePath, Record};
use crate::repo::record_store::{prune_scratch_dir, RecordStore, StoreError};
use crate::session::Editor;
use crate::summary::{ComposeOptions, SummaryParser};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Outcome of the post-session reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Segments identical to session state.
    pub unchanged: Vec<NotePath>,
    /// Segments written through without interference.
    pub written: Vec<NotePath>,
    /// Conflicts resolved through a manual merge edit.
    pub merged: Vec<NotePath>,
    /// Conflicts whose merge edit came back empty; the file was left as is.
    pub skipped: Vec<NotePath>,
}

/// Reconciles the final aggregate document once the editor has exited.
pub struct ConflictMerger<'a, S: RecordStore, E: Editor + ?Sized> {
    store: &'a S,
    editor: &'a E,
    config: &'a SyncConfig,
    parser: SummaryParser,
}

impl<'a, S: RecordStore, E: Editor + ?Sized> ConflictMerger<'a, S, E> {
    pub fn new(
        store: &'a S,
        editor: &'a E,
        config: &'a SyncConfig,
        options: ComposeOptions,
    ) -> Self {
        Self {
            store,
            editor,
            config,
            parser: SummaryParser::new(config, options),
        }
    }

    /// Compares session state, final segment and on-disk state per record;
    /// writes safe edits and opens a merge edit for every conflict.
    ///
    /// # Errors
    /// - `SyncError::Structure` when the final document is malformed; nothing
    ///   is written.
    /// - `SyncError::Session` when the merge editor cannot run.
    pub fn resolve(&self, state: &mut SessionState, document: &Path) -> SyncResult<MergeReport> {
        let text = fs::read_to_string(document).map_err(|err| StoreError::io(document, err))?;
        let parsed = self.parser.parse(&text, state.records())?;

        let mut report = MergeReport::default();
        for edited in parsed {
            let known = state
                .get(&edited.path)
                .ok_or_else(|| SyncError::UnknownRecord(edited.path.clone()))?
                .clone();
            if edited == known {
                report.unchanged.push(edited.path);
                continue;
            }

            let on_disk = self.store.load_current(&edited.path)?;
            if on_disk.as_ref() == Some(&known) {
                self.store.save(&edited)?;
                report.written.push(edited.path.clone());
                state.advance(edited)?;
                continue;
            }

            let on_disk = on_disk.unwrap_or_else(|| Record::empty(edited.path.clone()));
            let path = edited.path.clone();
            match self.merge_one(&on_disk, &edited)? {
                Some(resolution) => {
                    state.advance(resolution)?;
                    report.merged.push(path);
                }
                None => report.skipped.push(path),
            }
        }

        info!(
            "event=merge module=sync status=ok unchanged={} written={} merged={} skipped={}",
            report.unchanged.len(),
            report.written.len(),
            report.merged.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn merge_one(&self, on_disk: &Record, edited: &Record) -> SyncResult<Option<Record>> {
        let draft = build_merge_draft(on_disk, edited, self.config);
        let scratch = self.write_scratch(&edited.path, &draft)?;
        info!(
            "event=merge_conflict module=sync status=start path={} scratch={}",
            edited.path,
            scratch.display()
        );

        self.editor.edit_blocking(&scratch)?;

        let contents =
            fs::read_to_string(&scratch).map_err(|err| StoreError::io(&scratch, err))?;
        if contents.trim().is_empty() {
            warn!(
                "event=merge_conflict module=sync status=skipped path={} reason=empty_resolution",
                edited.path
            );
            return Ok(None);
        }

        let resolution = Record::parse(edited.path.clone(), &contents, &self.config.tag_marker);
        let leftover = resolution
            .text
            .lines()
            .filter(|line| line.starts_with(&self.config.conflict_marker))
            .count();
        if leftover > 0 {
            warn!(
                "event=merge_conflict module=sync status=unresolved_markers path={} lines={}",
                edited.path, leftover
            );
        }

        self.store.save(&resolution)?;
        info!(
            "event=merge_conflict module=sync status=ok path={}",
            edited.path
        );
        Ok(Some(resolution))
    }

    fn write_scratch(&self, path: &NotePath, draft: &Record) -> SyncResult<PathBuf> {
        let merge_dir = &self.config.merge_dir;
        prune_scratch_dir(merge_dir, self.config.max_retained_merges)?;

        let stem = path
            .as_path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".to_string());
        let scratch = merge_dir.join(format!("{stem}.merge-{}.md", Uuid::new_v4()));
        fs::write(&scratch, draft.serialize(&self.config.tag_marker))
            .map_err(|err| StoreError::io(&scratch, err))?;
        Ok(scratch)
    }
}

/// Builds the merge-scratch record: the line diff from the on-disk body to
/// the edited body, plus the union of both tag lists.
pub fn build_merge_draft(on_disk: &Record, edited: &Record, config: &SyncConfig) -> Record {
    let ops = diff_lines(&on_disk.text, &edited.text);
    Record {
        path: edited.path.clone(),
        text: render_conflict(&ops, &config.conflict_marker),
        tags: union_tags(&on_disk.tags, &edited.tags),
    }
}
