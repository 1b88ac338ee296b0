use super::{SessionState, SyncError, SyncResult};
use crate::config::SyncConfig;
use crate::model::record::NotePath;
use crate::repo::record_store::{RecordStore, StoreError};
use crate::summary::{ComposeOptions, SummaryParser};
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Outcome of one propagation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Records written through and advanced in session state.
    pub written: Vec<NotePath>,
    /// Edited records left alone because the file changed underneath.
    pub deferred: Vec<NotePath>,
    /// The document was unchanged since the previous tick.
    pub document_unchanged: bool,
}

/// Writes safe aggregate-document edits through while the editor is open.
pub struct ChangePropagator<'a, S: RecordStore> {
    store: &'a S,
    parser: SummaryParser,
    last_seen: Option<(SystemTime, u64)>,
}

impl<'a, S: RecordStore> ChangePropagator<'a, S> {
    pub fn new(store: &'a S, config: &'a SyncConfig, options: ComposeOptions) -> Self {
        Self {
            store,
            parser: SummaryParser::new(config, options),
            last_seen: None,
        }
    }

    /// Remembers the document's current metadata so the next tick is skipped
    /// unless the document has been saved since.
    pub fn observe(&mut self, document: &Path) -> SyncResult<()> {
        self.last_seen = Some(document_fingerprint(document)?);
        Ok(())
    }

    /// Re-reads the document and writes every edited segment whose file
    /// still matches the session state.
    ///
    /// # Errors
    /// - `SyncError::Structure` when the document lost its record structure;
    ///   no record is written in that case.
    /// - `SyncError::Store` on read/write failures.
    pub fn propagate(
        &mut self,
        state: &mut SessionState,
        document: &Path,
    ) -> SyncResult<PropagationReport> {
        let fingerprint = document_fingerprint(document)?;
        if self.last_seen == Some(fingerprint) {
            debug!(
                "event=propagate module=sync status=skip reason=document_unchanged document={}",
                document.display()
            );
            return Ok(PropagationReport {
                document_unchanged: true,
                ..PropagationReport::default()
            });
        }

        let text = fs::read_to_string(document).map_err(|err| StoreError::io(document, err))?;
        let parsed = self.parser.parse(&text, state.records())?;
        self.last_seen = Some(fingerprint);

        let mut report = PropagationReport::default();
        for edited in parsed {
            let known = state
                .get(&edited.path)
                .ok_or_else(|| SyncError::UnknownRecord(edited.path.clone()))?;
            if &edited == known {
                continue;
            }

            let on_disk = self.store.load_current(&edited.path)?;
            if on_disk.as_ref() == Some(known) {
                self.store.save(&edited)?;
                report.written.push(edited.path.clone());
                state.advance(edited)?;
            } else {
                info!(
                    "event=propagate module=sync status=deferred path={} reason=external_change",
                    edited.path
                );
                report.deferred.push(edited.path);
            }
        }

        if !report.written.is_empty() || !report.deferred.is_empty() {
            info!(
                "event=propagate module=sync status=ok written={} deferred={}",
                report.written.len(),
                report.deferred.len()
            );
        }
        Ok(report)
    }
}

fn document_fingerprint(document: &Path) -> SyncResult<(SystemTime, u64)> {
    let metadata = fs::metadata(document).map_err(|err| StoreError::io(document, err))?;
    let modified = metadata
        .modified()
        .map_err(|err| StoreError::io(document, err))?;
    Ok((modified, metadata.len()))
}
