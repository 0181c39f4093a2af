//! File selection control: select, rename and remove.
//!
//! All three are refused while a submission is in flight: the orchestrator is
//! the only writer of record status during that window.

use crate::error::{Error, Result};
use crate::ledger::RecordPatch;
use crate::types::{
    Event, FileId, FileRecord, LedgerSummary, NotificationLevel, SelectedFile, Status,
};
use crate::validation::{self, ValidationRules};

use super::{ActiveSubmission, Uploader};

impl Uploader {
    /// Replace the current selection
    ///
    /// Runs the validation gate, normalizes names and initializes the ledger
    /// with one `pending` record per file, in selection order. Files failing a
    /// per-file check are moved to `rejected` with the reason.
    ///
    /// # Errors
    ///
    /// - [`Error::SubmissionInFlight`] while a submission is outstanding
    /// - [`ValidationError::TooManyFiles`](crate::ValidationError::TooManyFiles)
    ///   when the selection exceeds `batch.max_files`; the ledger is left empty
    ///   and one notification is sent
    pub async fn select(&self, files: Vec<SelectedFile>) -> Result<LedgerSummary> {
        let slot = self.in_flight.lock().await;
        ensure_idle(&slot)?;

        let rules = ValidationRules::from(&self.config.batch);
        let mut ledger = self.ledger.write().await;

        let validated = match validation::validate(files, &rules) {
            Ok(validated) => validated,
            Err(e) => {
                ledger.clear();
                drop(ledger);
                drop(slot);
                tracing::info!(error = %e, "selection refused");
                self.emit_event(Event::SelectionReplaced {
                    files: 0,
                    rejected: 0,
                });
                self.collaborators
                    .notifier
                    .notify(&e.to_string(), NotificationLevel::Danger);
                return Err(Error::Validation(e));
            }
        };

        let rejections: Vec<Option<String>> = validated
            .files
            .iter()
            .map(|s| s.rejection.as_ref().map(|r| r.to_string()))
            .collect();
        let files = validated.files.into_iter().map(|s| s.file).collect();

        let ids = ledger.initialize(files, self.config.batch.name_collision);
        let mut rejected = Vec::new();
        for (id, reason) in ids.iter().zip(rejections) {
            if let Some(reason) = reason {
                ledger.transition(*id, Status::Rejected, Some(RecordPatch::rejected(reason)))?;
                rejected.push(*id);
            }
        }

        let summary = ledger.summary();
        tracing::info!(
            files = ids.len(),
            rejected = rejected.len(),
            "selection replaced"
        );
        self.emit_event(Event::SelectionReplaced {
            files: ids.len(),
            rejected: rejected.len(),
        });
        self.emit_status_changes(&ledger, &rejected);

        Ok(summary)
    }

    /// Change the display name of a pending file
    ///
    /// The name is checked with the same rules as at selection; on failure the
    /// display name is unchanged.
    pub async fn rename(&self, id: FileId, display_name: &str) -> Result<()> {
        let slot = self.in_flight.lock().await;
        ensure_idle(&slot)?;

        self.ledger.write().await.rename(id, display_name)?;
        tracing::debug!(file_id = %id, display_name, "file renamed");
        self.emit_event(Event::Renamed {
            id,
            display_name: display_name.to_string(),
        });
        Ok(())
    }

    /// Remove a file from the selection
    pub async fn remove(&self, id: FileId) -> Result<FileRecord> {
        let slot = self.in_flight.lock().await;
        ensure_idle(&slot)?;

        let record = self.ledger.write().await.remove(id)?;
        tracing::debug!(file_id = %id, name = %record.canonical_name, "file removed");
        self.emit_event(Event::Removed { id });
        Ok(record)
    }
}

fn ensure_idle(slot: &Option<ActiveSubmission>) -> Result<()> {
    match slot {
        Some(active) => {
            tracing::debug!(submission_id = %active.id, "selection change refused while in flight");
            Err(Error::SubmissionInFlight)
        }
        None => Ok(()),
    }
}
