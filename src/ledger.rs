//! File status ledger
//!
//! The ordered collection of [`FileRecord`]s for the current selection and the
//! only place record status changes. The ledger is a plain owned value; the
//! [`Uploader`](crate::Uploader) keeps it behind a lock and is its only writer,
//! handing out snapshots to readers.

use crate::config::NameCollision;
use crate::error::{Error, LedgerError, Result, ValidationError};
use crate::normalize::{canonicalize_batch, normalize};
use crate::types::{FileId, FileRecord, LedgerSummary, SelectedFile, Status};
use chrono::Utc;

/// Optional field updates applied together with a status transition
#[derive(Clone, Debug, Default)]
pub struct RecordPatch {
    /// Progress override (defaults to the status's coarse progress)
    pub progress: Option<u8>,
    /// Rejection reason; only kept when moving to `rejected`
    pub rejection_reason: Option<String>,
}

impl RecordPatch {
    /// Patch carrying a rejection reason
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            progress: None,
            rejection_reason: Some(reason.into()),
        }
    }
}

/// Ordered per-file records with an enforced status state machine
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<FileRecord>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every record with fresh `pending` records for `files`
    ///
    /// Names are normalized as a batch so canonical names follow `collision`.
    /// Ids are assigned in selection order starting at 0.
    pub fn initialize(
        &mut self,
        files: Vec<SelectedFile>,
        collision: NameCollision,
    ) -> Vec<FileId> {
        let canonical = canonicalize_batch(files.iter().map(|f| f.name.as_str()), collision);

        self.records = files
            .into_iter()
            .zip(canonical)
            .enumerate()
            .map(|(index, (file, canonical_name))| {
                FileRecord::pending(
                    FileId(index as u32),
                    file.name,
                    canonical_name,
                    file.payload,
                )
            })
            .collect();

        self.records.iter().map(|r| r.id).collect()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Move one record to `status`
    ///
    /// Fails with [`LedgerError::InvalidTransition`] for anything that is not an
    /// edge of the state machine; the record is left untouched in that case.
    pub fn transition(
        &mut self,
        id: FileId,
        status: Status,
        patch: Option<RecordPatch>,
    ) -> std::result::Result<(), LedgerError> {
        let record = self.get_mut(id)?;

        if !record.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                id,
                from: record.status,
                to: status,
            });
        }

        let patch = patch.unwrap_or_default();
        record.status = status;
        record.progress = patch.progress.unwrap_or_else(|| status.progress()).min(100);
        record.rejection_reason = if status == Status::Rejected {
            patch.rejection_reason
        } else {
            None
        };
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Change a record's display name
    ///
    /// The candidate must pass the file name rules, must not produce the same
    /// upload name as another record, and the record must still be `pending`.
    /// On any failure the display name is unchanged.
    pub fn rename(&mut self, id: FileId, display_name: &str) -> Result<()> {
        crate::validation::check_name(display_name)?;

        let record = self.get(id).ok_or(LedgerError::NotFound { id })?;
        if record.status != Status::Pending {
            return Err(Error::Ledger(LedgerError::NotEditable {
                id,
                operation: "rename",
                status: record.status,
            }));
        }

        let upload_name = normalize(display_name);
        let taken = self
            .records
            .iter()
            .filter(|r| r.id != id && r.status != Status::Rejected)
            .any(|r| r.upload_name() == upload_name);
        if taken {
            return Err(Error::Validation(ValidationError::DuplicateName {
                name: upload_name,
            }));
        }

        let record = self.get_mut(id)?;
        record.display_name = display_name.to_string();
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Remove a record
    ///
    /// Refused with [`LedgerError::Busy`] while the record is `processing`.
    pub fn remove(&mut self, id: FileId) -> std::result::Result<FileRecord, LedgerError> {
        let position = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(LedgerError::NotFound { id })?;

        if self.records[position].status == Status::Processing {
            return Err(LedgerError::Busy { id });
        }

        Ok(self.records.remove(position))
    }

    /// Move every `pending` record to `processing` and return their ids
    pub fn begin_submission(&mut self) -> Vec<FileId> {
        self.move_all(Status::Pending, Status::Processing)
    }

    /// Move every `processing` record to the terminal `status` and return their ids
    pub fn settle(&mut self, status: Status) -> Vec<FileId> {
        self.move_all(Status::Processing, status)
    }

    fn move_all(&mut self, from: Status, to: Status) -> Vec<FileId> {
        if !from.can_transition_to(to) {
            return Vec::new();
        }

        let now = Utc::now();
        self.records
            .iter_mut()
            .filter(|r| r.status == from)
            .map(|r| {
                r.status = to;
                r.progress = to.progress();
                r.updated_at = now;
                r.id
            })
            .collect()
    }

    /// Records in selection order
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Records currently in `status`
    pub fn with_status(&self, status: Status) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    /// Look up a record
    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: FileId) -> std::result::Result<&mut FileRecord, LedgerError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LedgerError::NotFound { id })
    }

    /// Count records per status
    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for record in &self.records {
            match record.status {
                Status::Pending => summary.pending += 1,
                Status::Processing => summary.processing += 1,
                Status::Success => summary.success += 1,
                Status::Error => summary.error += 1,
                Status::Rejected => summary.rejected += 1,
            }
        }
        summary
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
