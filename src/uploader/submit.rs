//! Batch submission: the multipart request, the single network call and cancellation.

use crate::error::{Error, Result, SubmissionError, ValidationError};
use crate::ledger::Ledger;
use crate::types::{
    BatchRequest, Event, FileRecord, Outcome, ProcessingMode, Status, SubmissionId,
};
use reqwest::multipart::{Form, Part};
use std::sync::atomic::Ordering;
use tokio::sync::{MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;

use super::resolve::{ServiceResponse, panic_message};
use super::{ActiveSubmission, Uploader};

/// Form field carrying the files, one part per file
pub const FILE_FIELD: &str = "files";
/// Form field selecting the response shape (`local` or `aws`)
pub const PROCESSING_MODE_FIELD: &str = "Processing-Mode";
/// Form field carrying the target format
pub const EXPORT_TYPE_FIELD: &str = "Export-Type";
/// Form field carrying the destination path prefix (aws mode only)
pub const PREFIX_FIELD: &str = "S3_Prefix";
/// Form field carrying the destination bucket (aws mode only)
pub const BUCKET_FIELD: &str = "S3_Bucket_Name";

/// Handle to an in-flight submission
///
/// Dropping the handle does not cancel the submission; use
/// [`Uploader::cancel`] for that.
#[derive(Debug)]
pub struct Submission {
    id: SubmissionId,
    files: usize,
    handle: tokio::task::JoinHandle<Outcome>,
}

impl Submission {
    /// Submission id
    pub fn id(&self) -> SubmissionId {
        self.id
    }

    /// Number of files sent
    pub fn files(&self) -> usize {
        self.files
    }

    /// Wait for the submission to settle
    ///
    /// Never fails: transport and service failures and cancellation are all
    /// reported as an [`Outcome`].
    pub async fn outcome(self) -> Outcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = if e.is_panic() {
                    format!("submission task panicked: {}", panic_message(&*e.into_panic()))
                } else {
                    format!("submission task did not complete: {}", e)
                };
                tracing::error!(submission_id = %self.id, error = %message, "submission aborted");
                Outcome::Failed {
                    error: SubmissionError::Internal { message },
                }
            }
        }
    }
}

impl Uploader {
    /// Submit every pending file as one multipart request
    ///
    /// Pending records move to `processing` before this returns, so observers
    /// see the new status without waiting for the network. The request runs in
    /// a background task; await [`Submission::outcome`] for the result.
    ///
    /// # Errors
    ///
    /// Nothing is sent when this fails:
    /// - [`ValidationError::MissingDestination`] / [`ValidationError::EmptyBucket`]
    ///   for remote-bucket requests without a usable destination
    /// - [`Error::SubmissionInFlight`] while another submission is outstanding
    /// - [`ValidationError::EmptyBatch`] when no record is pending
    pub async fn submit(&self, batch: BatchRequest) -> Result<Submission> {
        crate::validation::check_request(&batch)?;

        let mut slot = self.in_flight.lock().await;
        if let Some(active) = slot.as_ref() {
            tracing::warn!(submission_id = %active.id, "submission refused, another is in flight");
            return Err(Error::SubmissionInFlight);
        }

        let (form, files) = {
            let mut ledger = self.ledger.write().await;
            let pending: Vec<&FileRecord> = ledger.with_status(Status::Pending).collect();
            if pending.is_empty() {
                return Err(Error::Validation(ValidationError::EmptyBatch));
            }
            let form = build_form(&pending, &batch);

            let ids = ledger.begin_submission();
            self.emit_status_changes(&ledger, &ids);
            (form, ids.len())
        };

        let id = SubmissionId(self.next_submission_id.fetch_add(1, Ordering::Relaxed));
        let cancel_token = CancellationToken::new();
        *slot = Some(ActiveSubmission {
            id,
            cancel_token: cancel_token.clone(),
        });
        drop(slot);

        tracing::info!(
            submission_id = %id,
            files,
            mode = %batch.processing_mode,
            export_format = %batch.export_format,
            "submitting batch"
        );
        self.emit_event(Event::SubmissionStarted {
            id,
            files,
            mode: batch.processing_mode,
        });

        let uploader = self.clone();
        let mode = batch.processing_mode;
        let handle = tokio::spawn(async move {
            uploader.run_submission(id, mode, form, cancel_token).await
        });

        Ok(Submission { id, files, handle })
    }

    /// Cancel the in-flight submission
    ///
    /// Idempotent: a second call, or a call with nothing in flight, does nothing.
    pub async fn cancel(&self) {
        let slot = self.in_flight.lock().await;
        match slot.as_ref() {
            Some(active) if !active.cancel_token.is_cancelled() => {
                tracing::info!(submission_id = %active.id, "cancelling submission");
                active.cancel_token.cancel();
            }
            Some(_) => tracing::debug!("submission already cancelled"),
            None => tracing::debug!("cancel requested with nothing in flight"),
        }
    }

    async fn run_submission(
        &self,
        id: SubmissionId,
        mode: ProcessingMode,
        form: Form,
        cancel_token: CancellationToken,
    ) -> Outcome {
        let request = self.client.post(self.endpoint.clone()).multipart(form);

        let fetched = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => None,
            result = fetch(request) => Some(result),
        };

        // Holding the slot while resolving makes a racing cancel() a no-op
        // and keeps selection changes out until the ledger has settled.
        let slot = InFlightGuard {
            slot: self.in_flight.lock().await,
            ledger: &self.ledger,
        };
        let outcome = match fetched {
            _ if cancel_token.is_cancelled() => self.settle_cancelled().await,
            None => self.settle_cancelled().await,
            Some(Ok(response)) => self.resolve(mode, response).await,
            Some(Err(error)) => self.settle_failed(error).await,
        };
        drop(slot);

        tracing::info!(submission_id = %id, outcome = outcome.kind(), "submission finished");
        self.emit_event(Event::SubmissionFinished {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }
}

/// Held while a submission settles; empties the in-flight slot on drop
///
/// If the task unwinds before the ledger is settled, leftover `processing`
/// records are moved to `error` so the uploader does not stay busy.
struct InFlightGuard<'a> {
    slot: MutexGuard<'a, Option<ActiveSubmission>>,
    ledger: &'a RwLock<Ledger>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let Some(active) = self.slot.take() else {
            return;
        };
        if !std::thread::panicking() {
            return;
        }
        match self.ledger.try_write() {
            Ok(mut ledger) => {
                let settled = ledger.settle(Status::Error);
                tracing::error!(
                    submission_id = %active.id,
                    files = settled.len(),
                    "submission unwound, records moved to error"
                );
            }
            Err(_) => tracing::error!(
                submission_id = %active.id,
                "submission unwound with the ledger locked"
            ),
        }
    }
}

/// Build the multipart body for the given records
pub(crate) fn build_form(records: &[&FileRecord], batch: &BatchRequest) -> Form {
    let mut form = Form::new();
    for record in records {
        form = form.part(FILE_FIELD, file_part(record));
    }

    form = form
        .text(PROCESSING_MODE_FIELD, batch.processing_mode.wire_value())
        .text(EXPORT_TYPE_FIELD, batch.export_format.as_str());

    if batch.processing_mode == ProcessingMode::RemoteBucket
        && let Some(destination) = &batch.destination
    {
        form = form
            .text(PREFIX_FIELD, destination.prefix.clone())
            .text(BUCKET_FIELD, destination.bucket.clone());
    }

    form
}

fn file_part(record: &FileRecord) -> Part {
    let part = Part::bytes(record.payload.data.to_vec()).file_name(record.upload_name());
    match part.mime_str(&record.payload.media_type) {
        Ok(part) => part,
        Err(e) => {
            tracing::warn!(
                file = %record.canonical_name,
                media_type = %record.payload.media_type,
                error = %e,
                "invalid media type, sending without one"
            );
            Part::bytes(record.payload.data.to_vec()).file_name(record.upload_name())
        }
    }
}

/// Send the request and read the whole body
async fn fetch(
    request: reqwest::RequestBuilder,
) -> std::result::Result<ServiceResponse, SubmissionError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(transport_error)?;
    Ok(ServiceResponse { status, body })
}

fn transport_error(e: reqwest::Error) -> SubmissionError {
    let message = if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    };
    tracing::warn!(error = %message, "transport failure");
    SubmissionError::Transport { message }
}
