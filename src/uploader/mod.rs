//! Upload orchestration split into focused submodules.
//!
//! The `Uploader` struct and its methods are organized by domain:
//! - [`selection`] - Selecting, renaming and removing files
//! - [`submit`] - Multipart submission and cancellation
//! - [`resolve`] - Turning the service response into an outcome

mod resolve;
mod selection;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use resolve::ServiceResponse;
pub use submit::{
    BUCKET_FIELD, EXPORT_TYPE_FIELD, FILE_FIELD, PREFIX_FIELD, PROCESSING_MODE_FIELD, Submission,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::notify::{
    ArchiveSink, DirectoryArchiveSink, NotificationSink, ResetCallback, TracingNotifier,
};
use crate::types::{Event, FileId, FileRecord, LedgerSummary, SubmissionId};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// The submission currently on the wire
pub(crate) struct ActiveSubmission {
    pub(crate) id: SubmissionId,
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
}

/// External collaborators driven by the uploader
#[derive(Clone)]
pub(crate) struct Collaborators {
    /// User-facing notifications
    pub(crate) notifier: Arc<dyn NotificationSink>,
    /// Destination for archives returned in local mode
    pub(crate) archive_sink: Arc<dyn ArchiveSink>,
    /// Run once after every successful submission
    pub(crate) on_reset: Option<ResetCallback>,
}

/// Batch uploader instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the file status ledger and is its only writer. Presentation layers
/// read snapshots through [`records`](Self::records) or follow changes with
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct Uploader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// HTTP client with the configured timeout
    pub(crate) client: reqwest::Client,
    /// Parsed endpoint URL
    pub(crate) endpoint: url::Url,
    /// File status ledger
    pub(crate) ledger: Arc<tokio::sync::RwLock<Ledger>>,
    /// The one submission allowed in flight; lock before `ledger`
    pub(crate) in_flight: Arc<tokio::sync::Mutex<Option<ActiveSubmission>>>,
    /// Next submission id
    pub(crate) next_submission_id: Arc<AtomicU64>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Notification sink, archive sink, reset callback
    pub(crate) collaborators: Collaborators,
}

impl Uploader {
    /// Create a new Uploader
    ///
    /// Validates the configuration and builds the HTTP client. Notifications go
    /// to the `tracing` log and archives into `output.download_dir` until other
    /// collaborators are installed.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let endpoint = url::Url::parse(&config.endpoint.url).map_err(|e| Error::Config {
            message: format!("invalid endpoint URL '{}': {}", config.endpoint.url, e),
            key: Some("endpoint.url".to_string()),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.endpoint.timeout)
            .user_agent(config.endpoint.user_agent.as_str())
            .build()?;

        // Create broadcast channel with buffer size of 256 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(256);

        let collaborators = Collaborators {
            notifier: Arc::new(TracingNotifier),
            archive_sink: Arc::new(DirectoryArchiveSink::from_config(&config.output)),
            on_reset: None,
        };

        tracing::debug!(endpoint = %endpoint, max_files = config.batch.max_files, "uploader created");

        Ok(Self {
            config: Arc::new(config),
            client,
            endpoint,
            ledger: Arc::new(tokio::sync::RwLock::new(Ledger::new())),
            in_flight: Arc::new(tokio::sync::Mutex::new(None)),
            next_submission_id: Arc::new(AtomicU64::new(1)),
            event_tx,
            collaborators,
        })
    }

    /// Replace the notification sink
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.collaborators.notifier = notifier;
        self
    }

    /// Replace the archive sink
    pub fn with_archive_sink(mut self, sink: Arc<dyn ArchiveSink>) -> Self {
        self.collaborators.archive_sink = sink;
        self
    }

    /// Install the form-reset callback, run once after each successful submission
    pub fn with_reset_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.collaborators.on_reset = Some(Arc::new(callback));
        self
    }

    /// Subscribe to ledger and submission events
    ///
    /// Multiple subscribers are supported. A subscriber that falls more than 256
    /// events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Snapshot of every record in selection order
    pub async fn records(&self) -> Vec<FileRecord> {
        self.ledger.read().await.records().to_vec()
    }

    /// Snapshot of one record
    pub async fn record(&self, id: FileId) -> Option<FileRecord> {
        self.ledger.read().await.get(id).cloned()
    }

    /// Count of records per status
    pub async fn summary(&self) -> LedgerSummary {
        self.ledger.read().await.summary()
    }

    /// Whether a submission is in flight
    pub async fn is_busy(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Emit a `StatusChanged` event for each id, reading the current record state
    pub(crate) fn emit_status_changes(&self, ledger: &Ledger, ids: &[FileId]) {
        for id in ids {
            if let Some(record) = ledger.get(*id) {
                self.emit_event(Event::StatusChanged {
                    id: *id,
                    status: record.status,
                    progress: record.progress,
                });
            }
        }
    }
}
