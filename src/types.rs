//! Core types for batch-uploader

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SubmissionError;

/// Stable identity of a file within one selection
///
/// Ids are assigned in selection order starting at 0 and are not reused when
/// a file is removed, so an id keeps pointing at the same file for the life of
/// the selection.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileId(pub u32);

impl FileId {
    /// Get the inner value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for FileId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one submission, unique for the lifetime of an [`Uploader`](crate::Uploader)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub u64);

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File status
///
/// ```text
/// pending     -> processing   (submission begins)
/// pending     -> rejected     (fails validation before submission)
/// processing  -> success
/// processing  -> error
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Selected, waiting for submission
    Pending,
    /// Part of the in-flight submission
    Processing,
    /// The batch resolved favorably
    Success,
    /// The batch failed, was aborted or cancelled
    Error,
    /// Refused before submission
    Rejected,
}

impl Status {
    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Processing)
                | (Status::Pending, Status::Rejected)
                | (Status::Processing, Status::Success)
                | (Status::Processing, Status::Error)
        )
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Error | Status::Rejected)
    }

    /// Coarse progress shown for a record entering this status
    pub fn progress(self) -> u8 {
        match self {
            Status::Pending | Status::Rejected | Status::Error => 0,
            Status::Processing => 50,
            Status::Success => 100,
        }
    }

    /// Lowercase name, as serialized
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Success => "success",
            Status::Error => "error",
            Status::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque file contents with declared size and media type
#[derive(Clone, Debug, Serialize)]
pub struct FilePayload {
    /// File contents (cheap to clone)
    #[serde(skip)]
    pub data: Bytes,
    /// Declared size in bytes
    pub size: u64,
    /// Declared media type, e.g. "image/png"
    pub media_type: String,
}

impl FilePayload {
    /// Wrap in-memory contents; the declared size is the buffer length
    pub fn new(data: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            size: data.len() as u64,
            data,
            media_type: media_type.into(),
        }
    }
}

/// One entry of a user's file selection, before validation
#[derive(Clone, Debug)]
pub struct SelectedFile {
    /// Name as selected by the user
    pub name: String,
    /// File contents
    pub payload: FilePayload,
}

impl SelectedFile {
    /// Create a selection entry from in-memory contents
    ///
    /// The media type is inferred from the name's extension.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let media_type = crate::utils::media_type_for(&name);
        Self {
            payload: FilePayload::new(data, media_type),
            name,
        }
    }

    /// Create a selection entry with an explicit payload
    pub fn with_payload(name: impl Into<String>, payload: FilePayload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Read a file from disk
    ///
    /// The selection name is the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                crate::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' has no usable file name", path.display()),
                ))
            })?
            .to_string();

        let data = tokio::fs::read(path).await.map_err(|e| {
            crate::Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read '{}': {}", path.display(), e),
            ))
        })?;

        Ok(Self::new(name, data))
    }
}

/// One file through its lifecycle
#[derive(Clone, Debug, Serialize)]
pub struct FileRecord {
    /// Stable identity within the selection
    pub id: FileId,
    /// Name as selected by the user
    pub original_name: String,
    /// Normalized, batch-unique name
    pub canonical_name: String,
    /// User-editable name; defaults to the canonical name
    pub display_name: String,
    /// Contents
    pub payload: FilePayload,
    /// Lifecycle status
    pub status: Status,
    /// Coarse progress 0-100, updated at phase boundaries only
    pub progress: u8,
    /// Set only when `status == Rejected`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Time of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create a pending record
    pub fn pending(
        id: FileId,
        original_name: String,
        canonical_name: String,
        payload: FilePayload,
    ) -> Self {
        Self {
            id,
            original_name,
            display_name: canonical_name.clone(),
            canonical_name,
            payload,
            status: Status::Pending,
            progress: Status::Pending.progress(),
            rejection_reason: None,
            updated_at: Utc::now(),
        }
    }

    /// Filename sent to the remote service
    ///
    /// The canonical name, unless the user renamed the file, in which case the
    /// display name is normalized so the transmitted name stays canonical.
    pub fn upload_name(&self) -> String {
        if self.display_name == self.canonical_name {
            self.canonical_name.clone()
        } else {
            crate::normalize::normalize(&self.display_name)
        }
    }
}

/// Counts of records per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Pending records
    pub pending: usize,
    /// Processing records
    pub processing: usize,
    /// Successful records
    pub success: usize,
    /// Failed records
    pub error: usize,
    /// Rejected records
    pub rejected: usize,
}

impl LedgerSummary {
    /// Total number of records
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.success + self.error + self.rejected
    }
}

/// What the caller expects back from the service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Processed files come back as a binary archive
    #[default]
    Local,
    /// Processed files are written to a bucket; the service answers with JSON
    RemoteBucket,
}

impl ProcessingMode {
    /// Value of the `Processing-Mode` form field
    pub fn wire_value(self) -> &'static str {
        match self {
            ProcessingMode::Local => "local",
            ProcessingMode::RemoteBucket => "aws",
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingMode::Local => f.write_str("local"),
            ProcessingMode::RemoteBucket => f.write_str("remote-bucket"),
        }
    }
}

/// Target image format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG
    #[default]
    Png,
    /// JPEG
    Jpeg,
    /// WebP
    Webp,
    /// TIFF
    Tiff,
    /// BMP
    Bmp,
    /// GIF
    Gif,
}

impl ExportFormat {
    /// Value of the `Export-Type` form field
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::Webp => "webp",
            ExportFormat::Tiff => "tiff",
            ExportFormat::Bmp => "bmp",
            ExportFormat::Gif => "gif",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            "webp" => Ok(ExportFormat::Webp),
            "tiff" | "tif" => Ok(ExportFormat::Tiff),
            "bmp" => Ok(ExportFormat::Bmp),
            "gif" => Ok(ExportFormat::Gif),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// Bucket location for remote-bucket processing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Bucket name (`S3_Bucket_Name`)
    pub bucket: String,
    /// Path prefix inside the bucket (`S3_Prefix`)
    #[serde(default)]
    pub prefix: String,
}

impl Destination {
    /// Create a destination
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

/// Parameters of one submission
///
/// The files themselves are the ledger's pending records at submission time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Expected response shape
    pub processing_mode: ProcessingMode,
    /// Target format
    pub export_format: ExportFormat,
    /// Required when `processing_mode == RemoteBucket`
    #[serde(default)]
    pub destination: Option<Destination>,
}

impl BatchRequest {
    /// Request a binary archive back
    pub fn local(export_format: ExportFormat) -> Self {
        Self {
            processing_mode: ProcessingMode::Local,
            export_format,
            destination: None,
        }
    }

    /// Request processing into a bucket
    pub fn remote_bucket(export_format: ExportFormat, destination: Destination) -> Self {
        Self {
            processing_mode: ProcessingMode::RemoteBucket,
            export_format,
            destination: Some(destination),
        }
    }
}

/// Terminal result of a submission
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Local mode: the returned archive was saved
    Archive {
        /// Where the archive was written
        path: PathBuf,
        /// Archive size in bytes
        bytes: u64,
    },
    /// Remote-bucket mode: the service acknowledged the batch
    Acknowledged {
        /// Response body as returned by the service
        body: serde_json::Value,
    },
    /// The submission failed
    Failed {
        /// Failure reason
        error: SubmissionError,
    },
    /// The caller cancelled the submission
    Cancelled,
}

impl Outcome {
    /// Whether the records ended in `success`
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Archive { .. } | Outcome::Acknowledged { .. })
    }

    /// Short label for logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Archive { .. } => "archive",
            Outcome::Acknowledged { .. } => "acknowledged",
            Outcome::Failed { .. } => "failed",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Severity of a user notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Operation succeeded
    Success,
    /// Operation failed
    Danger,
    /// Informational (e.g. cancellation)
    Info,
}

/// Event emitted to subscribers as the ledger changes
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new selection replaced the ledger
    SelectionReplaced {
        /// Number of records created
        files: usize,
        /// How many of them were rejected
        rejected: usize,
    },

    /// A record changed status
    StatusChanged {
        /// File id
        id: FileId,
        /// New status
        status: Status,
        /// New progress
        progress: u8,
    },

    /// A record's display name changed
    Renamed {
        /// File id
        id: FileId,
        /// New display name
        display_name: String,
    },

    /// A record was removed
    Removed {
        /// File id
        id: FileId,
    },

    /// A submission was sent
    SubmissionStarted {
        /// Submission id
        id: SubmissionId,
        /// Number of files in the batch
        files: usize,
        /// Processing mode
        mode: ProcessingMode,
    },

    /// A submission settled
    SubmissionFinished {
        /// Submission id
        id: SubmissionId,
        /// Terminal outcome
        outcome: Outcome,
    },
}
