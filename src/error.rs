//! Error types for batch-uploader
//!
//! Errors fall into three groups:
//! - Synchronous rejections that never reach the network ([`ValidationError`], [`LedgerError`],
//!   [`Error::SubmissionInFlight`])
//! - Failures of a settled submission ([`SubmissionError`]), carried inside
//!   [`Outcome::Failed`](crate::types::Outcome::Failed) rather than returned as `Err`
//! - Infrastructure errors (configuration, HTTP client construction, I/O)

use crate::types::{FileId, Status};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for batch-uploader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-uploader
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch.max_files")
        key: Option<String>,
    },

    /// Selection or rename rejected before submission
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Ledger operation refused
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A submission is already outstanding; only one batch may be in flight
    #[error("a submission is already in flight")]
    SubmissionInFlight,

    /// HTTP client error outside of a submission (e.g. building the client)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

}

/// User-facing validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The selection has more files than allowed; the whole selection is refused
    #[error("too many files selected: {count} (maximum {max})")]
    TooManyFiles {
        /// Number of files in the selection
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// The name is empty or whitespace only
    #[error("file name cannot be empty")]
    EmptyName,

    /// The name contains a character that is not allowed in file names
    #[error("file name contains invalid character '{character}'")]
    IllegalCharacter {
        /// The first offending character
        character: char,
    },

    /// Another file in the batch already uses this upload name
    #[error("file name '{name}' is already used by another file")]
    DuplicateName {
        /// The conflicting upload name
        name: String,
    },

    /// The file exceeds the configured size limit
    #[error("file is {size} bytes, limit is {max} bytes")]
    FileTooLarge {
        /// Declared size of the file
        size: u64,
        /// Configured limit
        max: u64,
    },

    /// The file's media type is not accepted
    #[error("media type '{media_type}' is not accepted")]
    UnsupportedMediaType {
        /// Declared media type
        media_type: String,
    },

    /// Remote-bucket processing requires a destination bucket and prefix
    #[error("remote-bucket processing requires a destination")]
    MissingDestination,

    /// The destination bucket name is blank
    #[error("destination bucket name cannot be empty")]
    EmptyBucket,

    /// Nothing is pending, so there is nothing to submit
    #[error("no pending files to submit")]
    EmptyBatch,
}

/// Errors raised by the file status ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No record with this id
    #[error("file {id} not found")]
    NotFound {
        /// The missing id
        id: FileId,
    },

    /// The requested status change is not an edge of the state machine
    #[error("cannot move file {id} from {from} to {to}")]
    InvalidTransition {
        /// The record being moved
        id: FileId,
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },

    /// The record is being processed and cannot be changed
    #[error("file {id} is being processed")]
    Busy {
        /// The busy record
        id: FileId,
    },

    /// The record is no longer editable (already submitted or rejected)
    #[error("cannot {operation} file {id} in status {status}")]
    NotEditable {
        /// The record
        id: FileId,
        /// Attempted operation (e.g. "rename")
        operation: &'static str,
        /// Current status
        status: Status,
    },
}

/// Why a settled submission failed
///
/// Every variant drives the in-flight records to `error`; cancellation is not
/// represented here because it is reported as
/// [`Outcome::Cancelled`](crate::types::Outcome::Cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionError {
    /// The request never produced a complete response (connect failure, timeout, body read)
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// The service answered with a non-2xx status
    #[error("service error ({status}): {message}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Machine-readable code from the error body, if it had one
        code: Option<String>,
        /// Message from the error body, or an opaque description when it could not be parsed
        message: String,
    },

    /// The archive was received but could not be saved locally
    #[error("could not save archive: {message}")]
    Archive {
        /// Description of the failure
        message: String,
    },

    /// The submission task itself ended abnormally
    #[error("submission aborted: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(e) => e.error_code(),
            Error::Ledger(e) => match e {
                LedgerError::NotFound { .. } => "file_not_found",
                LedgerError::InvalidTransition { .. } => "invalid_transition",
                LedgerError::Busy { .. } => "file_busy",
                LedgerError::NotEditable { .. } => "not_editable",
            },
            Error::SubmissionInFlight => "submission_in_flight",
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
        }
    }
}

impl ValidationError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::TooManyFiles { .. } => "too_many_files",
            ValidationError::EmptyName => "empty_name",
            ValidationError::IllegalCharacter { .. } => "illegal_character",
            ValidationError::DuplicateName { .. } => "duplicate_name",
            ValidationError::FileTooLarge { .. } => "file_too_large",
            ValidationError::UnsupportedMediaType { .. } => "unsupported_media_type",
            ValidationError::MissingDestination => "missing_destination",
            ValidationError::EmptyBucket => "empty_bucket",
            ValidationError::EmptyBatch => "empty_batch",
        }
    }
}

impl SubmissionError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            SubmissionError::Transport { .. } => "transport_error",
            SubmissionError::Service { .. } => "service_error",
            SubmissionError::Archive { .. } => "archive_error",
            SubmissionError::Internal { .. } => "internal_error",
        }
    }
}
