//! # batch-uploader
//!
//! Backend library for submitting small batches of files to a remote processing
//! service and tracking each file through its lifecycle.
//!
//! ## Design Philosophy
//!
//! batch-uploader is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! A selection goes through the validation gate and the filename normalizer
//! into the file status ledger. [`Uploader::submit`] sends every pending file
//! as one multipart request; the response either comes back as an archive
//! (`local` mode) or as an acknowledgment that the files were written to a
//! bucket (`aws` mode).
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_uploader::{BatchRequest, Config, ExportFormat, SelectedFile, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.endpoint.url = "http://localhost:8000/process".to_string();
//!
//!     let uploader = Uploader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = uploader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     uploader
//!         .select(vec![SelectedFile::from_path("Holiday Photo.png").await?])
//!         .await?;
//!
//!     let submission = uploader.submit(BatchRequest::local(ExportFormat::Webp)).await?;
//!     println!("Outcome: {:?}", submission.outcome().await);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// File status ledger
pub mod ledger;
/// Filename normalization
pub mod normalize;
/// Notification and archive collaborators
pub mod notify;
/// Core types and events
pub mod types;
/// Upload orchestration (decomposed into focused submodules)
pub mod uploader;
/// Utility functions
pub mod utils;
/// Validation gate
pub mod validation;

// Re-export commonly used types
pub use config::{Config, FileCollisionAction, NameCollision};
pub use error::{Error, LedgerError, Result, SubmissionError, ValidationError};
pub use ledger::Ledger;
pub use normalize::{canonicalize_batch, normalize};
pub use notify::{
    ArchiveSink, ChannelNotifier, DirectoryArchiveSink, Notification, NotificationSink,
    TracingNotifier,
};
pub use types::{
    BatchRequest, Destination, Event, ExportFormat, FileId, FilePayload, FileRecord,
    LedgerSummary, NotificationLevel, Outcome, ProcessingMode, SelectedFile, Status,
    SubmissionId,
};
pub use uploader::{ServiceResponse, Submission, Uploader};
pub use validation::{ValidationRules, check_name, validate};
