//! Collaborator seams
//!
//! The uploader reports to the outside world through three collaborators:
//! a [`NotificationSink`] for user-facing messages, an [`ArchiveSink`] that
//! receives archives returned in local mode, and a form-reset callback run
//! after a successful submission.

use crate::config::{FileCollisionAction, OutputConfig};
use crate::types::NotificationLevel;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

/// Callback invoked with no arguments after a successful submission
pub type ResetCallback = Arc<dyn Fn() + Send + Sync>;

/// Receiver of user-facing notifications
pub trait NotificationSink: Send + Sync {
    /// Deliver one message
    fn notify(&self, message: &str, level: NotificationLevel);
}

/// Notification sink that writes to the `tracing` log
///
/// Used when no other sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, message: &str, level: NotificationLevel) {
        match level {
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(?level, "{}", message)
            }
            NotificationLevel::Danger => tracing::warn!(?level, "{}", message),
        }
    }
}

/// A notification as delivered by [`ChannelNotifier`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Message text
    pub message: String,
    /// Severity
    pub level: NotificationLevel,
}

/// Notification sink that forwards into an unbounded channel
///
/// Lets a presentation layer consume notifications asynchronously.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: tokio::sync::mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, message: &str, level: NotificationLevel) {
        let notification = Notification {
            message: message.to_string(),
            level,
        };
        if self.tx.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Receiver of archives returned in local mode
///
/// Stands in for a browser's save-as download: the sink decides where the
/// bytes end up and returns that location.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Store an archive under (a variant of) `filename`
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be stored; the submission is then
    /// reported as failed.
    async fn save(&self, filename: &str, data: Bytes) -> crate::Result<PathBuf>;
}

/// Archive sink that writes into a directory
#[derive(Debug, Clone)]
pub struct DirectoryArchiveSink {
    dir: PathBuf,
    collision: FileCollisionAction,
}

impl DirectoryArchiveSink {
    /// Write archives into `dir`, resolving name clashes with `collision`
    pub fn new(dir: impl Into<PathBuf>, collision: FileCollisionAction) -> Self {
        Self {
            dir: dir.into(),
            collision,
        }
    }

    /// Build from the output section of the configuration
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.download_dir.clone(), config.file_collision)
    }
}

#[async_trait]
impl ArchiveSink for DirectoryArchiveSink {
    async fn save(&self, filename: &str, data: Bytes) -> crate::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            crate::Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    self.dir.display(),
                    e
                ),
            ))
        })?;

        let path = crate::utils::get_unique_path(&self.dir.join(filename), self.collision)?;
        tokio::fs::write(&path, &data).await.map_err(|e| {
            crate::Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write '{}': {}", path.display(), e),
            ))
        })?;

        tracing::debug!(path = %path.display(), bytes = data.len(), "archive saved");
        Ok(path)
    }
}
