//! Shared test helpers for creating Uploader instances in tests.

use crate::config::{Config, FileCollisionAction};
use crate::notify::{DirectoryArchiveSink, NotificationSink};
use crate::types::{NotificationLevel, SelectedFile};
use crate::uploader::Uploader;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;

/// Notification sink that records every message for later assertions
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: std::sync::Mutex<Vec<(String, NotificationLevel)>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<(String, NotificationLevel)> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn levels(&self) -> Vec<NotificationLevel> {
        self.messages().into_iter().map(|(_, level)| level).collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str, level: NotificationLevel) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), level));
    }
}

/// Everything a test needs to drive and observe an uploader
pub(crate) struct TestUploader {
    pub(crate) uploader: Uploader,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) resets: Arc<AtomicUsize>,
    /// Archives land in `temp_dir/downloads`; must be kept alive
    pub(crate) temp_dir: tempfile::TempDir,
}

impl TestUploader {
    pub(crate) fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub(crate) fn download_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("downloads")
    }

    /// Files written by the archive sink, sorted by name
    pub(crate) fn saved_archives(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.download_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Helper to create a test Uploader posting to `server_uri`.
///
/// Notifications are recorded, reset callbacks counted, and archives written
/// into a temp directory.
pub(crate) fn create_test_uploader(server_uri: &str) -> TestUploader {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.endpoint.url = format!("{}/process", server_uri);
    config.endpoint.timeout = Duration::from_secs(5);
    config.output.download_dir = temp_dir.path().join("downloads");

    let notifier = Arc::new(RecordingNotifier::default());
    let resets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resets);

    let uploader = Uploader::new(config)
        .unwrap()
        .with_notifier(notifier.clone())
        .with_archive_sink(Arc::new(DirectoryArchiveSink::new(
            temp_dir.path().join("downloads"),
            FileCollisionAction::Rename,
        )))
        .with_reset_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    TestUploader {
        uploader,
        notifier,
        resets,
        temp_dir,
    }
}

/// `n` small PNG files named `Holiday Photo {i}.png`
pub(crate) fn sample_files(n: usize) -> Vec<SelectedFile> {
    (0..n)
        .map(|i| {
            SelectedFile::new(
                format!("Holiday Photo {}.png", i),
                format!("png-bytes-{}", i).into_bytes(),
            )
        })
        .collect()
}
