//! Custom test assertions for integration tests

use batch_uploader::{Event, Outcome, Status, SubmissionId, Uploader};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Wait for `SubmissionFinished` for `id` on an already-subscribed receiver
///
/// Returns `None` on timeout or if the channel closes first.
pub async fn wait_for_finished(
    events: &mut Receiver<Event>,
    id: SubmissionId,
    timeout: Duration,
) -> Option<Outcome> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::SubmissionFinished {
                    id: event_id,
                    outcome,
                }) if event_id == id => return Some(outcome),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("event receiver lagged by {} events", n);
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Assert that every record is in `expected`
pub async fn assert_all_status(uploader: &Uploader, expected: Status) {
    let records = uploader.records().await;
    assert!(!records.is_empty(), "ledger is empty");
    for record in records {
        assert_eq!(
            record.status, expected,
            "file {} ({}) is {}, expected {}",
            record.id, record.canonical_name, record.status, expected
        );
    }
}
