//! Response resolution: interpret the service response, settle the ledger and notify.

use crate::error::SubmissionError;
use crate::types::{NotificationLevel, Outcome, ProcessingMode, Status};
use bytes::Bytes;
use futures::FutureExt;
use serde::Deserialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use super::Uploader;

/// A complete HTTP response from the processing service
#[derive(Clone, Debug)]
pub struct ServiceResponse {
    /// HTTP status code
    pub status: u16,
    /// Full response body
    pub body: Bytes,
}

impl ServiceResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error body shapes the service is known to return
///
/// Covers `{"error": {"code", "message"}}`, `{"error": "..."}`,
/// `{"message": "..."}` and `{"detail": ...}`.
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    error: Option<ErrorField>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Detailed {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Turn a non-2xx response into a [`SubmissionError::Service`]
///
/// Bodies that are not one of the known JSON shapes produce an opaque message
/// naming the HTTP status.
pub(crate) fn parse_service_error(status: u16, body: &[u8]) -> SubmissionError {
    let opaque = || {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown Status");
        format!("service returned HTTP {} {}", status, reason)
    };

    let parsed: Option<ServiceErrorBody> = serde_json::from_slice(body).ok();
    let (code, message) = match parsed {
        Some(body) => {
            let (code, from_error) = match body.error {
                Some(ErrorField::Text(text)) => (None, Some(text)),
                Some(ErrorField::Detailed { code, message }) => (code, message),
                None => (None, None),
            };
            let detail = body.detail.map(|d| match d {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            let message = from_error
                .or(body.message)
                .or(detail)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(opaque);
            (code, message)
        }
        None => {
            tracing::debug!(status, "error body is not JSON");
            (None, opaque())
        }
    };

    SubmissionError::Service {
        status,
        code,
        message,
    }
}

impl Uploader {
    /// Resolve a complete service response for a submission in `mode`
    ///
    /// - non-2xx: failure, every processing record to `error`
    /// - 2xx + local: the body is an archive handed to the archive sink
    /// - 2xx + remote-bucket: the body is a JSON acknowledgment
    pub(crate) async fn resolve(
        &self,
        mode: ProcessingMode,
        response: ServiceResponse,
    ) -> Outcome {
        if !response.is_success() {
            let error = parse_service_error(response.status, &response.body);
            return self.settle_failed(error).await;
        }

        let outcome = match mode {
            ProcessingMode::Local => {
                let bytes = response.body.len() as u64;
                let filename = &self.config.output.archive_filename;
                let save = self.collaborators.archive_sink.save(filename, response.body);
                let message = match AssertUnwindSafe(save).catch_unwind().await {
                    Ok(Ok(path)) => return self.finish(Outcome::Archive { path, bytes }).await,
                    Ok(Err(e)) => e.to_string(),
                    Err(panic) => format!("archive sink panicked: {}", panic_message(&*panic)),
                };
                tracing::error!(error = %message, "failed to save archive");
                Outcome::Failed {
                    error: SubmissionError::Archive { message },
                }
            }
            ProcessingMode::RemoteBucket => match parse_acknowledgment(&response.body) {
                Ok(body) => Outcome::Acknowledged { body },
                Err(e) => Outcome::Failed {
                    error: SubmissionError::Service {
                        status: response.status,
                        code: None,
                        message: format!("invalid acknowledgment body: {}", e),
                    },
                },
            },
        };

        self.finish(outcome).await
    }

    /// Settle a submission that failed before or while talking to the service
    pub(crate) async fn settle_failed(&self, error: SubmissionError) -> Outcome {
        self.finish(Outcome::Failed { error }).await
    }

    /// Settle a cancelled submission
    pub(crate) async fn settle_cancelled(&self) -> Outcome {
        self.finish(Outcome::Cancelled).await
    }

    /// Drive the ledger to the terminal status matching `outcome`, notify once,
    /// and run the reset callback after a success
    async fn finish(&self, outcome: Outcome) -> Outcome {
        let terminal = if outcome.is_success() {
            Status::Success
        } else {
            Status::Error
        };

        let settled = {
            let mut ledger = self.ledger.write().await;
            let ids = ledger.settle(terminal);
            self.emit_status_changes(&ledger, &ids);
            ids.len()
        };

        let (message, level) = notification_for(&outcome, settled);
        guard_collaborator("notification sink", || {
            self.collaborators.notifier.notify(&message, level)
        });

        if outcome.is_success()
            && let Some(reset) = &self.collaborators.on_reset
        {
            guard_collaborator("reset callback", || reset());
        }

        match &outcome {
            Outcome::Failed { error } => tracing::warn!(
                files = settled,
                code = error.error_code(),
                error = %error,
                "batch failed"
            ),
            _ => tracing::debug!(files = settled, outcome = outcome.kind(), "batch settled"),
        }

        outcome
    }
}

/// Run a synchronous collaborator, logging instead of unwinding if it panics
///
/// The ledger is already settled when collaborators run.
fn guard_collaborator(name: &'static str, f: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(f)) {
        tracing::error!(
            collaborator = name,
            panic = %panic_message(&*panic),
            "collaborator panicked"
        );
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn parse_acknowledgment(body: &[u8]) -> serde_json::Result<serde_json::Value> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body)
}

fn notification_for(outcome: &Outcome, files: usize) -> (String, NotificationLevel) {
    let noun = if files == 1 { "file" } else { "files" };
    match outcome {
        Outcome::Archive { path, .. } => (
            format!(
                "Processed {} {}; archive saved to {}",
                files,
                noun,
                path.display()
            ),
            NotificationLevel::Success,
        ),
        Outcome::Acknowledged { .. } => (
            format!("Submitted {} {} for processing", files, noun),
            NotificationLevel::Success,
        ),
        Outcome::Failed { error } => (
            format!("Upload failed: {}", failure_message(error)),
            NotificationLevel::Danger,
        ),
        Outcome::Cancelled => ("Upload cancelled".to_string(), NotificationLevel::Info),
    }
}

fn failure_message(error: &SubmissionError) -> &str {
    match error {
        SubmissionError::Transport { message }
        | SubmissionError::Service { message, .. }
        | SubmissionError::Archive { message }
        | SubmissionError::Internal { message } => message,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_error_body_keeps_code_and_message() {
        let body = br#"{"error": {"code": "bad_format", "message": "Unsupported export type"}}"#;

        assert_eq!(
            parse_service_error(422, body),
            SubmissionError::Service {
                status: 422,
                code: Some("bad_format".into()),
                message: "Unsupported export type".into(),
            }
        );
    }

    #[test]
    fn plain_error_string_is_used_as_message() {
        let err = parse_service_error(400, br#"{"error": "Too many files"}"#);
        assert!(matches!(
            err,
            SubmissionError::Service { code: None, ref message, .. } if message == "Too many files"
        ));
    }

    #[test]
    fn message_and_detail_fields_are_understood() {
        let err = parse_service_error(500, br#"{"message": "bucket unreachable"}"#);
        assert!(matches!(
            err,
            SubmissionError::Service { ref message, .. } if message == "bucket unreachable"
        ));

        let body = br#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#;
        match parse_service_error(422, body) {
            SubmissionError::Service { message, .. } => {
                assert!(message.contains("field required"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_body_becomes_opaque_error() {
        let err = parse_service_error(502, b"<html>Bad Gateway</html>");
        assert_eq!(
            err,
            SubmissionError::Service {
                status: 502,
                code: None,
                message: "service returned HTTP 502 Bad Gateway".into(),
            }
        );
    }

    #[test]
    fn json_without_known_fields_becomes_opaque_error() {
        let err = parse_service_error(500, br#"{"status": "nope"}"#);
        match err {
            SubmissionError::Service { message, .. } => {
                assert_eq!(message, "service returned HTTP 500 Internal Server Error")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_acknowledgment_is_null() {
        assert_eq!(parse_acknowledgment(b"").unwrap(), serde_json::Value::Null);
        assert_eq!(
            parse_acknowledgment(br#"{"uploaded": 3}"#).unwrap()["uploaded"],
            3
        );
        assert!(parse_acknowledgment(b"not json").is_err());
    }

    #[test]
    fn notifications_match_outcome() {
        let (message, level) = notification_for(&Outcome::Cancelled, 3);
        assert_eq!(message, "Upload cancelled");
        assert_eq!(level, NotificationLevel::Info);

        let (message, level) = notification_for(
            &Outcome::Acknowledged {
                body: serde_json::Value::Null,
            },
            1,
        );
        assert_eq!(message, "Submitted 1 file for processing");
        assert_eq!(level, NotificationLevel::Success);

        let (message, level) = notification_for(
            &Outcome::Failed {
                error: SubmissionError::Transport {
                    message: "connection failed".into(),
                },
            },
            2,
        );
        assert_eq!(message, "Upload failed: connection failed");
        assert_eq!(level, NotificationLevel::Danger);
    }
}
