use super::test_helpers::{TestUploader, create_test_uploader, sample_files};
use super::*;
use crate::error::{SubmissionError, ValidationError};
use crate::types::{
    BatchRequest, Destination, ExportFormat, NotificationLevel, Outcome, ProcessingMode,
    SelectedFile, Status,
};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// Mount a single POST /process responder
async fn mount_response(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Multipart bodies of every request the mock server received
async fn sent_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect()
}

/// Statuses of every record in selection order
async fn statuses(t: &TestUploader) -> Vec<Status> {
    t.uploader
        .records()
        .await
        .iter()
        .map(|r| r.status)
        .collect()
}

fn bucket_request() -> BatchRequest {
    BatchRequest::remote_bucket(
        ExportFormat::Webp,
        Destination::new("media-archive", "2024/holiday"),
    )
}
