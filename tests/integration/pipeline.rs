//! Integration tests for the report pipeline
//!
//! These tests drive the pipeline directly, the way the scheduler does:
//! - Only the configured window of metrics reaches the prompt
//! - Hosts without recent samples skip the summarization call
//! - Rendering output lands on disk and is attached to the mail

use std::sync::Arc;

use metrics_digest::{
    mail::ReportAttachment,
    pipeline::{PipelineError, Trigger},
    prompt::{PromptBuilder, Truncation},
    report::ReportOutput,
    storage::memory::MemoryStore,
};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_stale_samples_are_outside_the_window() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("CPU Usage: 99%"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_json("stale!")))
        .expect(0)
        .mount(&llm)
        .await;
    mock_summary_for(&llm, "web-01", "recent only").await;

    let mut records = create_test_records("web-01", 2);
    records.push(create_stale_record("web-01"));
    records.push(create_stale_record("old-01"));

    let pipeline = create_test_pipeline(
        Arc::new(MemoryStore::with_records(records)),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );

    let results = pipeline.summarize_hosts().await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].hostname, "old-01");
    assert!(results[0].summary.starts_with("No metrics were recorded for old-01"));
    assert_eq!(results[1].hostname, "web-01");
    assert_eq!(results[1].summary, "recent only");

    // only web-01 reached the endpoint
    assert_eq!(llm.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_prompt_respects_row_cap() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "capped").await;

    let pipeline = Arc::try_unwrap(create_test_pipeline(
        Arc::new(MemoryStore::with_records(create_test_records("web-01", 50))),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    ))
    .unwrap()
    .with_prompts(PromptBuilder::new(10, Truncation::NewestFirst));

    let summary = pipeline.summarize_host("web-01").await;
    assert_eq!(summary.summary, "capped");

    let requests = llm.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert_eq!(body.matches("Server Hostname: web-01").count(), 10);
    // newest sample survives the cap
    assert!(body.contains("CPU Usage: 69%"));
    assert!(!body.contains("CPU Usage: 20%"));
}

#[tokio::test]
async fn test_broken_store_means_no_hosts() {
    let llm = MockServer::start().await;
    let pipeline = create_test_pipeline(
        Arc::new(BrokenStore),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );

    assert_eq!(
        pipeline.run_report(Trigger::Scheduled).await.unwrap_err(),
        PipelineError::NoHostnames
    );
}

#[tokio::test]
async fn test_run_report_writes_and_attaches_files() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "All good on web-01.").await;

    let reports = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = create_test_pipeline(
        Arc::new(MemoryStore::with_records(create_test_records("web-01", 4))),
        &llm,
        notifier.clone(),
        ReportOutput::Directory(reports.path().join("reports")),
    );

    let outcome = pipeline.run_report(Trigger::Scheduled).await.unwrap();

    assert_eq!(outcome.trigger, Trigger::Scheduled);
    assert!(outcome.delivery.delivered);
    assert!(outcome.delivery.pdf_attached);

    let html_path = outcome.delivery.html_path.unwrap();
    let pdf_path = outcome.delivery.pdf_path.unwrap();
    let html = std::fs::read_to_string(&html_path).unwrap();
    assert!(html.contains("All good on web-01."));
    assert!(std::fs::read(&pdf_path).unwrap().starts_with(b"%PDF"));

    let file_name = std::path::Path::new(&pdf_path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(file_name.starts_with("server-metrics-report-"));
    assert!(!file_name.contains(':'));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].attachment,
        Some(ReportAttachment::File(pdf_path.into()))
    );
}

#[tokio::test]
async fn test_memory_output_attaches_inline_pdf() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "fine").await;

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = create_test_pipeline(
        Arc::new(MemoryStore::with_records(create_test_records("web-01", 1))),
        &llm,
        notifier.clone(),
        ReportOutput::Memory,
    );

    let outcome = pipeline.run_report(Trigger::Manual).await.unwrap();
    assert!(outcome.delivery.pdf_path.is_none());
    assert!(outcome.delivery.pdf_attached);

    let sent = notifier.sent();
    match &sent[0].attachment {
        Some(ReportAttachment::Inline { filename, content }) => {
            assert!(filename.ends_with(".pdf"));
            assert!(content.starts_with(b"%PDF"));
        }
        other => panic!("expected inline PDF, got {other:?}"),
    }
}
