//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Summaries come back in hostname order, one per host
//! - A failed summary degrades to the fallback text without failing the request
//! - Delivery is opt-in and its outcome is reported
//! - Error bodies have the documented shape

use std::sync::Arc;

use axum::http::StatusCode;
use metrics_digest::{
    api::routes::BANNER,
    mail::ReportAttachment,
    report::ReportOutput,
    storage::memory::MemoryStore,
    summarize::FALLBACK_SUMMARY,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn two_host_store() -> Arc<MemoryStore> {
    let mut records = create_test_records("web-01", 3);
    records.extend(create_test_records("db-01", 2));
    Arc::new(MemoryStore::with_records(records))
}

#[tokio::test]
async fn test_root_banner() {
    let llm = MockServer::start().await;
    let pipeline = create_test_pipeline(
        Arc::new(MemoryStore::new()),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), BANNER);
}

#[tokio::test]
async fn test_summary_for_every_host_in_order() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "web-01 is healthy").await;
    mock_summary_for(&llm, "db-01", "db-01 needs disk space").await;

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = create_test_pipeline(two_host_store(), &llm, notifier.clone(), ReportOutput::Memory);
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(
        json,
        json!({
            "status": "success",
            "results": [
                {"hostname": "db-01", "summary": "db-01 needs disk space"},
                {"hostname": "web-01", "summary": "web-01 is healthy"}
            ]
        })
    );

    // no delivery unless asked for
    assert!(notifier.sent().is_empty());
    assert_eq!(llm.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_hostnames_is_404() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_json("unused")))
        .expect(0)
        .mount(&llm)
        .await;

    let pipeline = create_test_pipeline(
        Arc::new(MemoryStore::new()),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json, json!({"error": "No hostnames found."}));
}

#[tokio::test]
async fn test_unreachable_store_is_404() {
    let llm = MockServer::start().await;
    let pipeline = create_test_pipeline(
        Arc::new(BrokenStore),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upstream_failure_degrades_one_host() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "web-01 is healthy").await;
    Mock::given(method("POST"))
        .and(body_string_contains("Server Hostname: db-01"))
        .respond_with(ResponseTemplate::new(500).set_body_string("deployment overloaded"))
        .mount(&llm)
        .await;

    let pipeline = create_test_pipeline(
        two_host_store(),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["results"][0]["hostname"], "db-01");
    assert_eq!(json["results"][0]["summary"], FALLBACK_SUMMARY);
    assert!(json["results"][0]["error"].as_str().unwrap().contains("500"));
    assert_eq!(json["results"][1]["summary"], "web-01 is healthy");
    assert!(json["results"][1].get("error").is_none());
}

#[tokio::test]
async fn test_deliver_renders_and_mails_report() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "## Overall Health\nweb-01 is **healthy**").await;
    mock_summary_for(&llm, "db-01", "db-01 needs disk space").await;

    let reports = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = create_test_pipeline(
        two_host_store(),
        &llm,
        notifier.clone(),
        ReportOutput::Directory(reports.path().to_path_buf()),
    );
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .json(&json!({"deliver": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(json["report"]["delivered"], true);
    assert_eq!(json["report"]["pdf_attached"], true);

    let pdf_path = json["report"]["pdf_path"].as_str().unwrap();
    assert!(pdf_path.ends_with(".pdf"));
    assert!(std::path::Path::new(pdf_path).starts_with(reports.path()));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("Weekly Server Metrics Report"));
    assert!(sent[0].text.contains("## Host: db-01"));
    assert!(sent[0].html.contains("<strong>healthy</strong>"));
    assert_eq!(
        sent[0].attachment,
        Some(ReportAttachment::File(pdf_path.into()))
    );
}

#[tokio::test]
async fn test_delivery_failure_is_reported_not_raised() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "fine").await;
    mock_summary_for(&llm, "db-01", "fine").await;

    let pipeline = create_test_pipeline(
        two_host_store(),
        &llm,
        Arc::new(UnreachableRelay),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .json(&json!({"deliver": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["report"]["delivered"], false);
    assert!(json["report"]["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_json("unused")))
        .expect(0)
        .mount(&llm)
        .await;

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = create_test_pipeline(two_host_store(), &llm, notifier.clone(), ReportOutput::Memory);
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .json(&json!({"deliver": "yes"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: Value = response.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_deliver_without_content_type_still_delivers() {
    let llm = MockServer::start().await;
    mock_summary_for(&llm, "web-01", "fine").await;
    mock_summary_for(&llm, "db-01", "fine").await;

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = create_test_pipeline(two_host_store(), &llm, notifier.clone(), ReportOutput::Memory);
    let addr = spawn_test_api(pipeline).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/summary"))
        .body(r#"{"deliver": true}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["report"]["delivered"], true);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_health_reports_store_status() {
    let llm = MockServer::start().await;

    let healthy = create_test_pipeline(
        two_host_store(),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(healthy).await;

    let json: Value = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"]["healthy"], true);
    assert!(json["timestamp"].is_string());

    let broken = create_test_pipeline(
        Arc::new(BrokenStore),
        &llm,
        Arc::new(RecordingNotifier::default()),
        ReportOutput::Memory,
    );
    let addr = spawn_test_api(broken).await;

    let response = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["storage"]["healthy"], false);
}
