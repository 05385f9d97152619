//! Helper functions for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics_digest::{
    api::{ApiConfig, ApiState, spawn_api_server},
    mail::{Confirmation, DeliveryError, Notifier, OutgoingMail},
    pipeline::ReportPipeline,
    report::{ReportOutput, ReportRenderer},
    storage::{HealthStatus, MetricRecord, MetricsStore, StorageError, StorageResult},
    summarize::AzureOpenAiClient,
};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `count` half-hourly samples for `host`, the newest one an hour ago
pub fn create_test_records(host: &str, count: usize) -> Vec<MetricRecord> {
    let newest = Utc::now() - Duration::hours(1);
    (0..count)
        .map(|i| {
            let mut record =
                MetricRecord::new(host, newest - Duration::minutes(30 * (count - 1 - i) as i64));
            record.cpu_usage = Some(20.0 + i as f64);
            record.memory_total = Some(16_000_000_000);
            record.memory_used = Some(8_000_000_000);
            record.disk_percentage = Some(61.0);
            record
        })
        .collect()
}

/// A sample from well outside the default seven-day window
pub fn create_stale_record(host: &str) -> MetricRecord {
    let mut record = MetricRecord::new(host, Utc::now() - Duration::days(30));
    record.cpu_usage = Some(99.0);
    record
}

/// Chat-completions body with a single choice
pub fn completion_json(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}

/// Answer prompts about `hostname` with `summary`
pub async fn mock_summary_for(server: &MockServer, hostname: &str, summary: &str) {
    Mock::given(method("POST"))
        .and(body_string_contains(format!("Server Hostname: {hostname}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_json(summary)))
        .mount(server)
        .await;
}

/// Notifier that keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, mail: &OutgoingMail) -> Result<Confirmation, DeliveryError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(Confirmation {
            message_id: "<recorded@example.com>".to_string(),
            response: "250 OK".to_string(),
        })
    }
}

/// Notifier whose relay is always down
pub struct UnreachableRelay;

#[async_trait]
impl Notifier for UnreachableRelay {
    async fn send(&self, _mail: &OutgoingMail) -> Result<Confirmation, DeliveryError> {
        Err(DeliveryError::Transport("connection refused".to_string()))
    }
}

/// Store whose database is unreachable
pub struct BrokenStore;

#[async_trait]
impl MetricsStore for BrokenStore {
    async fn fetch_all(&self) -> StorageResult<Vec<MetricRecord>> {
        Err(StorageError::ConnectionFailed("database is down".to_string()))
    }

    async fn fetch_recent(&self, _window_days: u32) -> StorageResult<Vec<MetricRecord>> {
        Err(StorageError::ConnectionFailed("database is down".to_string()))
    }

    async fn fetch_by_host(&self, _hostname: &str) -> StorageResult<Vec<MetricRecord>> {
        Err(StorageError::ConnectionFailed("database is down".to_string()))
    }

    async fn fetch_recent_by_host(
        &self,
        _hostname: &str,
        _window_days: u32,
    ) -> StorageResult<Vec<MetricRecord>> {
        Err(StorageError::ConnectionFailed("database is down".to_string()))
    }

    async fn list_hostnames(&self) -> StorageResult<Vec<String>> {
        Err(StorageError::ConnectionFailed("database is down".to_string()))
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Err(StorageError::ConnectionFailed("database is down".to_string()))
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Pipeline against a mocked summarization endpoint
pub fn create_test_pipeline(
    store: Arc<dyn MetricsStore>,
    llm: &MockServer,
    notifier: Arc<dyn Notifier>,
    output: ReportOutput,
) -> Arc<ReportPipeline> {
    let summarizer = AzureOpenAiClient::with_endpoint(
        format!("{}/openai/deployments/gpt/chat/completions", llm.uri()),
        "test-key",
    );

    Arc::new(ReportPipeline::new(
        store,
        Arc::new(summarizer),
        notifier,
        ReportRenderer::new(output),
    ))
}

/// Serve `pipeline` on a random local port
pub async fn spawn_test_api(pipeline: Arc<ReportPipeline>) -> SocketAddr {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
    };

    let (addr, _server) = spawn_api_server(config, ApiState::new(pipeline), std::future::pending())
        .await
        .unwrap();

    // Give server time to start
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    addr
}
