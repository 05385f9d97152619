//! In-memory metrics store (no persistence)
//!
//! This store keeps metric records in a vector in memory.
//! It's useful for:
//! - Testing the pipeline without a database
//! - Local runs against a fixture file of records
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Linear scans**: Every query walks the whole table

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, MetricsStore, window_start};
use super::error::StorageResult;
use super::schema::MetricRecord;

/// In-memory metrics store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<MetricRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with records
    pub fn with_records(records: Vec<MetricRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Append records to the store
    pub async fn insert(&self, records: impl IntoIterator<Item = MetricRecord>) {
        self.records.write().await.extend(records);
    }

    async fn select(&self, filter: impl Fn(&MetricRecord) -> bool) -> Vec<MetricRecord> {
        let mut rows: Vec<MetricRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| filter(record))
            .cloned()
            .collect();

        // stable, so rows with equal timestamps keep insertion order
        rows.sort_by_key(|record| record.timestamp);
        rows
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn fetch_all(&self) -> StorageResult<Vec<MetricRecord>> {
        Ok(self.select(|_| true).await)
    }

    async fn fetch_recent(&self, window_days: u32) -> StorageResult<Vec<MetricRecord>> {
        let since = window_start(window_days);
        Ok(self.select(|record| record.timestamp >= since).await)
    }

    async fn fetch_by_host(&self, hostname: &str) -> StorageResult<Vec<MetricRecord>> {
        debug!("querying in-memory store for {}", hostname);
        Ok(self.select(|record| record.server_hostname == hostname).await)
    }

    async fn fetch_recent_by_host(
        &self,
        hostname: &str,
        window_days: u32,
    ) -> StorageResult<Vec<MetricRecord>> {
        let since = window_start(window_days);
        Ok(self
            .select(|record| record.server_hostname == hostname && record.timestamp >= since)
            .await)
    }

    async fn list_hostnames(&self) -> StorageResult<Vec<String>> {
        let hostnames: BTreeSet<String> = self
            .records
            .read()
            .await
            .iter()
            .map(|record| record.server_hostname.clone())
            .collect();

        Ok(hostnames.into_iter().collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let total = self.records.read().await.len();
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory store operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_records".to_string(), total.to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
