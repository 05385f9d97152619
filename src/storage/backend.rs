//! Metrics store trait definition
//!
//! This module defines the `MetricsStore` trait that every store
//! implementation must provide.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::error::StorageResult;
use super::schema::MetricRecord;

/// Health status of the metrics store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the store reachable?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional store-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Start of a trailing window of `window_days` days ending now
///
/// Windows reaching past the earliest representable instant start there.
pub fn window_start(window_days: u32) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Read access to the `metrics` table
///
/// The store owns its connection handle. It is created once at startup and
/// shared by reference (`Arc<dyn MetricsStore>`) with every caller, so there
/// is never more than one handle per process.
///
/// ## Ordering
///
/// Every fetch returns rows ordered by timestamp (oldest first).
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Callers in the report pipeline log the
/// error and carry on with an empty result.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Fetch every row in the table
    async fn fetch_all(&self) -> StorageResult<Vec<MetricRecord>>;

    /// Fetch rows sampled within the last `window_days` days
    async fn fetch_recent(&self, window_days: u32) -> StorageResult<Vec<MetricRecord>>;

    /// Fetch every row reported by `hostname`
    async fn fetch_by_host(&self, hostname: &str) -> StorageResult<Vec<MetricRecord>>;

    /// Fetch rows reported by `hostname` within the last `window_days` days
    ///
    /// This is the query the weekly report runs for each host.
    async fn fetch_recent_by_host(
        &self,
        hostname: &str,
        window_days: u32,
    ) -> StorageResult<Vec<MetricRecord>>;

    /// List the distinct hostnames present in the table, sorted ascending
    async fn list_hostnames(&self) -> StorageResult<Vec<String>>;

    /// Check store health
    ///
    /// Performs a lightweight round trip to verify the store is reachable.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the store and release its connection
    async fn close(&self) -> StorageResult<()>;
}
