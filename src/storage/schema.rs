//! Metric record definition
//!
//! One [`MetricRecord`] is one sample of one server at one point in time, as
//! written by the collection agents into the `metrics` table. The digest
//! service never writes these rows; it only reads them.
//!
//! Every gauge is nullable. Agents differ in what they can measure (no disk
//! stats inside some containers, no load averages on Windows hosts) and a
//! missing value must not make the whole row unreadable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column list used by every query
///
/// The casts normalize whatever numeric/timestamp types the table was created
/// with into the types [`MetricRecord`] decodes. They are no-ops when the
/// table was created by our own migration.
pub(crate) const SELECT_COLUMNS: &str = r#"
    "timestamp"::timestamptz AS "timestamp",
    server_hostname,
    cpu_usage::float8 AS cpu_usage,
    cpu_cores::int8 AS cpu_cores,
    cpu_model::text AS cpu_model,
    cpu_speed::float8 AS cpu_speed,
    cpu_load_1m::float8 AS cpu_load_1m,
    cpu_load_5m::float8 AS cpu_load_5m,
    cpu_load_15m::float8 AS cpu_load_15m,
    memory_total::int8 AS memory_total,
    memory_free::int8 AS memory_free,
    memory_used::int8 AS memory_used,
    memory_percentage::float8 AS memory_percentage,
    disk_filesystem::text AS disk_filesystem,
    disk_size::int8 AS disk_size,
    disk_used::int8 AS disk_used,
    disk_available::int8 AS disk_available,
    disk_percentage::float8 AS disk_percentage,
    network_interface::text AS network_interface,
    network_rx_bytes::int8 AS network_rx_bytes,
    network_tx_bytes::int8 AS network_tx_bytes,
    network_rx_rate::float8 AS network_rx_rate,
    network_tx_rate::float8 AS network_tx_rate,
    network_connections::int8 AS network_connections,
    created_at::timestamptz AS created_at
"#;

/// A single row of the `metrics` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricRecord {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,

    /// Host that reported the sample
    pub server_hostname: String,

    // === CPU ===
    /// Average CPU usage across all cores (percentage 0-100)
    pub cpu_usage: Option<f64>,
    pub cpu_cores: Option<i64>,
    pub cpu_model: Option<String>,
    /// Clock speed in GHz
    pub cpu_speed: Option<f64>,
    pub cpu_load_1m: Option<f64>,
    pub cpu_load_5m: Option<f64>,
    pub cpu_load_15m: Option<f64>,

    // === Memory (bytes) ===
    pub memory_total: Option<i64>,
    pub memory_free: Option<i64>,
    pub memory_used: Option<i64>,
    pub memory_percentage: Option<f64>,

    // === Disk (bytes) ===
    pub disk_filesystem: Option<String>,
    pub disk_size: Option<i64>,
    pub disk_used: Option<i64>,
    pub disk_available: Option<i64>,
    pub disk_percentage: Option<f64>,

    // === Network ===
    pub network_interface: Option<String>,
    pub network_rx_bytes: Option<i64>,
    pub network_tx_bytes: Option<i64>,
    /// Receive rate in bytes/sec
    pub network_rx_rate: Option<f64>,
    /// Transmit rate in bytes/sec
    pub network_tx_rate: Option<f64>,
    pub network_connections: Option<i64>,

    /// When the row was inserted (may lag `timestamp`)
    pub created_at: Option<DateTime<Utc>>,
}

impl MetricRecord {
    /// Create a record with only the identifying columns set
    pub fn new(server_hostname: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            server_hostname: server_hostname.into(),
            cpu_usage: None,
            cpu_cores: None,
            cpu_model: None,
            cpu_speed: None,
            cpu_load_1m: None,
            cpu_load_5m: None,
            cpu_load_15m: None,
            memory_total: None,
            memory_free: None,
            memory_used: None,
            memory_percentage: None,
            disk_filesystem: None,
            disk_size: None,
            disk_used: None,
            disk_available: None,
            disk_percentage: None,
            network_interface: None,
            network_rx_bytes: None,
            network_tx_bytes: None,
            network_rx_rate: None,
            network_tx_rate: None,
            network_connections: None,
            created_at: None,
        }
    }

    /// Memory in use as a percentage, derived from totals when the agent
    /// didn't report it directly
    pub fn memory_usage_percent(&self) -> Option<f64> {
        self.memory_percentage.or_else(|| match (self.memory_used, self.memory_total) {
            (Some(used), Some(total)) if total > 0 => Some(used as f64 / total as f64 * 100.0),
            _ => None,
        })
    }
}
