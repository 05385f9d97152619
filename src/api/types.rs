//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::pipeline::{DeliveryOutcome, HostSummary};

/// Optional body of `POST /api/summary`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryRequest {
    /// Also render and email the report
    #[serde(default)]
    pub deliver: bool,
}

/// Response of `POST /api/summary`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryResponse {
    pub status: String,
    pub results: Vec<HostSummary>,

    /// Present only when delivery was requested
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub report: Option<DeliveryOutcome>,
}

/// Store reachability as reported by `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
}

/// Response of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,

    /// Next scheduled report (RFC 3339), if the scheduler runs
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_report: Option<String>,
}
