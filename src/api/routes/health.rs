//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::api::state::ApiState;
use crate::api::types::{HealthResponse, StorageHealth};

/// GET /api/health
///
/// Always 200; an unreachable store turns the status to `degraded`.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let storage = match state.pipeline.store().health_check().await {
        Ok(status) => StorageHealth {
            healthy: status.healthy,
            message: status.message,
        },
        Err(e) => StorageHealth {
            healthy: false,
            message: e.to_string(),
        },
    };

    let next_report = match &state.scheduler {
        Some(scheduler) => scheduler.next_run().await.map(|t| t.to_rfc3339()),
        None => None,
    };

    Json(HealthResponse {
        status: if storage.healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage,
        next_report,
    })
}
