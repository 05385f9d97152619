//! On-demand summary endpoint

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use chrono::Utc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::{SummaryRequest, SummaryResponse};

/// POST /api/summary
///
/// Summarizes every host in hostname order. With `{"deliver": true}` the
/// report is also rendered and mailed, and the outcome is added as `report`.
/// An empty body asks for summaries only; any other body has to be a valid
/// request, whatever its content type.
pub async fn generate_summary(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<SummaryResponse>> {
    let request = parse_request(&body)?;

    let results = state.pipeline.summarize_hosts().await?;

    let report = if request.deliver {
        info!("delivering on-demand report for {} hosts", results.len());
        Some(state.pipeline.deliver(&results, Utc::now()).await)
    } else {
        None
    };

    Ok(Json(SummaryResponse {
        status: "success".to_string(),
        results,
        report,
    }))
}

fn parse_request(body: &[u8]) -> ApiResult<SummaryRequest> {
    if body.trim_ascii().is_empty() {
        return Ok(SummaryRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}
