//! API error types and conversions

use std::any::Any;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::pipeline::PipelineError;
use crate::util;

/// Body of every unexpected failure
pub const GENERIC_FAILURE: &str = "Failed to generate summary and recommendations.";

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Request could not be understood
    BadRequest(String),

    /// Resource not found
    NotFound(String),

    /// Internal server error
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoHostnames => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("request failed: {err:#}");
        ApiError::Internal(GENERIC_FAILURE.to_string())
    }
}

/// Turn a handler panic into the generic 500 response
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("request handler panicked: {}", util::panic_message(&*panic));

    ApiError::Internal(GENERIC_FAILURE.to_string()).into_response()
}
