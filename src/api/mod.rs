//! HTTP entry point
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Shared pipeline** behind `Arc`, the same one the scheduler drives
//! - **Panics** in handlers become a generic 500 instead of killing the task
//!
//! ## Endpoints
//!
//! - `GET /` - Liveness banner
//! - `GET /api/health` - Store reachability and next scheduled report
//! - `POST /api/summary` - Summarize every host, optionally mail the report

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, SummaryRequest, SummaryResponse};

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:3000")
    pub bind_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], crate::util::DEFAULT_PORT)),
        }
    }
}

impl From<&ServerConfig> for ApiConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            bind_addr: SocketAddr::new(config.bind_addr, config.port),
        }
    }
}

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/api/health", get(routes::health::health_check))
        .route("/api/summary", post(routes::summary::generate_summary))
        .with_state(state)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task that stops accepting
/// connections once `shutdown` resolves. Returns the server's local address
/// and the task to await for a clean exit.
pub async fn spawn_api_server(
    config: ApiConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    // Spawn server in background
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("API server error: {}", e);
        }
        info!("API server stopped");
    });

    Ok((addr, task))
}
