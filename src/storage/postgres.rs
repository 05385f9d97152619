//! PostgreSQL metrics store
//!
//! Reads the `metrics` table that the collection agents write into.
//!
//! ## Connection Handling
//!
//! The store wraps a lazily-connected sqlx pool. Constructing the store does
//! no I/O; the first query opens the connection, and concurrent first
//! queries wait on the pool instead of racing to connect. The pool is capped
//! at a single connection by default, matching the one-request-at-a-time
//! shape of the report pipeline.
//!
//! ## Limitations
//!
//! - **No retries**: a failed query is reported once and the caller decides
//! - **Read-only**: the only write path is the optional migration

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, MetricsStore, window_start};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricRecord, SELECT_COLUMNS};
use crate::config::DatabaseConfig;

/// PostgreSQL-backed metrics store
pub struct PostgresStore {
    pool: PgPool,
    target: String,
}

impl PostgresStore {
    /// Create a store from the database configuration
    ///
    /// No connection is opened until the first query.
    pub fn new(config: &DatabaseConfig) -> Self {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .database(&config.name);

        if let Some(password) = &config.password {
            options = options.password(password.expose());
        }

        // The agents' database uses a self-signed certificate; encrypt
        // without verifying it.
        options = options.ssl_mode(if config.ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        });

        let target = format!("{}:{}/{}", config.host, config.port, config.name);

        Self::from_options(options, config.max_connections, config.connect_timeout, target)
    }

    /// Create a store from explicit sqlx connect options
    pub fn from_options(
        options: PgConnectOptions,
        max_connections: u32,
        connect_timeout: Duration,
        target: String,
    ) -> Self {
        info!("metrics store configured for {target} (connects on first query)");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(connect_timeout)
            .connect_lazy_with(options);

        Self { pool, target }
    }

    /// Create the `metrics` table and its index if they don't exist yet
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn migrate(&self) -> StorageResult<()> {
        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations complete");
        Ok(())
    }

    fn select() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM metrics"))
    }

    async fn fetch(&self, mut query: QueryBuilder<'_, Postgres>) -> StorageResult<Vec<MetricRecord>> {
        query.push(r#" ORDER BY "timestamp" ASC"#);

        let rows = query
            .build_query_as::<MetricRecord>()
            .fetch_all(&self.pool)
            .await?;

        debug!("query returned {} rows", rows.len());
        Ok(rows)
    }
}

#[async_trait]
impl MetricsStore for PostgresStore {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> StorageResult<Vec<MetricRecord>> {
        self.fetch(Self::select()).await
    }

    #[instrument(skip(self))]
    async fn fetch_recent(&self, window_days: u32) -> StorageResult<Vec<MetricRecord>> {
        let mut query = Self::select();
        query
            .push(r#" WHERE "timestamp" >= "#)
            .push_bind(window_start(window_days));

        self.fetch(query).await
    }

    #[instrument(skip(self))]
    async fn fetch_by_host(&self, hostname: &str) -> StorageResult<Vec<MetricRecord>> {
        let mut query = Self::select();
        query
            .push(" WHERE server_hostname = ")
            .push_bind(hostname.to_string());

        self.fetch(query).await
    }

    #[instrument(skip(self))]
    async fn fetch_recent_by_host(
        &self,
        hostname: &str,
        window_days: u32,
    ) -> StorageResult<Vec<MetricRecord>> {
        let mut query = Self::select();
        query
            .push(r#" WHERE "timestamp" >= "#)
            .push_bind(window_start(window_days))
            .push(" AND server_hostname = ")
            .push_bind(hostname.to_string());

        self.fetch(query).await
    }

    #[instrument(skip(self))]
    async fn list_hostnames(&self) -> StorageResult<Vec<String>> {
        let hostnames: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT server_hostname FROM metrics ORDER BY server_hostname ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("found {} hostnames", hostnames.len());
        Ok(hostnames)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // Simple ping query to verify the connection
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "PostgreSQL store operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "postgres".to_string()),
                    ("target".to_string(), self.target.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::from([("backend".to_string(), "postgres".to_string())]),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing PostgreSQL store");
        self.pool.close().await;
        Ok(())
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("target", &self.target)
            .finish()
    }
}

/// Parse a `postgres://` connection URL into connect options
pub fn parse_url(url: &str) -> StorageResult<PgConnectOptions> {
    url.parse::<PgConnectOptions>()
        .map_err(|e| StorageError::InvalidConfig(e.to_string()))
}
