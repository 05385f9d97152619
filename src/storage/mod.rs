//! Metrics store access
//!
//! This module provides a trait-based abstraction over the table of server
//! metrics the report is built from.
//!
//! ## Design
//!
//! - **Trait-based**: `MetricsStore` trait allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Single handle**: the store owns its connection and is shared by `Arc`
//!
//! ## Stores
//!
//! - **PostgreSQL** (default): the table the collection agents write into
//! - **In-Memory**: no persistence, for tests and local runs
//!
//! ## Usage
//!
//! ```no_run
//! use metrics_digest::config::DatabaseConfig;
//! use metrics_digest::storage::{MetricsStore, postgres::PostgresStore};
//!
//! # async fn example(config: DatabaseConfig) -> anyhow::Result<()> {
//! let store = PostgresStore::new(&config);
//! let hostnames = store.list_hostnames().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use backend::{HealthStatus, MetricsStore};
pub use error::{StorageError, StorageResult};
pub use schema::MetricRecord;
