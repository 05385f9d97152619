pub mod actors;
pub mod api;
pub mod config;
pub mod mail;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod storage;
pub mod summarize;
pub mod util;

pub use pipeline::{HostSummary, ReportPipeline, Trigger};
pub use storage::MetricRecord;
