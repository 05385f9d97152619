//! Prompt construction
//!
//! Flattens metric records into the text block the summarization endpoint
//! receives. The number of embedded records is capped so a busy host can't
//! blow past the endpoint's context window; which records survive the cap is
//! an explicit [`Truncation`] policy rather than an implicit slice.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::storage::MetricRecord;

/// System message sent alongside every prompt
pub const SYSTEM_MESSAGE: &str = "You are an assistant that analyzes raw server health data and provides optimization recommendations.";

/// Placeholder in the template that receives the metrics block
pub const METRICS_PLACEHOLDER: &str = "{metrics}";

/// Instructional template, `{metrics}` is replaced with the flattened records
pub const DEFAULT_TEMPLATE: &str = r#"You are a server performance assistant specialized in infrastructure optimization. I am providing you with detailed server health metrics collected every 30 minutes over a one-week period for the following server. Please analyze this data and provide the following:

1. **Comprehensive Summary**:
  - **Overall Health**: Provide a high-level overview of the server's overall health and performance.
  - **Key Trends**: Summarize the key trends observed in the metrics, including daily/weekly variations in resource usage.
  - **Critical Usage Peaks**: Highlight any critical peaks in CPU, memory, disk, or network usage that may require attention.
  - **Stability Assessment**: Assess the stability of the server performance over the given period. Are there noticeable fluctuations or consistent resource exhaustion?

2. **Anomalies & Issues**:
  - **Spikes & Drops**: Identify any sudden spikes or drops in resource usage (CPU, memory, disk, network) and their potential causes.
  - **Correlated Anomalies**: Correlate anomalies across multiple metrics (e.g., a CPU spike with a memory usage increase). Are there any patterns or repeated events?
  - **Threshold Approaching**: Identify any metrics that are approaching critical thresholds (e.g., CPU usage over 80%, memory over 90%, disk nearing full capacity).
  - **Abnormal Network Activity**: Look for unusual network activity, like spikes in incoming/outgoing traffic or too many network connections.

3. **Root Cause Diagnosis**:
  - **Pattern Analysis**: Based on the metrics, what could be the root causes of performance issues? Are there any recurring patterns that point to potential problems (e.g., high load at specific times)?
  - **Scheduled Jobs or Traffic Impact**: Could scheduled jobs or heavy network traffic be causing temporary performance degradation?
  - **Application vs. Infrastructure**: Do the metrics suggest issues at the application level (e.g., inefficient code) or infrastructure level (e.g., insufficient resources)?
  - **Critical Events**: Are there any isolated critical events or recurring issues that need further investigation?

4. **Actionable Recommendations**:
  - **Short-Term Recommendations**: Provide immediate fixes or actions to address any current performance issues.
  - **Medium-Term Optimizations**: Suggest optimizations for resource utilization, such as optimizing memory management, disk cleanup, or network traffic handling.
  - **Long-Term Strategies**: Recommend long-term strategies for server scaling, load balancing, and infrastructure upgrades.
  - **Monitoring Improvements**: Suggest additional metrics that should be monitored to provide better visibility into server health.
  - **Alerting Setup**: Advise on setting up performance alerts for critical thresholds, such as when CPU usage exceeds 85%, memory exceeds 80%, or disk usage hits 90%.

Raw Server Metrics:
{metrics}

Please provide a detailed and structured response with specific numerical thresholds in your recommendations, and prioritize suggestions based on severity and potential impact. Ensure clarity in your insights and offer actionable next steps for each area of improvement."#;

/// Which records survive when there are more than the cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Truncation {
    /// Keep the first N records in query order (oldest first)
    #[default]
    OldestFirst,

    /// Keep the last N records, still emitted oldest first
    NewestFirst,
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truncation::OldestFirst => write!(f, "oldest-first"),
            Truncation::NewestFirst => write!(f, "newest-first"),
        }
    }
}

impl FromStr for Truncation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest-first" | "oldest" | "first" => Ok(Truncation::OldestFirst),
            "newest-first" | "newest" | "last" => Ok(Truncation::NewestFirst),
            other => Err(format!(
                "unknown truncation policy '{other}' (expected oldest-first or newest-first)"
            )),
        }
    }
}

/// A generated prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Full user message
    pub text: String,

    /// Records embedded in `text`
    pub included: usize,

    /// Records left out because of the cap
    pub dropped: usize,
}

/// Builds prompts from metric records
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    row_cap: usize,
    truncation: Truncation,
    template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(crate::util::DEFAULT_ROW_CAP, Truncation::default())
    }
}

impl PromptBuilder {
    pub fn new(row_cap: usize, truncation: Truncation) -> Self {
        Self {
            row_cap,
            truncation,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Replace the instructional template
    ///
    /// If the template has no `{metrics}` placeholder the block is appended.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Flatten `records` (oldest first) into a prompt
    pub fn build(&self, records: &[MetricRecord]) -> Prompt {
        let selected = self.select(records);
        let dropped = records.len() - selected.len();

        if dropped > 0 {
            warn!(
                "prompt capped at {} of {} records ({} policy)",
                selected.len(),
                records.len(),
                self.truncation
            );
        }

        let mut block = String::new();
        if selected.is_empty() {
            block.push_str("\nNo samples were recorded in this period.\n");
        }
        for record in selected {
            block.push_str(&format_record(record));
        }

        let text = if self.template.contains(METRICS_PLACEHOLDER) {
            self.template.replace(METRICS_PLACEHOLDER, &block)
        } else {
            format!("{}\n\nRaw Server Metrics:\n{}", self.template, block)
        };

        debug!("built prompt with {} records ({} chars)", selected.len(), text.len());

        Prompt {
            text,
            included: selected.len(),
            dropped,
        }
    }

    fn select<'a>(&self, records: &'a [MetricRecord]) -> &'a [MetricRecord] {
        let keep = records.len().min(self.row_cap);
        match self.truncation {
            Truncation::OldestFirst => &records[..keep],
            Truncation::NewestFirst => &records[records.len() - keep..],
        }
    }
}

/// Value or `n/a`
struct Gauge<'a, T>(&'a Option<T>);

impl<T: fmt::Display> fmt::Display for Gauge<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("n/a"),
        }
    }
}

fn format_record(r: &MetricRecord) -> String {
    let created_at = r
        .created_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "
Timestamp: {}
Server Hostname: {}
CPU Usage: {}%
CPU Cores: {}
CPU Model: {}
CPU Speed: {} GHz
CPU Load (1m): {}
CPU Load (5m): {}
CPU Load (15m): {}
Memory Total: {} bytes
Memory Free: {} bytes
Memory Used: {} bytes
Memory Percentage: {}%
Disk Filesystem: {}
Disk Size: {} bytes
Disk Used: {} bytes
Disk Available: {} bytes
Disk Percentage: {}%
Network Interface: {}
Network RX Bytes: {} bytes
Network TX Bytes: {} bytes
Network RX Rate: {} bytes/sec
Network TX Rate: {} bytes/sec
Network Connections: {}
Created At: {}
",
        r.timestamp.to_rfc3339(),
        r.server_hostname,
        Gauge(&r.cpu_usage),
        Gauge(&r.cpu_cores),
        Gauge(&r.cpu_model),
        Gauge(&r.cpu_speed),
        Gauge(&r.cpu_load_1m),
        Gauge(&r.cpu_load_5m),
        Gauge(&r.cpu_load_15m),
        Gauge(&r.memory_total),
        Gauge(&r.memory_free),
        Gauge(&r.memory_used),
        Gauge(&r.memory_usage_percent()),
        Gauge(&r.disk_filesystem),
        Gauge(&r.disk_size),
        Gauge(&r.disk_used),
        Gauge(&r.disk_available),
        Gauge(&r.disk_percentage),
        Gauge(&r.network_interface),
        Gauge(&r.network_rx_bytes),
        Gauge(&r.network_tx_bytes),
        Gauge(&r.network_rx_rate),
        Gauge(&r.network_tx_rate),
        Gauge(&r.network_connections),
        created_at,
    )
}
