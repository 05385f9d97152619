//! The report pipeline
//!
//! Lists hostnames, summarizes each host in turn, then renders and mails the
//! combined report. Both the HTTP endpoint and the weekly scheduler drive the
//! same [`ReportPipeline`].
//!
//! ## Failure Policy
//!
//! Only "there is nothing to report on" is an error. Everything else degrades:
//!
//! - a store failure is logged and treated as an empty result
//! - a failed summary becomes [`FALLBACK_SUMMARY`] for that host
//! - a failed PDF means the mail goes out without an attachment
//! - a failed send is recorded as `delivered: false`

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::mail::{Notifier, OutgoingMail, ReportAttachment};
use crate::prompt::PromptBuilder;
use crate::report::{report_file_stem, ReportRenderer, REPORT_TITLE};
use crate::storage::MetricsStore;
use crate::summarize::{Summarizer, FALLBACK_SUMMARY};

/// Errors that stop a report run
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No hostnames found.")]
    NoHostnames,
}

/// What caused a report run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Scheduled,
    Manual,
    Api,
}

/// Summary for a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub hostname: String,
    pub summary: String,

    /// Why the fallback text was used, if it was
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// How delivery of a rendered report went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub pdf_attached: bool,
    pub html_path: Option<String>,
    pub pdf_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Result of a full report run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub trigger: Trigger,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<HostSummary>,
    pub delivery: DeliveryOutcome,
}

/// Summarizes, renders and delivers server reports
pub struct ReportPipeline {
    store: Arc<dyn MetricsStore>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Arc<dyn Notifier>,
    prompts: PromptBuilder,
    renderer: ReportRenderer,
    window_days: u32,
}

impl std::fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("prompts", &self.prompts)
            .field("renderer", &self.renderer)
            .field("window_days", &self.window_days)
            .finish_non_exhaustive()
    }
}

impl ReportPipeline {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<dyn Notifier>,
        renderer: ReportRenderer,
    ) -> Self {
        Self {
            store,
            summarizer,
            notifier,
            prompts: PromptBuilder::default(),
            renderer,
            window_days: crate::util::DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Days of metrics each summary covers
    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    /// Distinct hostnames, or an empty list if the store failed
    pub async fn hostnames(&self) -> Vec<String> {
        match self.store.list_hostnames().await {
            Ok(hostnames) => hostnames,
            Err(e) => {
                error!("Error fetching unique hostnames: {e}");
                Vec::new()
            }
        }
    }

    /// Summarize every known host, one request at a time, in hostname order
    #[instrument(skip(self))]
    pub async fn summarize_hosts(&self) -> Result<Vec<HostSummary>, PipelineError> {
        let hostnames = self.hostnames().await;
        if hostnames.is_empty() {
            warn!("no hostnames found in the metrics store");
            return Err(PipelineError::NoHostnames);
        }

        info!("summarizing {} hosts", hostnames.len());

        let mut results = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            results.push(self.summarize_host(&hostname).await);
        }

        Ok(results)
    }

    /// Summarize one host's recent metrics
    #[instrument(skip(self))]
    pub async fn summarize_host(&self, hostname: &str) -> HostSummary {
        let records = match self
            .store
            .fetch_recent_by_host(hostname, self.window_days)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Error fetching metrics for {hostname}: {e}");
                Vec::new()
            }
        };

        if records.is_empty() {
            info!("no metrics for {hostname} in the last {} days", self.window_days);
            return HostSummary {
                hostname: hostname.to_string(),
                summary: format!(
                    "No metrics were recorded for {hostname} in the last {} days.",
                    self.window_days
                ),
                error: None,
            };
        }

        let prompt = self.prompts.build(&records);

        match self.summarizer.summarize(&prompt).await {
            Ok(summary) => {
                info!("summarized {} records for {hostname}", prompt.included);
                HostSummary {
                    hostname: hostname.to_string(),
                    summary,
                    error: None,
                }
            }
            Err(e) => {
                error!("Error generating summary for {hostname}: {e}");
                HostSummary {
                    hostname: hostname.to_string(),
                    summary: FALLBACK_SUMMARY.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Render `results` and mail them to the configured recipients
    #[instrument(skip(self, results))]
    pub async fn deliver(
        &self,
        results: &[HostSummary],
        generated_at: DateTime<Utc>,
    ) -> DeliveryOutcome {
        let markdown = compose_report(results);
        let report = self.renderer.produce(&markdown, generated_at).await;

        let attachment = match (&report.pdf_path, &report.pdf) {
            (Some(path), _) => Some(ReportAttachment::File(path.clone())),
            (None, Some(bytes)) => Some(ReportAttachment::Inline {
                filename: format!("{}.pdf", report_file_stem(generated_at)),
                content: bytes.clone(),
            }),
            (None, None) => {
                warn!("sending report without PDF attachment");
                None
            }
        };

        let mut outcome = DeliveryOutcome {
            delivered: false,
            pdf_attached: attachment.is_some(),
            html_path: report.html_path.as_ref().map(|p| p.display().to_string()),
            pdf_path: report.pdf_path.as_ref().map(|p| p.display().to_string()),
            message_id: None,
            error: report.pdf_error.clone(),
        };

        let mail = OutgoingMail {
            subject: format!("{} - {}", REPORT_TITLE, generated_at.format("%Y-%m-%d")),
            text: markdown,
            html: report.html,
            attachment,
        };

        match self.notifier.send(&mail).await {
            Ok(confirmation) => {
                outcome.delivered = true;
                outcome.message_id = Some(confirmation.message_id);
            }
            Err(e) => {
                error!("Error sending report email: {e}");
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }

    /// Summaries, rendering and delivery in one go
    #[instrument(skip(self))]
    pub async fn run_report(&self, trigger: Trigger) -> Result<ReportOutcome, PipelineError> {
        info!("starting report run");

        let results = self.summarize_hosts().await?;
        let generated_at = Utc::now();
        let delivery = self.deliver(&results, generated_at).await;

        info!(
            "report run finished: {} hosts, delivered: {}, pdf attached: {}",
            results.len(),
            delivery.delivered,
            delivery.pdf_attached
        );

        Ok(ReportOutcome {
            trigger,
            generated_at,
            results,
            delivery,
        })
    }
}

/// Join per-host summaries into one markdown document
///
/// Each host starts with a `## Host: <name>` marker so the renderer can split
/// it back into sections.
pub fn compose_report(results: &[HostSummary]) -> String {
    let mut markdown = String::new();
    for result in results {
        markdown.push_str(&format!(
            "## Host: {}\n\n{}\n\n",
            result.hostname,
            result.summary.trim()
        ));
    }
    markdown
}
