//! Report rendering
//!
//! Turns the combined summary markdown into an HTML document and a paginated
//! PDF. Both renderings are pure functions of the summary and the generation
//! time; writing them to disk is a separate step that falls back to the
//! system temp directory when the configured directory is not writable.

pub mod html;
pub mod pdf;
pub mod sections;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use pdf::PageGeometry;
use sections::SectionPolicy;

/// Title shown in the HTML document, the PDF and the email subject
pub const REPORT_TITLE: &str = "Weekly Server Metrics Report";

/// Errors raised while rendering or saving a report
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Where rendered reports go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutput {
    /// Write both files into this directory
    Directory(PathBuf),
    /// Keep everything in memory
    Memory,
}

/// Result of rendering one summary
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub generated_at: DateTime<Utc>,
    pub html: String,
    pub pdf: Option<Vec<u8>>,
    /// Why `pdf` is missing, if it is
    pub pdf_error: Option<String>,
    pub sections: usize,
    pub html_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
}

/// File name stem shared by the HTML and PDF outputs
///
/// The timestamp keeps colons out so the name is valid on every filesystem.
pub fn report_file_stem(generated_at: DateTime<Utc>) -> String {
    format!(
        "server-metrics-report-{}",
        generated_at.format("%Y-%m-%dT%H-%M-%S-%3fZ")
    )
}

/// Renders summaries to HTML and PDF
#[derive(Debug)]
pub struct ReportRenderer {
    output: ReportOutput,
    policy: SectionPolicy,
    geometry: PageGeometry,
}

impl ReportRenderer {
    pub fn new(output: ReportOutput) -> Self {
        Self {
            output,
            policy: SectionPolicy::default(),
            geometry: PageGeometry::default(),
        }
    }

    /// Render `summary` without touching the filesystem
    pub fn render(&self, summary: &str, generated_at: DateTime<Utc>) -> RenderedReport {
        let html = html::render_document(REPORT_TITLE, summary, generated_at);

        let sections = self.policy.split(summary);
        let subtitle = format!("Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
        let pages = pdf::layout(REPORT_TITLE, &subtitle, &sections, &self.geometry);

        let (pdf, pdf_error) = match pdf::render_pdf(REPORT_TITLE, &pages, &self.geometry) {
            Ok(bytes) => (Some(bytes), None),
            Err(e) => {
                error!("failed to render PDF report: {e}");
                (None, Some(e.to_string()))
            }
        };

        RenderedReport {
            generated_at,
            html,
            pdf,
            pdf_error,
            sections: sections.len(),
            html_path: None,
            pdf_path: None,
        }
    }

    /// Render `summary` and, for directory output, write both files
    ///
    /// Write failures never fail the report: the affected path stays `None`
    /// and the content is still available in memory.
    #[instrument(skip(self, summary))]
    pub async fn produce(&self, summary: &str, generated_at: DateTime<Utc>) -> RenderedReport {
        let mut report = self.render(summary, generated_at);

        let ReportOutput::Directory(dir) = &self.output else {
            return report;
        };

        let stem = report_file_stem(generated_at);

        match write_with_fallback(dir, &format!("{stem}.html"), report.html.as_bytes()).await {
            Ok(path) => report.html_path = Some(path),
            Err(e) => error!("failed to save HTML report: {e}"),
        }

        if let Some(bytes) = &report.pdf {
            match write_with_fallback(dir, &format!("{stem}.pdf"), bytes).await {
                Ok(path) => report.pdf_path = Some(path),
                Err(e) => error!("failed to save PDF report: {e}"),
            }
        }

        report
    }
}

/// Write into `dir`, or into the temp directory if that fails
async fn write_with_fallback(
    dir: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<PathBuf, RenderError> {
    match write_into(dir, file_name, bytes).await {
        Ok(path) => Ok(path),
        Err(e) => {
            let fallback = std::env::temp_dir();
            warn!(
                "cannot write {file_name} to {}: {e}; using {}",
                dir.display(),
                fallback.display()
            );
            write_into(&fallback, file_name, bytes).await
        }
    }
}

async fn write_into(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, RenderError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    info!("saved report to {}", path.display());
    Ok(path)
}
