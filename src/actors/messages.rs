//! Message types for actor communication
//!
//! Commands travel over an mpsc channel to a single actor; anything that
//! needs an answer carries a oneshot sender.

use chrono::{DateTime, Local};
use tokio::sync::oneshot;

use crate::pipeline::{PipelineError, ReportOutcome};

/// Commands that can be sent to the ReportScheduler
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run the full report immediately, outside the schedule
    ///
    /// The next scheduled run is recomputed afterwards, it is not skipped.
    RunNow {
        respond_to: oneshot::Sender<Result<ReportOutcome, PipelineError>>,
    },

    /// When the next scheduled run fires, in local time
    NextRun {
        respond_to: oneshot::Sender<Option<DateTime<Local>>>,
    },

    /// Stop the schedule
    ///
    /// A report that is already running finishes first.
    Shutdown,
}
