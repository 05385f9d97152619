//! ReportScheduler - Runs the report pipeline on a cron schedule
//!
//! ## Message Flow
//!
//! ```text
//! Next cron occurrence → run_report(Scheduled) → log outcome
//!     ↑
//!     └─── Commands (RunNow, NextRun, Shutdown)
//! ```
//!
//! The schedule is a five-field cron expression evaluated in local time.
//! Scheduled runs only log their outcome; nothing is retried.
//!
//! A panic inside a run ends the actor task. Whoever owns the task's
//! `JoinHandle` sees it through [`wait_for_stop`] and shuts the service down.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use croner::Cron;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::pipeline::{ReportPipeline, Trigger};
use crate::util;

use super::messages::SchedulerCommand;

/// Parse a five-field cron expression
pub fn parse_schedule(expression: &str) -> Result<Cron> {
    Cron::new(expression)
        .parse()
        .with_context(|| format!("invalid cron expression '{expression}'"))
}

/// First occurrence of `schedule` strictly after `after`
pub fn next_occurrence<Tz: TimeZone>(schedule: &Cron, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.find_next_occurrence(after, false).ok()
}

/// Actor that fires the weekly report
pub struct ReportScheduler {
    schedule: Cron,

    /// Original expression, for logging
    expression: String,

    pipeline: Arc<ReportPipeline>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl ReportScheduler {
    pub fn new(
        expression: &str,
        pipeline: Arc<ReportPipeline>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Result<Self> {
        Ok(Self {
            schedule: parse_schedule(expression)?,
            expression: expression.to_string(),
            pipeline,
            command_rx,
        })
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command arrives, the command channel closes, or
    /// the schedule has no future occurrence.
    #[instrument(skip(self), fields(schedule = %self.expression))]
    pub async fn run(mut self) {
        info!("report scheduler started");

        loop {
            let Some(next) = next_occurrence(&self.schedule, &Local::now()) else {
                error!("schedule has no upcoming occurrence, stopping");
                break;
            };
            let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
            debug!("next report at {next} (in {}s)", wait.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.run_scheduled().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RunNow { respond_to }) => {
                            debug!("received RunNow command");
                            let result = self.pipeline.run_report(Trigger::Manual).await;
                            let _ = respond_to.send(result);
                        }

                        Some(SchedulerCommand::NextRun { respond_to }) => {
                            let _ = respond_to.send(Some(next));
                        }

                        Some(SchedulerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        info!("report scheduler stopped");
    }

    async fn run_scheduled(&self) {
        info!("running scheduled report");
        match self.pipeline.run_report(Trigger::Scheduled).await {
            Ok(outcome) => info!(
                "Weekly report completed for {} hosts (delivered: {})",
                outcome.results.len(),
                outcome.delivery.delivered
            ),
            Err(e) => error!("Weekly report failed: {e}"),
        }
    }
}

/// Handle for controlling a ReportScheduler
///
/// It can be cloned and shared across threads.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a scheduler for `expression`
    ///
    /// Returns the handle and the actor's task. Fails without spawning
    /// anything if the expression doesn't parse.
    pub fn spawn(
        expression: &str,
        pipeline: Arc<ReportPipeline>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = ReportScheduler::new(expression, pipeline, cmd_rx)?;
        let task = tokio::spawn(actor.run());

        Ok((Self { sender: cmd_tx }, task))
    }

    /// Run the report now and wait for it to finish
    pub async fn run_now(&self) -> Result<crate::pipeline::ReportOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        Ok(rx.await.context("failed to receive response")??)
    }

    /// Next scheduled run, `None` if the scheduler has stopped
    pub async fn next_run(&self) -> Option<DateTime<Local>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::NextRun { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Stop the scheduler
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

/// Why a serving process should begin shutting down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The termination signal fired
    Signal,

    /// The scheduler task panicked
    SchedulerPanicked(String),
}

/// Wait for `signal`, or for the scheduler `task` to panic
///
/// A scheduler that stops without panicking (shutdown command, exhausted
/// schedule) is logged and leaves the process serving until `signal`.
pub async fn wait_for_stop(
    signal: impl Future<Output = ()>,
    task: Option<&mut JoinHandle<()>>,
) -> StopReason {
    let scheduler = async {
        if let Some(task) = task {
            match task.await {
                Err(e) if e.is_panic() => {
                    let panic = e.into_panic();
                    let message = util::panic_message(&*panic).to_string();
                    error!("report scheduler panicked: {message}");
                    return StopReason::SchedulerPanicked(message);
                }
                Err(e) => warn!("report scheduler was cancelled: {e}"),
                Ok(()) => warn!("report scheduler stopped, no further scheduled reports"),
            }
        }
        std::future::pending::<StopReason>().await
    };

    tokio::select! {
        _ = signal => StopReason::Signal,
        reason = scheduler => reason,
    }
}
