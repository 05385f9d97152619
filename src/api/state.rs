//! API shared state

use std::sync::Arc;

use crate::actors::scheduler::SchedulerHandle;
use crate::pipeline::ReportPipeline;

/// Shared state passed to all API handlers
#[derive(Clone, Debug)]
pub struct ApiState {
    /// Pipeline used for on-demand summaries
    pub pipeline: Arc<ReportPipeline>,

    /// Weekly scheduler, absent when started with `--no-scheduler`
    pub scheduler: Option<SchedulerHandle>,
}

impl ApiState {
    pub fn new(pipeline: Arc<ReportPipeline>) -> Self {
        Self {
            pipeline,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerHandle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}
