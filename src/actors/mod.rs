//! Actor-based scheduling
//!
//! Long-running work runs as an independent async task controlled through a
//! command channel.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌─────────────────┐   RunNow / NextRun / Shutdown   ┌──────────────────┐
//!   │ SchedulerHandle │ ──────────────────────────────▶ │ ReportScheduler  │
//!   └─────────────────┘ ◀────────── oneshot ─────────── └────────┬─────────┘
//!                                                                │ cron tick
//!                                                       ┌────────▼─────────┐
//!                                                       │  ReportPipeline  │
//!                                                       └──────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for anything that needs an answer

pub mod messages;
pub mod scheduler;
