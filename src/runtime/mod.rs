//! Orchestration: one harvest run, and the scheduler around it

pub mod pipeline;
pub mod run_loop;

pub use pipeline::{EstimateReport, Pipeline, RunSummary};
pub use run_loop::{RunJob, RunLoop, RunState, Schedule, TickOutcome};
