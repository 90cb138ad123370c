//! Drives refresh cycles over the analytics engine.
//!
//! All six sources are fetched concurrently; aggregation waits for the whole
//! cohort to settle and runs once against a single store snapshot. Requests
//! arriving mid-cycle join the in-flight cycle instead of fetching again.

pub mod orchestrator;
pub mod source;

pub use orchestrator::{
    AnalyticsOrchestrator, Clock, CycleOutcome, RefreshError, RefreshPhase, RefreshReport,
};
pub use source::{DirectorySource, RecordSource};
