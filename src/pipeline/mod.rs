//! Per-run event log, the run registry and the run driver

/// Analyzer trait, analysis context and the built-in statistics analyzer
pub mod analyzer;
/// Sequence-numbered event log with resumable subscriptions
pub mod event_log;
/// Run id to event log table
pub mod registry;
/// Drives one run from history to terminal event
pub mod runner;

pub use analyzer::{AnalysisContext, EventSink, MilestoneAnalyzer, StatsAnalyzer};
pub use event_log::{
    EventKind, EventLog, PipelineEvent, PipelineStatus, Recv, SequencedEvent, Subscription,
};
pub use registry::{PipelineEntry, PipelineRegistry};
pub use runner::{RunSummary, run_pipeline, spawn_pipeline};
