//! Boundary with the per-milestone analysis step
//!
//! The run driver hands each milestone to a [`MilestoneAnalyzer`] and appends
//! whatever structured value it returns as the `milestone_result` payload.
//! The driver never inspects that value beyond an optional `summary` string
//! that is threaded into the next milestones' context.

use crate::error::PipelineError;
use crate::git::GitRepository;
use crate::milestone::stats;
use crate::pipeline::event_log::{EventKind, EventLog, PipelineEvent};
use crate::types::{FileChange, Milestone};
use anyhow::Result;
use serde_json::{Value, json};

/// Number of earlier summaries handed to the analyzer
pub const PREVIOUS_SUMMARIES: usize = 2;

/// Append-only handle an analyzer uses to report intermediate output
#[derive(Debug, Clone)]
pub struct EventSink {
    log: EventLog,
}

impl EventSink {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    pub async fn log(&self, message: impl Into<String>) -> Result<u64, PipelineError> {
        self.log.append(PipelineEvent::log(message)).await
    }

    /// Free-form update from inside an analysis, kept apart from the
    /// driver's numeric `progress` events
    pub async fn update(&self, message: impl Into<String>) -> Result<u64, PipelineError> {
        self.log
            .append(PipelineEvent::new(
                EventKind::ProcessingUpdate,
                json!({ "message": message.into() }),
            ))
            .await
    }
}

/// What an analyzer knows besides the milestone itself
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Zero-based position of this milestone in the run
    pub index: usize,
    pub total: usize,
    /// Summaries of the preceding milestones, oldest first
    pub previous_summaries: Vec<String>,
    /// Handle for lazy per-file diffs
    pub repo: GitRepository,
    pub sink: EventSink,
}

impl AnalysisContext {
    pub fn previous_summary(&self) -> Option<&str> {
        self.previous_summaries.last().map(String::as_str)
    }
}

/// Produces a structured result for one milestone
#[async_trait::async_trait]
pub trait MilestoneAnalyzer: Send + Sync {
    async fn analyze(&self, milestone: &Milestone, context: &AnalysisContext) -> Result<Value>;

    /// Optional roll-up over every successful result, appended as
    /// `final_summary` when `Some`
    async fn summarize_run(&self, _results: &[Value]) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Deterministic analyzer built from the milestone statistics queries
#[derive(Debug, Clone)]
pub struct StatsAnalyzer {
    top_n: usize,
}

impl Default for StatsAnalyzer {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

impl StatsAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    fn describe_change(change: &FileChange) -> String {
        let counts = match (change.insertions, change.deletions) {
            (Some(ins), Some(del)) => format!("+{}/-{}", ins, del),
            _ => "binary".to_string(),
        };
        match &change.old_path {
            Some(old) => format!("{} {} -> {} ({})", change.status, old, change.path, counts),
            None => format!("{} {} ({})", change.status, change.path, counts),
        }
    }
}

#[async_trait::async_trait]
impl MilestoneAnalyzer for StatsAnalyzer {
    async fn analyze(&self, milestone: &Milestone, context: &AnalysisContext) -> Result<Value> {
        let time = stats::time_stats(milestone);
        let messages = stats::message_stats(milestone);
        let files = stats::file_change_stats(milestone);

        let headline = stats::longest_messages(milestone, 1)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "No commit messages".to_string());
        let title = format!(
            "Milestone {}/{}: {}",
            context.index + 1,
            context.total,
            headline
        );

        let summary = format!(
            "{} commits over {} touched {} files (+{}/-{}, {} with unknown counts).",
            messages.num_messages,
            time.duration,
            files.num_file_changes,
            files.total_insertions,
            files.total_deletions,
            files.num_unknown_counts
        );

        let most_important_changes: Vec<String> = stats::top_changes(milestone, self.top_n)
            .into_iter()
            .map(Self::describe_change)
            .collect();

        context
            .sink
            .log(format!("Analyzed {}", milestone.range()))
            .await?;

        Ok(json!({
            "title": title,
            "summary": summary,
            "most_important_changes": most_important_changes,
            "stats": {
                "time": time,
                "messages": messages,
                "files": files,
            },
        }))
    }

    async fn summarize_run(&self, results: &[Value]) -> Result<Option<Value>> {
        if results.is_empty() {
            return Ok(None);
        }

        let titles: Vec<&str> = results
            .iter()
            .filter_map(|r| r.get("title").and_then(Value::as_str))
            .collect();
        Ok(Some(json!({
            "milestones": results.len(),
            "titles": titles,
        })))
    }
}
