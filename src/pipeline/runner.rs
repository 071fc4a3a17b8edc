//! Run driver: history to milestones to analyzer results to events
//!
//! The driver is the single writer of a run's event log. Every exit path ends
//! in exactly one terminal transition, so subscribers never hang.

use crate::config::{Config, FailurePolicy};
use crate::error::StreamError;
use crate::git::GitRepository;
use crate::milestone::segmenter::{self, Segmenter};
use crate::milestone::ChurnScoringPolicy;
use crate::pipeline::analyzer::{AnalysisContext, EventSink, MilestoneAnalyzer, PREVIOUS_SUMMARIES};
use crate::pipeline::event_log::{EventKind, EventLog, PipelineEvent};
use crate::pipeline::registry::PipelineEntry;
use crate::types::Commit;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Error message of a run stopped through its cancellation token
pub const CANCELLED: &str = "cancelled";

/// Counts reported by a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub commits: usize,
    pub milestones: usize,
    pub analyzed: usize,
    pub failed: usize,
}

/// Drive one run to completion, appending every event to `log`
///
/// On success the log is marked done. Any failure of history retrieval, of
/// segmentation, of a milestone under [`FailurePolicy::Abort`], or a
/// cancellation appends one `error` event and marks the log errored.
pub async fn run_pipeline(
    log: &EventLog,
    repo: &GitRepository,
    analyzer: &dyn MilestoneAnalyzer,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<RunSummary, StreamError> {
    tracing::info!("Starting run over {}", repo.path().display());

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StreamError::other(CANCELLED)),
        result = drive(log, repo, analyzer, config) => result,
    };

    match outcome {
        Ok(summary) => {
            log.mark_done().await;
            tracing::info!(
                "Run finished: {} of {} milestones analyzed, {} failed",
                summary.analyzed,
                summary.milestones,
                summary.failed
            );
            Ok(summary)
        }
        Err(err) => {
            let message = err.to_user_string();
            tracing::error!("Run failed: {}", message);
            if let Err(append_err) = log.append(PipelineEvent::error(message.clone())).await {
                tracing::debug!("Could not append error event: {}", append_err);
            }
            log.mark_error(message).await;
            Err(err)
        }
    }
}

/// Spawn [`run_pipeline`] for a registry entry, observing its cancel token
pub fn spawn_pipeline(
    entry: Arc<PipelineEntry>,
    repo: GitRepository,
    analyzer: Arc<dyn MilestoneAnalyzer>,
    config: Config,
) -> JoinHandle<Result<RunSummary, StreamError>> {
    tokio::spawn(async move {
        run_pipeline(
            entry.log(),
            &repo,
            analyzer.as_ref(),
            &config,
            entry.cancel_token(),
        )
        .await
    })
}

async fn drive(
    log: &EventLog,
    repo: &GitRepository,
    analyzer: &dyn MilestoneAnalyzer,
    config: &Config,
) -> Result<RunSummary, StreamError> {
    let commits = repo.fetch_history(config.git.log_depth).await?;
    log.append(PipelineEvent::log(format!(
        "Read {} commits from {}",
        commits.len(),
        repo.path().display()
    )))
    .await?;

    let segmenter = Segmenter::new(repo);
    let policy = ChurnScoringPolicy::new(config.scoring.clone());
    let boundaries = segmenter
        .boundaries(&commits, &config.segmentation, &policy)
        .await?;

    let mut pairs = if boundaries.len() < 2 {
        Vec::new()
    } else {
        segmenter::pairs(&commits, &boundaries)?
    };
    if let Some(max) = config.segmentation.max_milestones {
        pairs.truncate(max);
    }

    let total = pairs.len();
    log.append(PipelineEvent::log(format!(
        "Segmented history into {} milestones ({} strategy)",
        total, config.segmentation.strategy
    )))
    .await?;

    let mut summary = RunSummary {
        commits: commits.len(),
        milestones: total,
        ..RunSummary::default()
    };
    let sink = EventSink::new(log.clone());
    let mut previous: VecDeque<String> = VecDeque::with_capacity(PREVIOUS_SUMMARIES);
    let mut results = Vec::with_capacity(total);

    for (index, (start, end)) in pairs.into_iter().enumerate() {
        let context = AnalysisContext {
            index,
            total,
            previous_summaries: previous.iter().cloned().collect(),
            repo: repo.clone(),
            sink: sink.clone(),
        };

        match analyze_one(log, &segmenter, analyzer, start, end, &context).await {
            Ok(result) => {
                if let Some(text) = result.get("summary").and_then(Value::as_str) {
                    if previous.len() == PREVIOUS_SUMMARIES {
                        previous.pop_front();
                    }
                    previous.push_back(text.to_string());
                }

                log.append(PipelineEvent::new(
                    EventKind::MilestoneResult,
                    json!({ "index": index, "result": result }),
                ))
                .await?;
                results.push(result);
                summary.analyzed += 1;
            }
            // A closed log means someone else ended the run
            Err(err @ StreamError::Pipeline(_)) => return Err(err),
            Err(err) => match config.pipeline.on_milestone_failure {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::Continue => {
                    tracing::warn!("Milestone {}/{} failed: {}", index + 1, total, err);
                    log.append(PipelineEvent::new(
                        EventKind::MilestoneError,
                        json!({
                            "index": index,
                            "start_commit": start.hash,
                            "end_commit": end.hash,
                            "error": err.to_user_string(),
                        }),
                    ))
                    .await?;
                    summary.failed += 1;
                }
            },
        }

        log.append(PipelineEvent::progress(index + 1, total)).await?;
    }

    match analyzer.summarize_run(&results).await {
        Ok(Some(value)) => {
            log.append(PipelineEvent::new(EventKind::FinalSummary, value))
                .await?;
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!("Final summary failed: {:#}", err);
            log.append(PipelineEvent::log(format!("Final summary failed: {:#}", err)))
                .await?;
        }
    }

    Ok(summary)
}

async fn analyze_one(
    log: &EventLog,
    segmenter: &Segmenter<'_>,
    analyzer: &dyn MilestoneAnalyzer,
    start: &Commit,
    end: &Commit,
    context: &AnalysisContext,
) -> Result<Value, StreamError> {
    let milestone = segmenter.compute(start, end).await?;

    log.append(PipelineEvent::new(
        EventKind::MilestoneStart,
        json!({
            "index": context.index,
            "total": context.total,
            "start_commit": milestone.start_commit,
            "end_commit": milestone.end_commit,
            "time_start": milestone.time_start,
            "time_end": milestone.time_end,
            "messages": milestone.messages,
            "files_changed": milestone.changes.len(),
        }),
    ))
    .await?;

    tracing::info!(
        "Analyzing milestone {}/{} ({})",
        context.index + 1,
        context.total,
        milestone.range()
    );
    Ok(analyzer.analyze(&milestone, context).await?)
}
