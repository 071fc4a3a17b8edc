//! # Milestone Stream - Git History Segmentation with Resumable Event Streams
//!
//! Reads a repository's first-parent history, partitions it into milestones
//! (contiguous commit ranges with rename-aware file-change statistics), hands
//! each milestone to an analyzer and streams the results to any number of
//! readers over a replayable, sequence-numbered event log.
//!
//! ## Key Features
//!
//! - **Commit Log Reader**: first-parent log and boundary commits through the `git` executable
//! - **Milestone Segmenter**: adjacent, evenly sized or churn-scored boundaries
//! - **Rename-Aware Stats**: numstat and name-status reconciled by new path, binary counts kept unknown
//! - **Lazy Diffs**: per-file diff text fetched on demand, never cached
//! - **Event Log**: broadcast wakeup, cursor replay, exactly one terminal `end` event
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌───────────┐    ┌──────────┐    ┌──────────┐
//! │ GitRepository│ ─► │ Segmenter │ ─► │ Analyzer │ ─► │ EventLog │ ─► subscribers
//! └──────────────┘    └───────────┘    └──────────┘    └──────────┘
//!                                                           ▲
//!                                          PipelineRegistry ┘
//! ```
//!
//! ## Modules
//!
//! - [`git`]: commit log reader, diff queries and output parsing
//! - [`milestone`]: boundary strategies, work score policy and statistics
//! - [`pipeline`]: event log, registry, analyzer boundary and run driver
//! - [`sse`]: wire framing for subscribers
//! - [`config`]: configuration with environment variable overrides
//! - [`types`]: commits, file changes and milestones
//! - [`error`]: error types
//! - [`paths`]: platform config locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use milestone_stream::config::Config;
//! use milestone_stream::git::GitRepository;
//! use milestone_stream::pipeline::{EventLog, StatsAnalyzer, run_pipeline};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new()?;
//!     let repo = GitRepository::open("./my-repo", &config.git)?;
//!     let log = EventLog::new();
//!
//!     let mut sub = log.subscribe(0, Duration::from_secs(1));
//!     let reader = tokio::spawn(async move {
//!         while let Some(event) = sub.next().await {
//!             println!("{}", milestone_stream::sse::frame(&event).unwrap_or_default());
//!         }
//!     });
//!
//!     let analyzer = StatsAnalyzer::default();
//!     run_pipeline(&log, &repo, &analyzer, &config, &CancellationToken::new()).await?;
//!     reader.await?;
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Git history reading and diff queries
pub mod git;

/// Milestone segmentation, scoring and statistics
pub mod milestone;

/// Platform-specific configuration paths
pub mod paths;

/// Event log, registry and run driver
pub mod pipeline;

/// Server-sent event framing
pub mod sse;

/// Commits, file changes and milestones
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;
