//! milestone-stream - segment git history and stream per-milestone analysis
//!
//! JSON and event frames go to stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use milestone_stream::config::{Config, SegmentStrategy};
use milestone_stream::git::{GitRepository, get_diff_for_file};
use milestone_stream::milestone::{ChurnScoringPolicy, Segmenter, stats};
use milestone_stream::pipeline::{PipelineRegistry, Recv, StatsAnalyzer, spawn_pipeline};
use milestone_stream::sse;
use milestone_stream::types::Milestone;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "milestone-stream")]
#[command(about = "Segment git history into milestones and stream their analysis")]
#[command(version)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
))]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "MILESTONE_STREAM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the first-parent commit list, oldest first, as JSON
    Log {
        repo: PathBuf,

        /// Read at most this many of the newest commits
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Print milestones as JSON
    Segment {
        repo: PathBuf,

        /// adjacent, heuristic or even
        #[arg(long)]
        strategy: Option<SegmentStrategy>,

        /// Work score at which the heuristic strategy cuts
        #[arg(long)]
        threshold: Option<f64>,

        /// Number of groups for the even strategy
        #[arg(long)]
        target: Option<usize>,

        #[arg(long)]
        depth: Option<usize>,
    },

    /// Print the diff of one file between two commits
    Diff {
        repo: PathBuf,
        start: String,
        end: String,
        path: String,
    },

    /// Print statistics of the milestone between two commits
    Stats {
        repo: PathBuf,
        start: String,
        end: String,

        /// Number of longest messages and heaviest changes to list
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Run the full pipeline and print server-sent event frames
    Run {
        repo: PathBuf,

        /// Run identifier (random when omitted)
        #[arg(long)]
        run_id: Option<String>,

        /// Wait for the run to finish, then replay events after this id
        #[arg(long)]
        last_event_id: Option<String>,

        #[arg(long)]
        strategy: Option<SegmentStrategy>,
    },

    /// Print the JSON Schema of a milestone record
    Schema,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => Config::new()?,
    };
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn compute_milestone(repo: &GitRepository, start: &str, end: &str) -> Result<Milestone> {
    let (start, end) = tokio::try_join!(repo.fetch_commit(start), repo.fetch_commit(end))?;
    Ok(Segmenter::new(repo).compute(&start, &end).await?)
}

async fn run_log(config: &Config, repo: &Path, depth: Option<usize>) -> Result<()> {
    let repo = GitRepository::open(repo, &config.git)?;
    let commits = repo
        .fetch_first_parent_log(depth.or(config.git.log_depth))
        .await?;
    print_json(&commits)
}

async fn run_segment(config: &Config, repo: &Path) -> Result<()> {
    let repo = GitRepository::open(repo, &config.git)?;
    let commits = repo.fetch_history(config.git.log_depth).await?;
    let segmenter = Segmenter::new(&repo);
    let policy = ChurnScoringPolicy::new(config.scoring.clone());

    let boundaries = segmenter
        .boundaries(&commits, &config.segmentation, &policy)
        .await?;
    let milestones = if boundaries.len() < 2 {
        Vec::new()
    } else {
        segmenter.segment_at(&commits, &boundaries).await?
    };

    tracing::info!(
        "{} commits segmented into {} milestones",
        commits.len(),
        milestones.len()
    );
    print_json(&milestones)
}

async fn run_diff(config: &Config, repo: &Path, start: &str, end: &str, path: &str) -> Result<()> {
    let repo = GitRepository::open(repo, &config.git)?;
    let milestone = compute_milestone(&repo, start, end).await?;
    let diff = get_diff_for_file(&repo, &milestone, path).await?;
    print!("{}", diff);
    Ok(())
}

async fn run_stats(config: &Config, repo: &Path, start: &str, end: &str, top: usize) -> Result<()> {
    let repo = GitRepository::open(repo, &config.git)?;
    let milestone = compute_milestone(&repo, start, end).await?;

    print_json(&json!({
        "range": milestone.range(),
        "time": stats::time_stats(&milestone),
        "messages": stats::message_stats(&milestone),
        "longest_messages": stats::longest_messages(&milestone, top),
        "files": stats::file_change_stats(&milestone),
        "top_changes": stats::top_changes(&milestone, top),
    }))
}

async fn run_pipeline_cli(
    config: Config,
    repo: &Path,
    run_id: Option<String>,
    last_event_id: Option<String>,
) -> Result<()> {
    let git = GitRepository::open(repo, &config.git)?;
    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let wait = Duration::from_millis(config.pipeline.subscriber_wait_ms);

    let registry = PipelineRegistry::new();
    let entry = registry.create(&run_id, repo).await?;
    tracing::info!("Run '{}' started", run_id);

    let handle = spawn_pipeline(
        Arc::clone(&entry),
        git,
        Arc::new(StatsAnalyzer::default()),
        config,
    );

    let mut subscription = match last_event_id.as_deref() {
        Some(token) => {
            // Failures are already recorded in the log as error events
            if let Err(err) = handle.await? {
                tracing::debug!("Run ended with error: {}", err);
            }
            entry.log().subscribe_after(Some(token), wait).await
        }
        None => entry.log().subscribe(0, wait),
    };

    loop {
        match subscription.recv().await {
            Recv::Event(event) => print!("{}", sse::frame(&event)?),
            Recv::Idle => print!("{}", sse::KEEP_ALIVE),
            Recv::Closed => break,
        }
    }

    let status = entry.log().status().await;
    registry.destroy(&run_id).await;

    match status.error() {
        Some(message) => anyhow::bail!("Run '{}' failed: {}", run_id, message),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Log { repo, depth } => {
            config.validate()?;
            run_log(&config, &repo, depth).await?;
        }
        Commands::Segment {
            repo,
            strategy,
            threshold,
            target,
            depth,
        } => {
            if let Some(strategy) = strategy {
                config.segmentation.strategy = strategy;
            }
            if let Some(threshold) = threshold {
                config.segmentation.score_threshold = threshold;
            }
            if let Some(target) = target {
                config.segmentation.target_milestones = target;
            }
            if depth.is_some() {
                config.git.log_depth = depth;
            }
            config.validate()?;
            run_segment(&config, &repo).await?;
        }
        Commands::Diff {
            repo,
            start,
            end,
            path,
        } => {
            config.validate()?;
            run_diff(&config, &repo, &start, &end, &path).await?;
        }
        Commands::Stats {
            repo,
            start,
            end,
            top,
        } => {
            config.validate()?;
            run_stats(&config, &repo, &start, &end, top).await?;
        }
        Commands::Run {
            repo,
            run_id,
            last_event_id,
            strategy,
        } => {
            if let Some(strategy) = strategy {
                config.segmentation.strategy = strategy;
            }
            config.validate()?;
            run_pipeline_cli(config, &repo, run_id, last_event_id).await?;
        }
        Commands::Schema => {
            print_json(&schemars::schema_for!(Milestone))?;
        }
    }

    Ok(())
}
