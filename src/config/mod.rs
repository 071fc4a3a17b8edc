/// Configuration system for milestone-stream
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, StreamError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Version-control tool configuration
    #[serde(default)]
    pub git: GitConfig,

    /// Milestone boundary selection
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Weights for the heuristic work score
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Event log and run driver behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Version-control tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Executable used for every history query
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Optional bound on the number of first-parent commits read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_depth: Option<usize>,

    /// Ratio of malformed log records above which the whole fetch fails
    #[serde(default = "default_max_malformed_ratio")]
    pub max_malformed_ratio: f64,
}

/// How milestone boundaries are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStrategy {
    /// One milestone per adjacent commit pair
    #[default]
    Adjacent,
    /// Accumulate commits until the work score crosses a threshold
    Heuristic,
    /// A fixed number of evenly sized groups
    Even,
}

/// Milestone boundary selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default)]
    pub strategy: SegmentStrategy,

    /// Running score at which the heuristic strategy cuts a boundary
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    /// Number of groups produced by the even strategy
    #[serde(default = "default_target_milestones")]
    pub target_milestones: usize,

    /// Optional cap on milestones analyzed by one run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_milestones: Option<usize>,
}

/// Weights for the churn-based work score
///
/// Per-file churn is `(insertions + deletions) * base_weight`, multiplied by
/// the factor of the file's extension class. When `taper` is set, raw churn is
/// first squashed with `taper * tanh(churn / taper)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_base_weight")]
    pub base_weight: f64,

    /// Factor for source code files
    #[serde(default = "default_source_weight")]
    pub source_weight: f64,

    /// Factor for build, config and schema files
    #[serde(default = "default_setup_weight")]
    pub setup_weight: f64,

    /// Factor for media, archives and other data files
    #[serde(default = "default_data_weight")]
    pub data_weight: f64,

    /// Flat contribution of each commit
    #[serde(default = "default_commit_weight")]
    pub commit_weight: f64,

    /// Flat contribution of each touched file
    #[serde(default = "default_file_weight")]
    pub file_weight: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taper: Option<f64>,
}

/// What the run driver does when one milestone cannot be computed or analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Append a `milestone_error` event and move on
    #[default]
    Continue,
    /// Terminate the run as errored
    Abort,
}

/// Event log and run driver behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on a caught-up subscriber's wait before it reports idle
    #[serde(default = "default_subscriber_wait_ms")]
    pub subscriber_wait_ms: u64,

    #[serde(default)]
    pub on_milestone_failure: FailurePolicy,
}

// Default value functions
fn default_git_binary() -> String {
    "git".to_string()
}

fn default_max_malformed_ratio() -> f64 {
    0.1
}

fn default_score_threshold() -> f64 {
    4000.0
}

fn default_target_milestones() -> usize {
    10
}

fn default_base_weight() -> f64 {
    0.7
}

fn default_source_weight() -> f64 {
    20.0
}

fn default_setup_weight() -> f64 {
    0.04
}

fn default_data_weight() -> f64 {
    0.01
}

fn default_commit_weight() -> f64 {
    10.0
}

fn default_file_weight() -> f64 {
    5.0
}

fn default_subscriber_wait_ms() -> u64 {
    1000
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            log_depth: None,
            max_malformed_ratio: default_max_malformed_ratio(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            strategy: SegmentStrategy::default(),
            score_threshold: default_score_threshold(),
            target_milestones: default_target_milestones(),
            max_milestones: None,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_weight: default_base_weight(),
            source_weight: default_source_weight(),
            setup_weight: default_setup_weight(),
            data_weight: default_data_weight(),
            commit_weight: default_commit_weight(),
            file_weight: default_file_weight(),
            taper: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subscriber_wait_ms: default_subscriber_wait_ms(),
            on_milestone_failure: FailurePolicy::default(),
        }
    }
}

impl FromStr for SegmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adjacent" => Ok(SegmentStrategy::Adjacent),
            "heuristic" => Ok(SegmentStrategy::Heuristic),
            "even" => Ok(SegmentStrategy::Even),
            other => Err(format!(
                "unknown strategy '{}', expected adjacent, heuristic or even",
                other
            )),
        }
    }
}

impl fmt::Display for SegmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentStrategy::Adjacent => "adjacent",
            SegmentStrategy::Heuristic => "heuristic",
            SegmentStrategy::Even => "even",
        };
        f.write_str(name)
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "unknown failure policy '{}', expected continue or abort",
                other
            )),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, StreamError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or fall back to defaults
    pub fn load_or_default() -> Result<Self, StreamError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), StreamError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.git.binary.trim().is_empty() {
            return Err(invalid("git.binary", "must not be empty"));
        }

        if self.git.log_depth == Some(0) {
            return Err(invalid("git.log_depth", "must be greater than 0 when set"));
        }

        if !(0.0..=1.0).contains(&self.git.max_malformed_ratio) {
            return Err(invalid(
                "git.max_malformed_ratio",
                format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.git.max_malformed_ratio
                ),
            ));
        }

        if !(self.segmentation.score_threshold > 0.0) {
            return Err(invalid(
                "segmentation.score_threshold",
                "must be greater than 0",
            ));
        }

        if self.segmentation.target_milestones == 0 {
            return Err(invalid(
                "segmentation.target_milestones",
                "must be greater than 0",
            ));
        }

        if self.segmentation.max_milestones == Some(0) {
            return Err(invalid(
                "segmentation.max_milestones",
                "must be greater than 0 when set",
            ));
        }

        let weights = [
            ("scoring.base_weight", self.scoring.base_weight),
            ("scoring.source_weight", self.scoring.source_weight),
            ("scoring.setup_weight", self.scoring.setup_weight),
            ("scoring.data_weight", self.scoring.data_weight),
            ("scoring.commit_weight", self.scoring.commit_weight),
            ("scoring.file_weight", self.scoring.file_weight),
        ];
        for (key, value) in weights {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(invalid(
                    key,
                    format!("must be a finite non-negative number, got {}", value),
                ));
            }
        }

        if let Some(taper) = self.scoring.taper
            && !(taper > 0.0)
        {
            return Err(invalid("scoring.taper", "must be greater than 0 when set"));
        }

        if self.pipeline.subscriber_wait_ms == 0 {
            return Err(invalid(
                "pipeline.subscriber_wait_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(binary) = std::env::var("MILESTONE_STREAM_GIT_BINARY") {
            self.git.binary = binary;
        }

        if let Ok(depth) = std::env::var("MILESTONE_STREAM_LOG_DEPTH")
            && let Ok(depth) = depth.parse()
        {
            self.git.log_depth = Some(depth);
        }

        if let Ok(strategy) = std::env::var("MILESTONE_STREAM_STRATEGY")
            && let Ok(strategy) = strategy.parse()
        {
            self.segmentation.strategy = strategy;
        }

        if let Ok(threshold) = std::env::var("MILESTONE_STREAM_SCORE_THRESHOLD")
            && let Ok(threshold) = threshold.parse()
        {
            self.segmentation.score_threshold = threshold;
        }

        if let Ok(wait) = std::env::var("MILESTONE_STREAM_SUBSCRIBER_WAIT_MS")
            && let Ok(wait) = wait.parse()
        {
            self.pipeline.subscriber_wait_ms = wait;
        }

        if let Ok(policy) = std::env::var("MILESTONE_STREAM_ON_MILESTONE_FAILURE")
            && let Ok(policy) = policy.parse()
        {
            self.pipeline.on_milestone_failure = policy;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, StreamError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> StreamError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}
