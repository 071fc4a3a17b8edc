/// Centralized error types for milestone-stream using thiserror
///
/// Each subsystem has its own enum; `StreamError` wraps them for callers that
/// cross subsystem boundaries (the run driver, the CLI).
use thiserror::Error;

/// Main error type for the milestone streaming system
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Segmentation error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while reading history through the version-control tool
#[derive(Error, Debug)]
pub enum GitError {
    #[error("History unavailable for '{repo}': {reason}")]
    HistoryUnavailable { repo: String, reason: String },

    #[error("Repository '{0}' has no root commit")]
    EmptyHistory(String),

    #[error("git {args} exited with {status}: {stderr}")]
    CommandFailed {
        args: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to spawn git: {0}")]
    Spawn(String),
}

/// Errors raised while turning commits into milestones
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Failed to compute milestone {start}..{end}: {reason}")]
    MilestoneComputationFailed {
        start: String,
        end: String,
        reason: String,
    },

    #[error("Invalid milestone boundaries: {0}")]
    InvalidBoundaries(String),

    #[error("At least two commits are required, got {0}")]
    NotEnoughCommits(usize),
}

/// Errors raised by the lazy per-file diff query
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("File '{0}' is not part of this milestone's changes")]
    DiffFileNotFound(String),

    #[error("Failed to fetch diff: {0}")]
    Git(#[from] GitError),
}

/// Errors raised by the event log and the run registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Run id '{0}' is already registered")]
    DuplicateRunId(String),

    #[error("Run id '{0}' is not registered")]
    RunNotFound(String),

    #[error("Pipeline has already reached a terminal state")]
    Closed,

    #[error("Event type '{0}' is reserved for terminal transitions")]
    ReservedEventKind(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<anyhow::Error> for StreamError {
    fn from(err: anyhow::Error) -> Self {
        StreamError::Other(format!("{:#}", err))
    }
}

impl GitError {
    /// Build a `HistoryUnavailable` for the given repository path
    pub fn unavailable(repo: impl Into<String>, reason: impl Into<String>) -> Self {
        GitError::HistoryUnavailable {
            repo: repo.into(),
            reason: reason.into(),
        }
    }
}

impl StreamError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        StreamError::Other(msg.into())
    }

    /// Convert to a user-facing error string suitable for an `error` event
    pub fn to_user_string(&self) -> String {
        format!("{}", self)
    }

    /// Check if this is a caller error (bad input) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StreamError::Diff(DiffError::DiffFileNotFound(_))
                | StreamError::Pipeline(PipelineError::DuplicateRunId(_))
                | StreamError::Segment(SegmentError::InvalidBoundaries(_))
                | StreamError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    ///
    /// History failures are never retried here; a fresh clone is the caller's job.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::Io(_))
    }
}
