//! Core data model: commits, file changes and milestones

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A single commit as reported by the version-control tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Commit {
    /// Full commit SHA (hex)
    pub hash: String,
    /// Parent SHAs in order; empty for a root, two or more for a merge
    pub parent_hashes: Vec<String>,
    pub author_name: String,
    /// Author timestamp (Unix epoch seconds)
    pub author_timestamp: i64,
    /// Committer timestamp (Unix epoch seconds)
    pub committer_timestamp: i64,
    /// First line of the commit message
    pub subject: String,
    /// Repository this commit was read from; a lookup key only
    pub repository: PathBuf,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() >= 2
    }

    /// Abbreviated hash for log lines
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(self.hash.as_str())
    }
}

/// Kind of change a file underwent within a diff range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    /// Renamed with the similarity index (0-100) reported by the tool
    Renamed { similarity: u8 },
    /// Copied with the similarity index (0-100) reported by the tool
    Copied { similarity: u8 },
    TypeChanged,
}

impl FileStatus {
    /// Parse a name-status code such as `M`, `A`, `R087` or `C100`
    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.chars();
        let letter = chars.next()?;
        let rest = chars.as_str();
        let similarity = || rest.parse::<u8>().ok().map(|s| s.min(100)).unwrap_or(0);

        match letter {
            'A' => Some(FileStatus::Added),
            'M' => Some(FileStatus::Modified),
            'D' => Some(FileStatus::Deleted),
            'T' => Some(FileStatus::TypeChanged),
            'R' => Some(FileStatus::Renamed {
                similarity: similarity(),
            }),
            'C' => Some(FileStatus::Copied {
                similarity: similarity(),
            }),
            _ => None,
        }
    }

    /// Single-letter code (`A`, `M`, `D`, `R`, `C`, `T`)
    pub fn letter(&self) -> char {
        match self {
            FileStatus::Added => 'A',
            FileStatus::Modified => 'M',
            FileStatus::Deleted => 'D',
            FileStatus::Renamed { .. } => 'R',
            FileStatus::Copied { .. } => 'C',
            FileStatus::TypeChanged => 'T',
        }
    }

    pub fn is_rename(&self) -> bool {
        matches!(self, FileStatus::Renamed { .. })
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Renamed { similarity } | FileStatus::Copied { similarity } => {
                write!(f, "{}{:03}", self.letter(), similarity)
            }
            _ => write!(f, "{}", self.letter()),
        }
    }
}

/// One file's entry in a milestone's cumulative diff
///
/// `insertions`/`deletions` are `None` when the count is unknowable (binary
/// content, or no numstat record for the path). `None` never means zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileChange {
    pub status: FileStatus,
    /// Current path (the new path for renames)
    pub path: String,
    /// Source path, present only for renames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub insertions: Option<u64>,
    pub deletions: Option<u64>,
}

impl FileChange {
    /// Whether `path` names this change, either by its current or its source path
    pub fn matches_path(&self, path: &str) -> bool {
        self.path == path || self.old_path.as_deref() == Some(path)
    }

    /// Known insertions plus deletions, or `None` if either is unknown
    pub fn churn(&self) -> Option<u64> {
        Some(self.insertions? + self.deletions?)
    }
}

/// A bounded unit of history: two boundary commits, the cumulative file
/// changes between them and the squashed subjects of the commits in range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Milestone {
    pub start_commit: String,
    pub end_commit: String,
    /// Committer timestamp of the start commit
    pub time_start: i64,
    /// Committer timestamp of the end commit
    pub time_end: i64,
    /// Commit subjects in `(start, end]`, oldest first
    pub messages: Vec<String>,
    pub changes: Vec<FileChange>,
    pub repository: PathBuf,
}

impl Milestone {
    /// Find the change entry for a current or source path
    pub fn find_change(&self, path: &str) -> Option<&FileChange> {
        self.changes.iter().find(|c| c.matches_path(path))
    }

    /// `start..end` range notation
    pub fn range(&self) -> String {
        format!("{}..{}", self.start_commit, self.end_commit)
    }
}
