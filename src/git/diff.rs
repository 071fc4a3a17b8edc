//! Diff queries over a commit range
//!
//! Both the numeric and the status view are requested with rename detection
//! (`-M`) so their paths agree and can be reconciled by the new path.

use crate::error::{DiffError, GitError};
use crate::git::log::GitRepository;
use crate::git::parse::{self, LineCounts};
use crate::types::{FileChange, Milestone};
use std::collections::HashMap;

impl GitRepository {
    /// Per-path insertion/deletion counts for `start..end`, keyed by new path
    pub async fn numstat(
        &self,
        start: &str,
        end: &str,
    ) -> Result<HashMap<String, LineCounts>, GitError> {
        let output = self
            .git(&["diff", "--no-color", "--no-ext-diff", "-M", "--numstat", start, end, "--"])
            .await?;
        Ok(parse::parse_numstat(&output))
    }

    /// Change status per path for `start..end`, line counts left unknown
    pub async fn name_status(&self, start: &str, end: &str) -> Result<Vec<FileChange>, GitError> {
        let output = self
            .git(&["diff", "--no-color", "--no-ext-diff", "-M", "--name-status", start, end, "--"])
            .await?;
        Ok(parse::parse_name_status(&output))
    }

    /// Reconciled file changes for `start..end`
    ///
    /// Both views are fetched concurrently; if either fails nothing is returned.
    pub async fn range_changes(&self, start: &str, end: &str) -> Result<Vec<FileChange>, GitError> {
        let (numstat, changes) =
            tokio::try_join!(self.numstat(start, end), self.name_status(start, end))?;
        Ok(parse::reconcile(changes, &numstat))
    }

    /// Raw unified diff for `start..end` limited to `paths`
    pub async fn file_diff(&self, start: &str, end: &str, paths: &[&str]) -> Result<String, GitError> {
        let mut args = vec!["diff", "--no-color", "--no-ext-diff", "-M", start, end, "--"];
        args.extend_from_slice(paths);
        self.git(&args).await
    }
}

/// Fetch the textual diff of one file within a milestone's commit range
///
/// The milestone supplies only its boundary hashes and change list; the
/// repository handle is explicit. `path` may be the current or the source
/// path of a rename, in which case both sides are included so the rename
/// shows as such. Nothing is cached; each call re-runs the query.
pub async fn get_diff_for_file(
    repo: &GitRepository,
    milestone: &Milestone,
    path: &str,
) -> Result<String, DiffError> {
    let change = milestone
        .find_change(path)
        .ok_or_else(|| DiffError::DiffFileNotFound(path.to_string()))?;

    let mut paths = vec![change.path.as_str()];
    if let Some(old_path) = change.old_path.as_deref() {
        paths.push(old_path);
    }

    let diff = repo
        .file_diff(&milestone.start_commit, &milestone.end_commit, &paths)
        .await?;
    Ok(diff)
}
