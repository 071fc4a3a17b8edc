use crate::config::GitConfig;
use crate::error::GitError;
use crate::git::command::GitCommand;
use crate::git::parse::{self, LOG_FORMAT, RECORD_SEP};
use crate::types::Commit;
use std::path::{Path, PathBuf};

/// Read-only handle on a local repository, queried through the `git` executable
///
/// Cloning is cheap; the handle holds only the path and the command settings.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
    git: GitCommand,
    max_malformed_ratio: f64,
}

impl GitRepository {
    /// Open a repository, failing fast when the path does not hold one
    pub fn open<P: AsRef<Path>>(path: P, config: &GitConfig) -> Result<Self, GitError> {
        let path = path.as_ref();

        git2::Repository::open(path).map_err(|e| {
            GitError::unavailable(path.display().to_string(), e.message().to_string())
        })?;

        tracing::debug!("Opened git repository at: {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            git: GitCommand::new(config.binary.clone()),
            max_malformed_ratio: config.max_malformed_ratio,
        })
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        self.git.output(&self.path, args).await
    }

    fn unavailable(&self, err: GitError) -> GitError {
        match err {
            GitError::HistoryUnavailable { .. } => err,
            other => GitError::unavailable(self.path.display().to_string(), other.to_string()),
        }
    }

    /// Read the first-parent history of `HEAD`, oldest first
    ///
    /// Merges appear as single entries; their second-parent ancestry is not
    /// walked. With `depth`, only the newest `depth` commits are read.
    /// Malformed records are skipped with a warning unless their share of the
    /// output exceeds the configured ratio, which fails the whole fetch.
    pub async fn fetch_first_parent_log(
        &self,
        depth: Option<usize>,
    ) -> Result<Vec<Commit>, GitError> {
        let max_count = depth.map(|d| format!("--max-count={}", d));
        let mut args = vec!["log", "--first-parent", "--no-color", LOG_FORMAT];
        if let Some(max_count) = max_count.as_deref() {
            args.push(max_count);
        }
        args.push("HEAD");

        let output = self.git(&args).await.map_err(|e| self.unavailable(e))?;
        let parsed = parse::parse_log(&output, &self.path);

        if parsed.malformed > 0 {
            let ratio = parsed.malformed_ratio();
            if ratio > self.max_malformed_ratio {
                return Err(GitError::unavailable(
                    self.path.display().to_string(),
                    format!(
                        "{} of {} log records were malformed",
                        parsed.malformed,
                        parsed.total_records()
                    ),
                ));
            }
            tracing::warn!(
                "Skipped {} malformed log records out of {}",
                parsed.malformed,
                parsed.total_records()
            );
        }

        let mut commits = parsed.commits;
        commits.reverse();

        tracing::info!(
            "Read {} first-parent commits from {}",
            commits.len(),
            self.path.display()
        );
        Ok(commits)
    }

    /// Fetch the chronologically first (root) or last (tip) commit of `HEAD`
    ///
    /// On an unborn `HEAD` (no commits yet) git itself exits non-zero, which
    /// surfaces as `HistoryUnavailable`. `EmptyHistory` is reserved for a
    /// successful root query that lists no commit.
    pub async fn fetch_boundary_commit(&self, want_first: bool) -> Result<Commit, GitError> {
        let rev = if want_first {
            let roots = self
                .git(&["rev-list", "--max-parents=0", "--first-parent", "HEAD"])
                .await
                .map_err(|e| self.unavailable(e))?;

            // Several roots are possible after unrelated-history merges; the
            // first-parent walk lists the one on the mainline last.
            match roots.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
                Some(root) => root.to_string(),
                None => return Err(GitError::EmptyHistory(self.path.display().to_string())),
            }
        } else {
            "HEAD".to_string()
        };

        self.fetch_commit(&rev).await
    }

    /// Fetch a single commit by revision, with the same fields as the bulk log
    pub async fn fetch_commit(&self, rev: &str) -> Result<Commit, GitError> {
        let output = self
            .git(&["log", "-1", "--no-color", LOG_FORMAT, rev, "--"])
            .await
            .map_err(|e| self.unavailable(e))?;

        let parsed = parse::parse_log(&output, &self.path);
        parsed.commits.into_iter().next().ok_or_else(|| {
            GitError::unavailable(
                self.path.display().to_string(),
                format!("could not parse commit '{}'", rev),
            )
        })
    }

    /// Assemble the milestone input list: root, the bounded log, then the tip
    ///
    /// With a depth bound the root is usually not part of the log and is
    /// prepended; it is never repeated when it is.
    pub async fn fetch_history(&self, depth: Option<usize>) -> Result<Vec<Commit>, GitError> {
        let first = self.fetch_boundary_commit(true).await?;
        let log = self.fetch_first_parent_log(depth).await?;
        let last = self.fetch_boundary_commit(false).await?;

        let root_hash = first.hash.clone();
        let mut commits = Vec::with_capacity(log.len() + 2);
        commits.push(first);
        commits.extend(log.into_iter().filter(|c| c.hash != root_hash));

        if commits.last().map(|c| c.hash != last.hash).unwrap_or(true) {
            commits.push(last);
        }

        Ok(commits)
    }

    /// Subjects of the commits in `(start, end]`, oldest first
    pub async fn commit_subjects(&self, start: &str, end: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{}..{}", start, end);
        let output = self
            .git(&["log", "--no-color", "--format=%s%x1e", &range, "--"])
            .await?;

        let mut subjects: Vec<String> = output
            .split(RECORD_SEP)
            .map(|s| s.trim_matches(|c| c == '\n' || c == '\r'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        subjects.reverse();
        Ok(subjects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixtureRepo;
    use tempfile::TempDir;

    fn open(fixture: &FixtureRepo) -> GitRepository {
        GitRepository::open(fixture.path(), &GitConfig::default()).expect("Should open fixture")
    }

    #[test]
    fn test_open_non_repository() {
        let dir = TempDir::new().unwrap();
        let err = GitRepository::open(dir.path(), &GitConfig::default()).unwrap_err();
        assert!(matches!(err, GitError::HistoryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_first_parent_log_is_chronological() {
        let fixture = FixtureRepo::new();
        let a = fixture.commit("first", &[("a.txt", Some("a\n"))]);
        let b = fixture.commit("second", &[("b.txt", Some("b\n"))]);
        let c = fixture.commit("third", &[("c.txt", Some("c\n"))]);

        let repo = open(&fixture);
        let commits = repo.fetch_first_parent_log(None).await.unwrap();

        let hashes: Vec<_> = commits.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes, vec![a, b, c]);
        assert_eq!(commits[0].subject, "first");
        assert_eq!(commits[0].author_name, "Fixture Author");
        assert!(commits[0].is_root());
        assert_eq!(commits[1].parent_hashes, vec![commits[0].hash.clone()]);
        assert_eq!(commits[0].hash.len(), 40);
        assert!(commits[0].committer_timestamp < commits[2].committer_timestamp);
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let fixture = FixtureRepo::new();
        fixture.commit("one", &[("a.txt", Some("1\n"))]);
        let two = fixture.commit("two", &[("a.txt", Some("2\n"))]);
        let three = fixture.commit("three", &[("a.txt", Some("3\n"))]);

        let repo = open(&fixture);
        let commits = repo.fetch_first_parent_log(Some(2)).await.unwrap();
        let hashes: Vec<_> = commits.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes, vec![two, three]);
    }

    #[tokio::test]
    async fn test_boundary_commits() {
        let fixture = FixtureRepo::new();
        let root = fixture.commit("root", &[("a.txt", Some("1\n"))]);
        fixture.commit("middle", &[("a.txt", Some("2\n"))]);
        let tip = fixture.commit("tip", &[("a.txt", Some("3\n"))]);

        let repo = open(&fixture);
        let first = repo.fetch_boundary_commit(true).await.unwrap();
        let last = repo.fetch_boundary_commit(false).await.unwrap();

        assert_eq!(first.hash, root);
        assert_eq!(first.subject, "root");
        assert!(first.is_root());
        assert_eq!(last.hash, tip);
        assert_eq!(last.subject, "tip");
        assert_eq!(last.parent_hashes.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_repository_history_unavailable() {
        let fixture = FixtureRepo::new();
        let repo = open(&fixture);

        let err = repo.fetch_boundary_commit(true).await.unwrap_err();
        assert!(matches!(err, GitError::HistoryUnavailable { .. }));

        let err = repo.fetch_first_parent_log(None).await.unwrap_err();
        assert!(matches!(err, GitError::HistoryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_history_prepends_root_once() {
        let fixture = FixtureRepo::new();
        let root = fixture.commit("root", &[("a.txt", Some("1\n"))]);
        fixture.commit("two", &[("a.txt", Some("2\n"))]);
        fixture.commit("three", &[("a.txt", Some("3\n"))]);
        let tip = fixture.commit("four", &[("a.txt", Some("4\n"))]);

        let repo = open(&fixture);

        let full = repo.fetch_history(None).await.unwrap();
        assert_eq!(full.len(), 4);
        assert_eq!(full[0].hash, root);
        assert_eq!(full[3].hash, tip);

        let bounded = repo.fetch_history(Some(2)).await.unwrap();
        assert_eq!(bounded.len(), 3);
        assert_eq!(bounded[0].hash, root);
        assert_eq!(bounded[2].hash, tip);
    }

    #[tokio::test]
    async fn test_commit_subjects_range() {
        let fixture = FixtureRepo::new();
        let a = fixture.commit("a", &[("f.txt", Some("1\n"))]);
        fixture.commit("b", &[("f.txt", Some("2\n"))]);
        let c = fixture.commit("c", &[("f.txt", Some("3\n"))]);

        let repo = open(&fixture);
        let subjects = repo.commit_subjects(&a, &c).await.unwrap();
        assert_eq!(subjects, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_first_parent_log_skips_merged_side_branch() {
        let fixture = FixtureRepo::new();
        let a = fixture.commit("A", &[("a.txt", Some("a\n"))]);
        let (side, merge) = fixture.merge_side_branch("SIDE", &[("side.txt", "s\n")], "MERGE");

        let repo = open(&fixture);
        let commits = repo.fetch_first_parent_log(None).await.unwrap();

        let subjects: Vec<_> = commits.iter().map(|c| c.subject.as_str()).collect();
        assert_eq!(subjects, vec!["A", "MERGE"]);
        assert!(commits[1].is_merge());
        assert_eq!(commits[1].parent_hashes, vec![a.clone(), side]);
        assert_eq!(commits[1].hash, merge);

        let subjects = repo.commit_subjects(&a, &merge).await.unwrap();
        assert_eq!(subjects, vec!["SIDE".to_string(), "MERGE".to_string()]);
    }

    #[tokio::test]
    async fn test_high_malformed_share_fails_fetch() {
        let fixture = FixtureRepo::new();
        fixture.commit("good", &[("a.txt", Some("1\n"))]);
        fixture.commit("bad\u{1f}subject", &[("a.txt", Some("2\n"))]);

        let repo = open(&fixture);
        let err = repo.fetch_first_parent_log(None).await.unwrap_err();
        match err {
            GitError::HistoryUnavailable { reason, .. } => {
                assert_eq!(reason, "1 of 2 log records were malformed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_low_malformed_share_is_skipped() {
        let fixture = FixtureRepo::new();
        for i in 0..11 {
            fixture.commit(&format!("good {}", i), &[("a.txt", Some(i.to_string().as_str()))]);
        }
        let bad = fixture.commit("bad\u{1f}subject", &[("a.txt", Some("bad"))]);

        let repo = open(&fixture);
        let commits = repo.fetch_first_parent_log(None).await.unwrap();
        assert_eq!(commits.len(), 11);
        assert!(commits.iter().all(|c| c.hash != bad));
        assert_eq!(commits[10].subject, "good 10");
    }
}
