//! Turns an ordered commit list into milestones
//!
//! Boundaries are indices into the commit list as returned by the reader; the
//! list is never re-sorted. Each pair of consecutive boundaries becomes one
//! milestone whose change set is the cumulative diff between them.

use crate::config::{SegmentStrategy, SegmentationConfig};
use crate::error::SegmentError;
use crate::git::GitRepository;
use crate::milestone::scoring::{ScoringPolicy, StepWork};
use crate::types::{Commit, Milestone};
use futures::stream::{self, StreamExt, TryStreamExt};

/// Number of git queries kept in flight while scoring or segmenting
const CONCURRENT_QUERIES: usize = 4;

/// Builds milestones from commits of one repository
#[derive(Debug, Clone, Copy)]
pub struct Segmenter<'a> {
    repo: &'a GitRepository,
}

impl<'a> Segmenter<'a> {
    pub fn new(repo: &'a GitRepository) -> Self {
        Self { repo }
    }

    /// Compute the milestone spanning `start..end`
    ///
    /// Numstat, name-status and the subject log run concurrently. Any failure
    /// fails the whole milestone; nothing is partially reported.
    pub async fn compute(&self, start: &Commit, end: &Commit) -> Result<Milestone, SegmentError> {
        tracing::debug!(
            "Computing milestone {}..{}",
            start.short_hash(),
            end.short_hash()
        );

        let (changes, messages) = tokio::try_join!(
            self.repo.range_changes(&start.hash, &end.hash),
            self.repo.commit_subjects(&start.hash, &end.hash),
        )
        .map_err(|e| SegmentError::MilestoneComputationFailed {
            start: start.hash.clone(),
            end: end.hash.clone(),
            reason: e.to_string(),
        })?;

        Ok(Milestone {
            start_commit: start.hash.clone(),
            end_commit: end.hash.clone(),
            time_start: start.committer_timestamp,
            time_end: end.committer_timestamp,
            messages,
            changes,
            repository: self.repo.path().to_path_buf(),
        })
    }

    /// One milestone per adjacent commit pair, in input order
    ///
    /// Fewer than two commits yield no milestones.
    pub async fn segment(&self, commits: &[Commit]) -> Result<Vec<Milestone>, SegmentError> {
        if commits.len() < 2 {
            return Ok(Vec::new());
        }
        self.segment_at(commits, &adjacent_boundaries(commits.len()))
            .await
    }

    /// One milestone per pair of consecutive `boundaries`
    pub async fn segment_at(
        &self,
        commits: &[Commit],
        boundaries: &[usize],
    ) -> Result<Vec<Milestone>, SegmentError> {
        let pairs = pairs(commits, boundaries)?;

        stream::iter(pairs)
            .map(|(start, end)| self.compute(start, end))
            .buffered(CONCURRENT_QUERIES)
            .try_collect()
            .await
    }

    /// Work score of the single step `start..end`
    pub async fn score_pair(
        &self,
        start: &Commit,
        end: &Commit,
        policy: &dyn ScoringPolicy,
    ) -> Result<f64, SegmentError> {
        let numstat = self
            .repo
            .numstat(&start.hash, &end.hash)
            .await
            .map_err(|e| SegmentError::MilestoneComputationFailed {
                start: start.hash.clone(),
                end: end.hash.clone(),
                reason: e.to_string(),
            })?;
        Ok(policy.score(&StepWork::from_numstat(1, &numstat)))
    }

    /// Work score of every adjacent step, `commits.len() - 1` entries
    pub async fn score_steps(
        &self,
        commits: &[Commit],
        policy: &dyn ScoringPolicy,
    ) -> Result<Vec<f64>, SegmentError> {
        let steps: Vec<_> = commits
            .windows(2)
            .map(|pair| self.score_pair(&pair[0], &pair[1], policy))
            .collect();

        stream::iter(steps)
            .buffered(CONCURRENT_QUERIES)
            .try_collect()
            .await
    }

    /// Boundary indices for the configured strategy
    pub async fn boundaries(
        &self,
        commits: &[Commit],
        config: &SegmentationConfig,
        policy: &dyn ScoringPolicy,
    ) -> Result<Vec<usize>, SegmentError> {
        let n = commits.len();
        let boundaries = match config.strategy {
            SegmentStrategy::Adjacent => adjacent_boundaries(n),
            SegmentStrategy::Even => even_boundaries(n, config.target_milestones),
            SegmentStrategy::Heuristic => {
                if n < 2 {
                    adjacent_boundaries(n)
                } else {
                    let scores = self.score_steps(commits, policy).await?;
                    heuristic_boundaries(&scores, config.score_threshold)
                }
            }
        };

        tracing::debug!(
            "Strategy {} chose {} boundaries over {} commits",
            config.strategy,
            boundaries.len(),
            n
        );
        Ok(boundaries)
    }
}

/// Validate `boundaries` and pair up the commits they select
///
/// Boundaries must be strictly increasing, in range, and at least two.
pub fn pairs<'c>(
    commits: &'c [Commit],
    boundaries: &[usize],
) -> Result<Vec<(&'c Commit, &'c Commit)>, SegmentError> {
    if commits.len() < 2 {
        return Err(SegmentError::NotEnoughCommits(commits.len()));
    }
    if boundaries.len() < 2 {
        return Err(SegmentError::InvalidBoundaries(format!(
            "need at least two boundaries, got {}",
            boundaries.len()
        )));
    }
    if let Some(&out) = boundaries.iter().find(|&&b| b >= commits.len()) {
        return Err(SegmentError::InvalidBoundaries(format!(
            "index {} is out of range for {} commits",
            out,
            commits.len()
        )));
    }
    if let Some(w) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
        return Err(SegmentError::InvalidBoundaries(format!(
            "indices must be strictly increasing, found {} then {}",
            w[0], w[1]
        )));
    }

    Ok(boundaries
        .windows(2)
        .map(|w| (&commits[w[0]], &commits[w[1]]))
        .collect())
}

/// Every index: one milestone per adjacent pair
pub fn adjacent_boundaries(n: usize) -> Vec<usize> {
    (0..n).collect()
}

/// About `target` groups of consecutive steps; leftover steps go to the
/// earliest groups
pub fn even_boundaries(n: usize, target: usize) -> Vec<usize> {
    if n < 2 {
        return adjacent_boundaries(n);
    }

    let steps = n - 1;
    let groups = target.clamp(1, steps);
    let base = steps / groups;
    let extra = steps % groups;

    let mut boundaries = Vec::with_capacity(groups + 1);
    let mut index = 0;
    boundaries.push(index);
    for group in 0..groups {
        index += base + usize::from(group < extra);
        boundaries.push(index);
    }
    boundaries
}

/// Cut a boundary whenever the running step score reaches `threshold`
///
/// `step_scores[i]` is the score of the step from commit `i` to `i + 1`. The
/// last group is always closed at the final commit, even under threshold.
pub fn heuristic_boundaries(step_scores: &[f64], threshold: f64) -> Vec<usize> {
    let mut boundaries = vec![0];
    if step_scores.is_empty() {
        return boundaries;
    }

    let last = step_scores.len();
    let mut running = 0.0;
    for (i, score) in step_scores.iter().enumerate() {
        running += score;
        let end = i + 1;
        if running >= threshold && end < last {
            boundaries.push(end);
            running = 0.0;
        }
    }
    boundaries.push(last);
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitConfig;
    use crate::milestone::scoring::ChurnScoringPolicy;
    use crate::test_support::{FixtureRepo, numbered_lines};
    use crate::types::{FileChange, FileStatus};
    use std::path::PathBuf;

    fn commit(hash: &str) -> Commit {
        Commit {
            hash: hash.to_string(),
            parent_hashes: vec![],
            author_name: "a".to_string(),
            author_timestamp: 0,
            committer_timestamp: 0,
            subject: hash.to_string(),
            repository: PathBuf::new(),
        }
    }

    #[test]
    fn test_adjacent_boundaries() {
        assert_eq!(adjacent_boundaries(0), Vec::<usize>::new());
        assert_eq!(adjacent_boundaries(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_even_boundaries_distributes_remainder_first() {
        // 10 commits, 9 steps, 4 groups: 3, 2, 2, 2
        assert_eq!(even_boundaries(10, 4), vec![0, 3, 5, 7, 9]);
        assert_eq!(even_boundaries(5, 2), vec![0, 2, 4]);
    }

    #[test]
    fn test_even_boundaries_caps_at_step_count() {
        assert_eq!(even_boundaries(3, 10), vec![0, 1, 2]);
        assert_eq!(even_boundaries(4, 1), vec![0, 3]);
        assert_eq!(even_boundaries(1, 5), vec![0]);
    }

    #[test]
    fn test_heuristic_boundaries() {
        let scores = [10.0, 30.0, 5.0, 50.0, 1.0, 1.0];
        assert_eq!(heuristic_boundaries(&scores, 40.0), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_heuristic_emits_last_partial_group() {
        assert_eq!(heuristic_boundaries(&[1.0, 1.0, 1.0], 100.0), vec![0, 3]);
        assert_eq!(heuristic_boundaries(&[100.0, 100.0], 50.0), vec![0, 1, 2]);
        assert_eq!(heuristic_boundaries(&[], 50.0), vec![0]);
    }

    #[test]
    fn test_pairs_validation() {
        let commits: Vec<_> = ["a", "b", "c", "d"].iter().map(|h| commit(h)).collect();

        let selected = pairs(&commits, &[0, 2, 3]).unwrap();
        let hashes: Vec<_> = selected
            .iter()
            .map(|(s, e)| (s.hash.as_str(), e.hash.as_str()))
            .collect();
        assert_eq!(hashes, vec![("a", "c"), ("c", "d")]);

        assert!(matches!(
            pairs(&commits, &[0]),
            Err(SegmentError::InvalidBoundaries(_))
        ));
        assert!(matches!(
            pairs(&commits, &[0, 4]),
            Err(SegmentError::InvalidBoundaries(_))
        ));
        assert!(matches!(
            pairs(&commits, &[0, 2, 2]),
            Err(SegmentError::InvalidBoundaries(_))
        ));
        assert!(matches!(
            pairs(&commits[..1], &[0, 0]),
            Err(SegmentError::NotEnoughCommits(1))
        ));
    }

    #[tokio::test]
    async fn test_segment_concrete_rename_scenario() {
        let fixture = FixtureRepo::new();
        fixture.commit("root", &[("README", Some("readme\n"))]);
        fixture.commit("add file1", &[("file1.txt", Some(numbered_lines(10).as_str()))]);
        let mut renamed = numbered_lines(9);
        renamed.push_str("line ten\nline 11\n");
        fixture.commit(
            "rename to file2",
            &[("file1.txt", None), ("file2.txt", Some(renamed.as_str()))],
        );

        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_history(None).await.unwrap();
        assert_eq!(commits.len(), 3);

        let milestones = Segmenter::new(&repo).segment(&commits).await.unwrap();
        assert_eq!(milestones.len(), 2);

        assert_eq!(milestones[0].start_commit, commits[0].hash);
        assert_eq!(milestones[0].end_commit, commits[1].hash);
        assert_eq!(
            milestones[0].changes,
            vec![FileChange {
                status: FileStatus::Added,
                path: "file1.txt".to_string(),
                old_path: None,
                insertions: Some(10),
                deletions: Some(0),
            }]
        );
        assert_eq!(milestones[0].messages, vec!["add file1".to_string()]);

        assert_eq!(milestones[1].start_commit, commits[1].hash);
        assert_eq!(milestones[1].end_commit, commits[2].hash);
        assert_eq!(milestones[1].changes.len(), 1);
        let change = &milestones[1].changes[0];
        assert!(change.status.is_rename());
        assert_eq!(change.path, "file2.txt");
        assert_eq!(change.old_path.as_deref(), Some("file1.txt"));
        assert_eq!(change.insertions, Some(2));
        assert_eq!(change.deletions, Some(1));

        assert_eq!(milestones[1].time_start, commits[1].committer_timestamp);
        assert_eq!(milestones[1].time_end, commits[2].committer_timestamp);
    }

    #[tokio::test]
    async fn test_segment_yields_n_minus_one_consecutive_milestones() {
        let fixture = FixtureRepo::new();
        for i in 0..5 {
            fixture.commit(&format!("commit {}", i), &[("f.txt", Some(numbered_lines(i + 1).as_str()))]);
        }

        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_first_parent_log(None).await.unwrap();
        let milestones = Segmenter::new(&repo).segment(&commits).await.unwrap();

        assert_eq!(milestones.len(), commits.len() - 1);
        for (milestone, pair) in milestones.iter().zip(commits.windows(2)) {
            assert_eq!(milestone.start_commit, pair[0].hash);
            assert_eq!(milestone.end_commit, pair[1].hash);
            assert_eq!(milestone.messages, vec![pair[1].subject.clone()]);
        }
    }

    #[tokio::test]
    async fn test_merge_milestone_lists_side_branch_messages() {
        let fixture = FixtureRepo::new();
        fixture.commit("A", &[("a.txt", Some("a\n"))]);
        fixture.merge_side_branch("SIDE", &[("side.txt", "s\n")], "MERGE");

        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_first_parent_log(None).await.unwrap();
        assert_eq!(commits.len(), 2);

        let milestones = Segmenter::new(&repo).segment(&commits).await.unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(
            milestones[0].messages,
            vec!["SIDE".to_string(), "MERGE".to_string()]
        );
        assert_eq!(
            milestones[0].changes,
            vec![FileChange {
                status: FileStatus::Added,
                path: "side.txt".to_string(),
                old_path: None,
                insertions: Some(1),
                deletions: Some(0),
            }]
        );
    }

    #[tokio::test]
    async fn test_segment_short_input_is_empty() {
        let fixture = FixtureRepo::new();
        fixture.commit("only", &[("f.txt", Some("x\n"))]);
        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_first_parent_log(None).await.unwrap();

        let segmenter = Segmenter::new(&repo);
        assert!(segmenter.segment(&commits).await.unwrap().is_empty());
        assert!(segmenter.segment(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_segment_at_squashes_messages() {
        let fixture = FixtureRepo::new();
        fixture.commit("one", &[("a.txt", Some("1\n"))]);
        fixture.commit("two", &[("a.txt", Some("2\n"))]);
        fixture.commit("three", &[("b.txt", Some("3\n"))]);

        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_first_parent_log(None).await.unwrap();
        let milestones = Segmenter::new(&repo)
            .segment_at(&commits, &[0, 2])
            .await
            .unwrap();

        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].messages, vec!["two".to_string(), "three".to_string()]);
        let paths: Vec<_> = milestones[0].changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_compute_unknown_commit_fails_atomically() {
        let fixture = FixtureRepo::new();
        fixture.commit("one", &[("a.txt", Some("1\n"))]);
        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_first_parent_log(None).await.unwrap();

        let bogus = commit("0123456789abcdef0123456789abcdef01234567");
        let err = Segmenter::new(&repo)
            .compute(&commits[0], &bogus)
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentError::MilestoneComputationFailed { .. }));
    }

    #[tokio::test]
    async fn test_heuristic_strategy_groups_small_steps() {
        let fixture = FixtureRepo::new();
        fixture.commit("base", &[("notes.md", Some("x\n"))]);
        for i in 1..=4 {
            fixture.commit(&format!("edit {}", i), &[("notes.md", Some(numbered_lines(i).as_str()))]);
        }

        let repo = GitRepository::open(fixture.path(), &GitConfig::default()).unwrap();
        let commits = repo.fetch_first_parent_log(None).await.unwrap();
        let segmenter = Segmenter::new(&repo);
        let policy = ChurnScoringPolicy::default();

        let scores = segmenter.score_steps(&commits, &policy).await.unwrap();
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|s| *s > 0.0));

        let config = SegmentationConfig {
            strategy: SegmentStrategy::Heuristic,
            score_threshold: 1_000_000.0,
            ..SegmentationConfig::default()
        };
        let boundaries = segmenter.boundaries(&commits, &config, &policy).await.unwrap();
        assert_eq!(boundaries, vec![0, 4]);
    }
}
