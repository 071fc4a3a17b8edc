//! Fixture repositories for tests, built with libgit2 so no git identity or
//! global configuration is needed
//!
//! Integration tests include this file through `tests/common`.

#![allow(dead_code)]

use git2::{Repository, Signature, Time};
use std::cell::Cell;
use std::path::Path;
use tempfile::TempDir;

/// Start of fixture time; each commit is one hour after the previous one
const BASE_TIME: i64 = 1_704_067_200;

pub(crate) struct FixtureRepo {
    dir: TempDir,
    repo: Repository,
    clock: Cell<i64>,
}

impl FixtureRepo {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let repo = Repository::init(dir.path()).expect("init repository");
        Self {
            dir,
            repo,
            clock: Cell::new(BASE_TIME),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write (`Some`) or delete (`None`) files and commit them on `HEAD`
    pub(crate) fn commit(&self, message: &str, files: &[(&str, Option<&str>)]) -> String {
        let mut index = self.repo.index().expect("open index");
        for (name, content) in files {
            let full = self.path().join(name);
            match content {
                Some(content) => {
                    if let Some(parent) = full.parent() {
                        std::fs::create_dir_all(parent).expect("create parent dirs");
                    }
                    std::fs::write(&full, content).expect("write file");
                    index.add_path(Path::new(name)).expect("stage file");
                }
                None => {
                    std::fs::remove_file(&full).expect("remove file");
                    index.remove_path(Path::new(name)).expect("unstage file");
                }
            }
        }
        index.write().expect("write index");
        self.commit_index(message, &mut index)
    }

    /// Commit a single file with raw bytes
    pub(crate) fn commit_bytes(&self, message: &str, name: &str, bytes: &[u8]) -> String {
        let mut index = self.repo.index().expect("open index");
        std::fs::write(self.path().join(name), bytes).expect("write file");
        index.add_path(Path::new(name)).expect("stage file");
        index.write().expect("write index");
        self.commit_index(message, &mut index)
    }

    /// Commit `files` on a side branch forked from `HEAD`, then merge it back
    ///
    /// Returns `(side, merge)`. The merge's first parent is the old `HEAD`.
    pub(crate) fn merge_side_branch(
        &self,
        side_message: &str,
        files: &[(&str, &str)],
        merge_message: &str,
    ) -> (String, String) {
        let mut index = self.repo.index().expect("open index");
        for (name, content) in files {
            std::fs::write(self.path().join(name), content).expect("write file");
            index.add_path(Path::new(name)).expect("stage file");
        }
        index.write().expect("write index");

        let base = self.head_commit().expect("merge needs a base commit");
        let side = self.write_commit(Some("refs/heads/side"), side_message, &mut index, &[&base]);
        let side_commit = self.repo.find_commit(side).expect("find side commit");
        let merge = self.write_commit(
            Some("HEAD"),
            merge_message,
            &mut index,
            &[&base, &side_commit],
        );
        (side.to_string(), merge.to_string())
    }

    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    fn commit_index(&self, message: &str, index: &mut git2::Index) -> String {
        let parent = self.head_commit();
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.write_commit(Some("HEAD"), message, index, &parents)
            .to_string()
    }

    fn write_commit(
        &self,
        update_ref: Option<&str>,
        message: &str,
        index: &mut git2::Index,
        parents: &[&git2::Commit],
    ) -> git2::Oid {
        let time = self.clock.get();
        self.clock.set(time + 3600);

        let signature = Signature::new(
            "Fixture Author",
            "fixture@example.com",
            &Time::new(time, 0),
        )
        .expect("signature");
        let tree_id = index.write_tree().expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("find tree");

        self.repo
            .commit(update_ref, &signature, &signature, message, &tree, parents)
            .expect("create commit")
    }
}

/// `line 1\n` through `line n\n`
pub(crate) fn numbered_lines(n: usize) -> String {
    (1..=n).map(|i| format!("line {}\n", i)).collect()
}
