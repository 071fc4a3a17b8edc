//! Shared fixture for integration tests, built on the crate's own
//! libgit2 fixture builder

#![allow(dead_code)]

#[path = "../../src/test_support.rs"]
mod fixture;

#[allow(unused_imports)]
pub(crate) use fixture::{FixtureRepo, numbered_lines};

/// `[A(root), B, C(tip)]`: B adds file1.txt (+10), C renames it to
/// file2.txt with one line changed and one appended (+2/-1)
pub(crate) fn rename_scenario() -> FixtureRepo {
    let repo = FixtureRepo::new();
    repo.commit("A: initial", &[("README.md", Some("# fixture\n"))]);
    let ten = numbered_lines(10);
    repo.commit("B: add file1", &[("file1.txt", Some(ten.as_str()))]);
    let mut renamed = numbered_lines(9);
    renamed.push_str("line ten\nline 11\n");
    repo.commit(
        "C: rename file1 to file2",
        &[("file1.txt", None), ("file2.txt", Some(renamed.as_str()))],
    );
    repo
}
