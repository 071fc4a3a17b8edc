//! Parsers for the version-control tool's machine-oriented output
//!
//! Log records use non-printable separators (U+001F between fields, U+001E
//! between records), so a record that does not split into the expected field
//! count points at a parse problem rather than unusual commit text.

use crate::types::{Commit, FileChange, FileStatus};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

pub const FIELD_SEP: char = '\u{1f}';
pub const RECORD_SEP: char = '\u{1e}';

/// `--format` string producing one record per commit
pub const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%an%x1f%at%x1f%ct%x1f%s%x1e";

const LOG_FIELDS: usize = 6;

static BRACE_RENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*)\{(?P<old>.*) => (?P<new>.*)\}(?P<suffix>.*)$")
        .expect("static regex is valid")
});

/// Outcome of parsing a whole log listing
#[derive(Debug, Default)]
pub struct ParsedLog {
    /// Well-formed commits in tool order (newest first for `git log`)
    pub commits: Vec<Commit>,
    /// Records that could not be split into the expected fields
    pub malformed: usize,
}

impl ParsedLog {
    pub fn total_records(&self) -> usize {
        self.commits.len() + self.malformed
    }

    pub fn malformed_ratio(&self) -> f64 {
        match self.total_records() {
            0 => 0.0,
            total => self.malformed as f64 / total as f64,
        }
    }
}

/// Parse the output of `git log` run with [`LOG_FORMAT`]
pub fn parse_log(output: &str, repo: &Path) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    for record in output.split(RECORD_SEP) {
        let record = record.trim_matches(|c| c == '\n' || c == '\r');
        if record.is_empty() {
            continue;
        }

        match parse_commit_record(record, repo) {
            Some(commit) => parsed.commits.push(commit),
            None => {
                tracing::warn!("Skipping malformed log record: {:?}", truncate(record, 120));
                parsed.malformed += 1;
            }
        }
    }

    parsed
}

/// Parse one record made of [`LOG_FIELDS`] separated fields
pub fn parse_commit_record(record: &str, repo: &Path) -> Option<Commit> {
    let fields: Vec<&str> = record.split(FIELD_SEP).collect();
    if fields.len() != LOG_FIELDS {
        return None;
    }

    let hash = fields[0].trim();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(Commit {
        hash: hash.to_string(),
        parent_hashes: fields[1].split_whitespace().map(str::to_string).collect(),
        author_name: fields[2].to_string(),
        author_timestamp: fields[3].trim().parse().ok()?,
        committer_timestamp: fields[4].trim().parse().ok()?,
        subject: fields[5].to_string(),
        repository: repo.to_path_buf(),
    })
}

/// Split a numstat path into `(old_path, new_path)`
///
/// Handles the plain `old => new` form and the shortened
/// `prefix/{old => new}/suffix` form, where either side of the braces may be
/// empty. Paths without rename notation return `(None, path)`.
pub fn expand_rename_path(path: &str) -> (Option<String>, String) {
    if let Some(caps) = BRACE_RENAME.captures(path) {
        let prefix = &caps["prefix"];
        let suffix = &caps["suffix"];
        let old = join_rename_parts(prefix, &caps["old"], suffix);
        let new = join_rename_parts(prefix, &caps["new"], suffix);
        return (Some(old), new);
    }

    if let Some((old, new)) = path.split_once(" => ") {
        return (Some(old.to_string()), new.to_string());
    }

    (None, path.to_string())
}

fn join_rename_parts(prefix: &str, middle: &str, suffix: &str) -> String {
    let joined = format!("{}{}{}", prefix, middle, suffix);
    // An empty side leaves "dir//file"
    if middle.is_empty() {
        joined.replace("//", "/")
    } else {
        joined
    }
}

/// Undo the tool's C-style quoting of unusual paths (`"a\tb"`)
pub fn unquote_path(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Line counts for one path; `None` marks a binary (unknowable) count
pub type LineCounts = (Option<u64>, Option<u64>);

/// Parse `git diff --numstat` into a map keyed by the new path
pub fn parse_numstat(output: &str) -> HashMap<String, LineCounts> {
    let mut stats = HashMap::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, '\t');
        let (Some(ins), Some(del), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            tracing::warn!("Skipping malformed numstat line: {:?}", line);
            continue;
        };

        let (_, new_path) = expand_rename_path(&unquote_path(path));
        stats.insert(new_path, (parse_count(ins), parse_count(del)));
    }

    stats
}

fn parse_count(field: &str) -> Option<u64> {
    match field.trim() {
        "-" => None,
        value => value.parse().ok(),
    }
}

/// Parse `git diff --name-status` into changes with unknown line counts
pub fn parse_name_status(output: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let Some(status) = fields.first().and_then(|code| FileStatus::from_code(code)) else {
            tracing::warn!("Skipping unrecognized name-status line: {:?}", line);
            continue;
        };

        let change = match (status, fields.len()) {
            (FileStatus::Renamed { .. }, 3) => FileChange {
                status,
                path: unquote_path(fields[2]),
                old_path: Some(unquote_path(fields[1])),
                insertions: None,
                deletions: None,
            },
            // Copies keep only the destination path
            (FileStatus::Copied { .. }, 3) => FileChange {
                status,
                path: unquote_path(fields[2]),
                old_path: None,
                insertions: None,
                deletions: None,
            },
            (_, 2) => FileChange {
                status,
                path: unquote_path(fields[1]),
                old_path: None,
                insertions: None,
                deletions: None,
            },
            _ => {
                tracing::warn!("Skipping malformed name-status line: {:?}", line);
                continue;
            }
        };

        changes.push(change);
    }

    changes
}

/// Attach numstat counts to name-status entries by their new path
///
/// Entries without a numstat record keep `None`; nothing defaults to zero.
pub fn reconcile(
    mut changes: Vec<FileChange>,
    numstat: &HashMap<String, LineCounts>,
) -> Vec<FileChange> {
    for change in &mut changes {
        if let Some((insertions, deletions)) = numstat.get(&change.path) {
            change.insertions = *insertions;
            change.deletions = *deletions;
        }
    }
    changes
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
