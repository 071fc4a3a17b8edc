//! Read-only statistics over a computed milestone
//!
//! Unknown line counts (binary files) are left out of totals and medians
//! rather than counted as zero.

use crate::types::{FileChange, FileStatus, Milestone};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TimeStats {
    pub time_start: String,
    pub time_end: String,
    pub duration_seconds: i64,
    /// Duration such as `2d 3h 4m 5s`
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct MessageStats {
    pub num_messages: usize,
    pub total_message_length: usize,
    pub median_message_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FileChangeStats {
    pub num_file_changes: usize,
    pub num_modifications: usize,
    pub num_file_additions: usize,
    pub num_file_deletions: usize,
    pub num_file_renames: usize,
    pub num_file_copies: usize,
    pub num_type_changes: usize,
    /// Sum over changes with a known insertion count
    pub total_insertions: u64,
    /// Sum over changes with a known deletion count
    pub total_deletions: u64,
    /// Changes whose line counts could not be determined
    pub num_unknown_counts: usize,
    /// Median over modified files with known counts
    pub median_insertion_per_file: f64,
    pub median_deletion_per_file: f64,
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .format(TIME_FORMAT)
        .to_string()
}

fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    let (days, hours, minutes, secs) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );

    if days > 0 {
        format!("{}{}d {}h {}m {}s", sign, days, hours, minutes, secs)
    } else if hours > 0 {
        format!("{}{}h {}m {}s", sign, hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}{}m {}s", sign, minutes, secs)
    } else {
        format!("{}{}s", sign, secs)
    }
}

fn median(values: &mut [u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) as f64 / 2.0
    } else {
        values[mid] as f64
    }
}

/// Start, end and duration of the milestone, in UTC
pub fn time_stats(milestone: &Milestone) -> TimeStats {
    let duration_seconds = milestone.time_end - milestone.time_start;
    TimeStats {
        time_start: format_timestamp(milestone.time_start),
        time_end: format_timestamp(milestone.time_end),
        duration_seconds,
        duration: format_duration(duration_seconds),
    }
}

pub fn message_stats(milestone: &Milestone) -> MessageStats {
    let mut lengths: Vec<u64> = milestone
        .messages
        .iter()
        .map(|m| m.chars().count() as u64)
        .collect();

    MessageStats {
        num_messages: milestone.messages.len(),
        total_message_length: lengths.iter().sum::<u64>() as usize,
        median_message_length: median(&mut lengths),
    }
}

/// The `n` longest messages, longest first; ties keep chronological order
pub fn longest_messages(milestone: &Milestone, n: usize) -> Vec<&str> {
    let mut messages: Vec<&str> = milestone.messages.iter().map(String::as_str).collect();
    messages.sort_by_key(|m| std::cmp::Reverse(m.chars().count()));
    messages.truncate(n);
    messages
}

pub fn file_change_stats(milestone: &Milestone) -> FileChangeStats {
    let changes = &milestone.changes;
    let count = |letter: char| changes.iter().filter(|c| c.status.letter() == letter).count();

    let modifications: Vec<&FileChange> = changes
        .iter()
        .filter(|c| c.status == FileStatus::Modified)
        .collect();
    let mut insertions_mod: Vec<u64> = modifications.iter().filter_map(|c| c.insertions).collect();
    let mut deletions_mod: Vec<u64> = modifications.iter().filter_map(|c| c.deletions).collect();

    FileChangeStats {
        num_file_changes: changes.len(),
        num_modifications: modifications.len(),
        num_file_additions: count('A'),
        num_file_deletions: count('D'),
        num_file_renames: count('R'),
        num_file_copies: count('C'),
        num_type_changes: count('T'),
        total_insertions: changes.iter().filter_map(|c| c.insertions).sum(),
        total_deletions: changes.iter().filter_map(|c| c.deletions).sum(),
        num_unknown_counts: changes.iter().filter(|c| c.churn().is_none()).count(),
        median_insertion_per_file: median(&mut insertions_mod),
        median_deletion_per_file: median(&mut deletions_mod),
    }
}

/// Changes whose status letter matches, case-insensitively (`A`, `M`, `R`, ...)
pub fn changes_by_status(milestone: &Milestone, letter: char) -> Vec<&FileChange> {
    let letter = letter.to_ascii_uppercase();
    milestone
        .changes
        .iter()
        .filter(|c| c.status.letter() == letter)
        .collect()
}

/// Ranking weight: insertions count double; unknown counts weigh nothing
pub fn change_weight(change: &FileChange) -> u64 {
    change.insertions.unwrap_or(0) * 2 + change.deletions.unwrap_or(0)
}

/// The `n` heaviest changes by [`change_weight`], heaviest first
pub fn top_changes(milestone: &Milestone, n: usize) -> Vec<&FileChange> {
    let mut changes: Vec<&FileChange> = milestone.changes.iter().collect();
    changes.sort_by_key(|c| std::cmp::Reverse(change_weight(c)));
    changes.truncate(n);
    changes
}
