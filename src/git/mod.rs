//! Git history access through the `git` executable
//!
//! Provides the commit log reader, the range diff queries milestones are built
//! from, and the lazy per-file diff lookup.

/// Async process wrapper for the `git` executable
pub mod command;
/// Range diff queries and the per-file diff lookup
pub mod diff;
/// Commit log reader and boundary commit lookup
pub mod log;
/// Parsers for log, numstat and name-status output
pub mod parse;

pub use command::GitCommand;
pub use diff::get_diff_for_file;
pub use log::GitRepository;
