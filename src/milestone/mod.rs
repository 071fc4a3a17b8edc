//! Milestone segmentation, the heuristic work score and per-milestone statistics

/// Work score policy for heuristic boundaries
pub mod scoring;
/// Boundary strategies and milestone construction
pub mod segmenter;
/// Statistics queries over a computed milestone
pub mod stats;

pub use scoring::{ChurnScoringPolicy, ScoringPolicy, StepWork};
pub use segmenter::Segmenter;
