//! Work score used by the heuristic boundary strategy
//!
//! The score is a tunable policy. The only structural guarantee is
//! monotonicity: more churn never lowers the score.

use crate::config::ScoringConfig;
use crate::git::parse::LineCounts;
use std::collections::HashMap;
use std::path::Path;

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "c", "h", "cpp", "hpp", "cc", "java", "kt", "cs", "js", "ts", "jsx", "tsx", "go", "rs",
    "swift", "rb", "php",
];

const SETUP_EXTENSIONS: &[&str] = &[
    "yml", "yaml", "sql", "proto", "graphql", "tf", "hcl", "json", "lock", "toml",
];

const SETUP_FILENAMES: &[&str] = &[
    "Makefile",
    "Dockerfile",
    "pom.xml",
    "build.gradle",
    "pyproject.toml",
    "go.mod",
    "CMakeLists.txt",
];

const DATA_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp", "psd", "ai", "svg",
    // audio and video
    "mp3", "wav", "flac", "aac", "ogg", "m4a", "mp4", "mov", "avi", "mkv", "webm", "flv", "wmv",
    // documents and archives
    "pdf", "zip", "gz", "tar", "rar", "7z", "iso", "doc", "docx", "ppt", "pptx", "xls", "xlsx",
    // 3d assets
    "obj", "fbx", "blend", "dae", "stl", "glb", "gltf",
    // databases and blobs
    "db", "sqlite", "mdb", "accdb", "csv", "parquet", "hdf5", "pkl", "bin", "dat",
    // binaries and fonts
    "exe", "dll", "so", "a", "lib", "ttf", "otf", "woff", "woff2",
];

/// Coarse file category that scales a file's churn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    Source,
    Setup,
    Data,
    Other,
}

impl ExtensionClass {
    /// Classify by file name first (`Makefile`, `go.mod`), then by extension
    pub fn of(path: &str) -> Self {
        let path = Path::new(path);
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if SETUP_FILENAMES.contains(&file_name) || file_name.ends_with(".config.ts") {
            return ExtensionClass::Setup;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return ExtensionClass::Other;
        };
        let ext = ext.to_ascii_lowercase();

        if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
            ExtensionClass::Source
        } else if SETUP_EXTENSIONS.contains(&ext.as_str()) {
            ExtensionClass::Setup
        } else if DATA_EXTENSIONS.contains(&ext.as_str()) {
            ExtensionClass::Data
        } else {
            ExtensionClass::Other
        }
    }
}

/// Churn of one file within a step; unknown counts contribute nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChurn {
    pub path: String,
    pub churn: u64,
}

/// The work done between two commits, as seen by a scoring policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepWork {
    pub commit_count: usize,
    pub files: Vec<FileChurn>,
}

impl StepWork {
    /// Build from a numstat map; binary files count as touched with zero churn
    pub fn from_numstat(commit_count: usize, numstat: &HashMap<String, LineCounts>) -> Self {
        let mut files: Vec<FileChurn> = numstat
            .iter()
            .map(|(path, (insertions, deletions))| FileChurn {
                path: path.clone(),
                churn: insertions.unwrap_or(0) + deletions.unwrap_or(0),
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            commit_count,
            files,
        }
    }

    pub fn total_churn(&self) -> u64 {
        self.files.iter().map(|f| f.churn).sum()
    }
}

/// Assigns a work score to a step of history
pub trait ScoringPolicy: Send + Sync {
    fn score(&self, work: &StepWork) -> f64;
}

/// Weighted churn: per-file churn scaled by extension class, plus flat
/// per-commit and per-file terms
#[derive(Debug, Clone)]
pub struct ChurnScoringPolicy {
    weights: ScoringConfig,
}

impl ChurnScoringPolicy {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    fn class_factor(&self, class: ExtensionClass) -> f64 {
        match class {
            ExtensionClass::Source => self.weights.source_weight,
            ExtensionClass::Setup => self.weights.setup_weight,
            ExtensionClass::Data => self.weights.data_weight,
            ExtensionClass::Other => 1.0,
        }
    }

    /// Weighted churn contribution of a single file
    pub fn file_score(&self, file: &FileChurn) -> f64 {
        let raw = file.churn as f64;
        let churn = match self.weights.taper {
            Some(taper) => taper * (raw / taper).tanh(),
            None => raw,
        };
        churn * self.weights.base_weight * self.class_factor(ExtensionClass::of(&file.path))
    }
}

impl Default for ChurnScoringPolicy {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ScoringPolicy for ChurnScoringPolicy {
    fn score(&self, work: &StepWork) -> f64 {
        let churn: f64 = work.files.iter().map(|f| self.file_score(f)).sum();
        churn
            + work.commit_count as f64 * self.weights.commit_weight
            + work.files.len() as f64 * self.weights.file_weight
    }
}
