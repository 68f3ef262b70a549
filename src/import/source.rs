//! Core types for archive import: jobs, discovery and errors

use std::path::{Path, PathBuf};
use thiserror::Error;

/// One input archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    /// Path to the archive file
    pub path: PathBuf,
    /// Identity key used for resume matching (base name without extension)
    pub key: String,
}

impl ArchiveJob {
    /// Create a job for an archive path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, key }
    }
}

/// List archives directly under `root` whose file name ends with `suffix`.
///
/// The listing is sorted by file name so that runs are deterministic
/// regardless of the platform's directory order.
pub fn discover_archives(root: &Path, suffix: &str) -> Result<Vec<ArchiveJob>, PipelineError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            paths.push(entry.path());
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths.into_iter().map(ArchiveJob::new).collect())
}

/// Errors that can occur while processing a corpus
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("Malformed manifest {path}: {reason}")]
    MalformedManifest { path: PathBuf, reason: String },

    #[error("Cannot read message file {path}: {source}")]
    MessageFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub(crate) fn corrupt_archive(path: &Path, reason: impl ToString) -> Self {
        PipelineError::CorruptArchive {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed_manifest(path: &Path, reason: impl ToString) -> Self {
        PipelineError::MalformedManifest {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
