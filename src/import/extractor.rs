//! Archive extraction into scratch storage
//!
//! Archives are unpacked one at a time into `<scratch>/<archive key>`. The
//! directory of the previous archive is removed before the next one is
//! unpacked, so the scratch area never holds more than two archives.

use super::source::{ArchiveJob, PipelineError};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Strip `..`, `.`, roots and drive prefixes from an entry name.
///
/// Returns None if nothing usable remains.
fn sanitize_path(path: &str) -> Option<PathBuf> {
    let mut sanitized = PathBuf::new();
    for component in Path::new(path).components() {
        if let Component::Normal(part) = component {
            sanitized.push(part);
        }
    }

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Sequential extractor that keeps track of the last extracted directory
pub struct ArchiveExtractor {
    /// Root of the scratch area
    scratch_dir: PathBuf,
    /// Directory of the previously extracted archive
    previous: Option<PathBuf>,
}

impl ArchiveExtractor {
    /// Create an extractor writing under `scratch_dir`
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            previous: None,
        }
    }

    /// Directory an archive is (or would be) extracted into
    pub fn target_dir(&self, job: &ArchiveJob) -> PathBuf {
        self.scratch_dir.join(&job.key)
    }

    /// Extract `job`, reclaiming the previous archive's directory first.
    ///
    /// On failure the partial output is removed and `CorruptArchive` is
    /// returned; the extractor stays usable for the next archive.
    pub fn extract(&mut self, job: &ArchiveJob) -> Result<PathBuf, PipelineError> {
        self.reclaim_previous();

        let target = self.target_dir(job);
        if target.exists() {
            debug!("Removing stale extraction directory {}", target.display());
            fs::remove_dir_all(&target)?;
        }

        info!("Unzip {} to {}", job.path.display(), target.display());
        match unpack(&job.path, &target) {
            Ok(files) => {
                debug!("Extracted {} files from {}", files, job.key);
                self.previous = Some(target.clone());
                Ok(target)
            }
            Err(e) => {
                if target.exists() {
                    if let Err(rm) = fs::remove_dir_all(&target) {
                        warn!("Can't delete {}: {}", target.display(), rm);
                    }
                }
                Err(PipelineError::corrupt_archive(&job.path, e))
            }
        }
    }

    /// Remove the last extraction directory once the sequence is exhausted
    pub fn finish(&mut self) {
        self.reclaim_previous();
    }

    fn reclaim_previous(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = fs::remove_dir_all(&previous) {
                warn!("Can't delete {}: {}", previous.display(), e);
            }
        }
    }
}

/// Unpack every entry of a zip archive under `target`, returning the file count
fn unpack(archive_path: &Path, target: &Path) -> Result<usize, UnpackError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    fs::create_dir_all(target)?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let raw_name = entry.name().to_string();
        let Some(relative) = sanitize_path(&raw_name) else {
            warn!("Skipping invalid entry path: {raw_name}");
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        files += 1;
    }

    Ok(files)
}

/// Internal failure while unpacking, folded into `CorruptArchive`
#[derive(Debug, thiserror::Error)]
enum UnpackError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),
}
