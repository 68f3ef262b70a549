//! Corpus coordinator: extract → parse → count → aggregate → checkpoint
//!
//! Archives are processed strictly one after another. Progress is durable at
//! archive granularity: the checkpoint is rewritten after every archive, and
//! an interrupted archive is redone in full on the next run.

use super::audit::{AuditRow, AuditSink};
use super::extractor::ArchiveExtractor;
use super::manifest::parse_manifest;
use super::message::count_words;
use super::progress::{RunProgress, RunStats};
use super::source::{ArchiveJob, PipelineError};
use super::state::{AggregateState, ArchiveTally};
use crate::config::PipelineConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Coordinator for a corpus run
pub struct ImportCoordinator {
    config: PipelineConfig,
    /// Quiet mode (no progress bar)
    quiet: bool,
    /// Statistics of the last run
    last_stats: RunStats,
}

impl ImportCoordinator {
    /// Create a new coordinator
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            quiet: false,
            last_stats: RunStats::default(),
        }
    }

    /// Set quiet mode (no progress bar)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Statistics of the last call to [`ImportCoordinator::run`]
    pub fn stats(&self) -> &RunStats {
        &self.last_stats
    }

    /// Process `archives` in order, resuming from the checkpoint if one exists.
    ///
    /// Returns the final aggregate state. The checkpoint file is removed once
    /// the whole sequence has been handled.
    pub fn run(&mut self, archives: &[ArchiveJob]) -> Result<AggregateState, PipelineError> {
        let state_path = self.config.state_path.clone();
        let resumed = AggregateState::load_if_exists(&state_path)?;

        let (mut state, mut audit) = match resumed {
            Some(state) => {
                info!(
                    "Load from {} ({} archives already processed)",
                    state_path.display(),
                    state.completed_archives.len()
                );
                let audit = AuditSink::resume(&self.config.audit_path, state.audit_len)?;
                (state, audit)
            }
            None => {
                info!(
                    "Remove csv file \"{}\" and creating a new one",
                    self.config.audit_path.display()
                );
                (AggregateState::new(), AuditSink::create(&self.config.audit_path)?)
            }
        };

        info!("Going to unzip {} files", archives.len());
        let already_done = archives.iter().filter(|j| state.is_completed(&j.key)).count();
        let mut progress = RunProgress::new(archives.len(), already_done, self.quiet);
        let mut extractor = ArchiveExtractor::new(&self.config.unzip_dir);

        for job in archives {
            if state.is_completed(&job.key) {
                info!(
                    "Skip {} cause results processed in {}",
                    job.path.display(),
                    state_path.display()
                );
                progress.archive_skipped();
                continue;
            }

            progress.archive_started(&job.key);
            let extraction_dir = match extractor.extract(job) {
                Ok(dir) => dir,
                Err(e) => {
                    error!("Exception ({}): {}", job.key, e);
                    progress.archive_failed();
                    continue;
                }
            };

            let tally = self.process_archive(&extraction_dir, &mut audit, &mut progress)?;
            let audit_len = audit.commit()?;
            let next = state
                .absorb(&job.key, &tally, self.config.top_n)
                .with_audit_len(audit_len);

            info!("Dump to {}", state_path.display());
            next.save(&state_path)?;
            state = next;

            progress.archive_processed();
        }

        extractor.finish();
        audit.flush()?;
        progress.finish();
        self.last_stats = progress.get_stats();

        log_summary(&state, self.config.top_n);

        if state_path.exists() {
            if let Err(e) = std::fs::remove_file(&state_path) {
                warn!("Can't delete {}: {}", state_path.display(), e);
            }
        }

        Ok(state)
    }

    /// Parse every manifest of one extracted archive and tally its documents.
    ///
    /// Malformed manifests and unreadable message files are logged and
    /// skipped; only audit or filesystem failures abort.
    fn process_archive(
        &self,
        extraction_dir: &Path,
        audit: &mut AuditSink,
        progress: &mut RunProgress,
    ) -> Result<ArchiveTally, PipelineError> {
        let mut tally = ArchiveTally::new();

        for manifest_path in find_manifests(extraction_dir, &self.config.manifest_extension) {
            info!("Read {}", manifest_path.display());
            let mut documents = match parse_manifest(extraction_dir, &manifest_path) {
                Ok(documents) => documents,
                Err(e) => {
                    warn!("{}", e);
                    warn!("Skip {}", manifest_path.display());
                    progress.manifest_failed();
                    continue;
                }
            };
            debug!(
                "{} message documents in {}",
                documents.len(),
                manifest_path.display()
            );

            for document in &mut documents {
                for native in &document.native_files {
                    let words = match count_words(&native.path) {
                        Ok(words) => words,
                        Err(e) => {
                            warn!("Skip {}: {}", native.display_path, e);
                            progress.message_failed();
                            continue;
                        }
                    };
                    document.words_count += words;
                    tally.record_file(words);
                    audit.record(AuditRow {
                        path: &native.display_path,
                        words_count: words,
                        to: &document.to,
                        cc: &document.cc,
                    })?;
                }
            }

            tally.record_recipients(
                documents.iter().flat_map(|d| d.to.iter().map(String::as_str)),
                documents.iter().flat_map(|d| d.cc.iter().map(String::as_str)),
            );
        }

        Ok(tally)
    }
}

/// All files under `dir` whose name ends with `extension`, sorted
fn find_manifests(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut manifests = Vec::new();
    for entry in WalkDir::new(dir) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(extension)
                {
                    manifests.push(entry.into_path());
                }
            }
            Err(e) => warn!("Cannot walk {}: {}", dir.display(), e),
        }
    }
    manifests.sort();
    manifests
}

/// Log totals and the ranked recipient table
pub fn log_summary(state: &AggregateState, top_n: usize) {
    info!("Total words count {}", state.reported_words());
    info!("Average words count {}", state.average());
    info!("Files count {}", state.files_count);
    info!("Top {} emails:", top_n);
    info!("{:40} {}", "Email", "Score");
    for (address, score) in &state.top_sorted_emails {
        info!("{:40} {}", address, score);
    }
}
