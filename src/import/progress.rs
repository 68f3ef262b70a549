//! Progress tracking for corpus runs

use crate::util::truncate_str;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::info;

/// Counters for one run (this process only, not the whole checkpoint)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Archives extracted and checkpointed
    pub archives_processed: usize,
    /// Archives skipped because an earlier run completed them
    pub archives_skipped: usize,
    /// Archives that could not be extracted
    pub archives_failed: usize,
    /// Manifests rejected as malformed
    pub manifests_failed: usize,
    /// Native message files that could not be read
    pub messages_failed: usize,
    /// Processing time in seconds
    pub elapsed_seconds: f64,
}

/// Progress tracker for a corpus run
pub struct RunProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    /// Archives in the corpus
    total: usize,
    /// Position in the corpus, counting archives completed by earlier runs
    position: usize,
    /// Archives attempted by this process
    attempted: usize,
    stats: RunStats,
}

impl RunProgress {
    /// Create a tracker for `total` archives, `already_done` of which are checkpointed
    pub fn new(total: usize, already_done: usize, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_position(already_done as u64);
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            total,
            position: already_done,
            attempted: 0,
            stats: RunStats::default(),
        }
    }

    /// An archive is about to be extracted
    pub fn archive_started(&self, key: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(truncate_str(key, 40));
        }
    }

    /// An archive was already completed by an earlier run
    pub fn archive_skipped(&mut self) {
        self.stats.archives_skipped += 1;
    }

    /// An archive was extracted and checkpointed
    pub fn archive_processed(&mut self) {
        self.stats.archives_processed += 1;
        self.advance();
    }

    /// An archive could not be extracted
    pub fn archive_failed(&mut self) {
        self.stats.archives_failed += 1;
        self.advance();
    }

    pub fn manifest_failed(&mut self) {
        self.stats.manifests_failed += 1;
    }

    pub fn message_failed(&mut self) {
        self.stats.messages_failed += 1;
    }

    fn advance(&mut self) {
        self.position += 1;
        self.attempted += 1;

        let elapsed = self.start_time.elapsed().as_secs();
        let remaining = self.total.saturating_sub(self.position);
        let estimated = estimate_remaining_secs(elapsed as f64, self.attempted, remaining);
        info!(
            "FILES: ({}/{}) Elapsed time {}s. Estimated finish time {}s",
            self.position, self.total, elapsed, estimated
        );

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(self.position as u64);
        }
    }

    /// Current statistics
    pub fn get_stats(&self) -> RunStats {
        let mut stats = self.stats.clone();
        stats.elapsed_seconds = self.start_time.elapsed().as_secs_f64();
        stats
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} processed, {} skipped, {} failed",
                stats.archives_processed, stats.archives_skipped, stats.archives_failed
            ));
        }
    }
}

/// Seconds left at the average pace so far, truncated to whole seconds
fn estimate_remaining_secs(elapsed_secs: f64, attempted: usize, remaining: usize) -> u64 {
    if attempted == 0 {
        return 0;
    }
    (elapsed_secs / attempted as f64 * remaining as f64) as u64
}
