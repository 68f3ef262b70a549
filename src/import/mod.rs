//! Bulk processing of EDRM email archive corpora
//!
//! Each archive (`*_xml.zip`) carries a batch manifest describing email
//! documents, plus the native `.eml` files those documents reference. The
//! coordinator walks the corpus one archive at a time, counts the words of
//! every native message, ranks recipients by weighted occurrence, and
//! checkpoints after every archive so an interrupted run can resume.
//!
//! # Example Usage
//!
//! ```no_run
//! use mailtally::config::PipelineConfig;
//! use mailtally::import::{discover_archives, ImportCoordinator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let archives = discover_archives(&config.email_root, &config.archive_suffix)?;
//!
//! let mut coordinator = ImportCoordinator::new(config).with_quiet(true);
//! let state = coordinator.run(&archives)?;
//! println!("{} files, {} words", state.files_count, state.reported_words());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      Import Coordinator                       │
//! │          (resume, per-archive checkpoint, progress)           │
//! └───────────────────────────────────────────────────────────────┘
//!        │                 │                 │                │
//!        ▼                 ▼                 ▼                ▼
//! ┌─────────────┐  ┌───────────────┐  ┌─────────────┐  ┌────────────┐
//! │  Extractor  │  │   Manifest    │  │   Message   │  │ Audit sink │
//! │ zip → dir   │  │ XML → records │  │ word count  │  │   (CSV)    │
//! └─────────────┘  └───────────────┘  └─────────────┘  └────────────┘
//!                                │
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │        AggregateState (scores, totals, completed keys)        │
//! │              saved atomically after each archive              │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod coordinator;
pub mod extractor;
pub mod manifest;
pub mod message;
pub mod progress;
pub mod source;
pub mod state;

// Re-export main types
pub use audit::{AuditRow, AuditSink};
pub use coordinator::{log_summary, ImportCoordinator};
pub use extractor::ArchiveExtractor;
pub use manifest::{parse_addresses, parse_manifest, EmailDocument, NativeFile};
pub use message::{count_words, word_count};
pub use progress::{RunProgress, RunStats};
pub use source::{discover_archives, ArchiveJob, PipelineError};
pub use state::{
    AggregateState, ArchiveTally, RecipientScoreTable, CC_WEIGHT, DEFAULT_TOP_N, TO_WEIGHT,
};
