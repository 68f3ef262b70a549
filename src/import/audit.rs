//! CSV audit trail: one row per counted native message file

use super::source::PipelineError;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

const HEADER: [&str; 4] = ["File path", "Words count", "Email To", "Email CC"];

/// One audit row
#[derive(Debug, Clone, Copy)]
pub struct AuditRow<'a> {
    pub path: &'a str,
    pub words_count: u64,
    pub to: &'a [String],
    pub cc: &'a [String],
}

/// Append-only CSV writer for the audit trail.
///
/// The file length after each committed archive is stored in the checkpoint.
/// A resumed run cuts the file back to that length, so rows of an archive
/// that was interrupted mid-way are written exactly once.
pub struct AuditSink {
    writer: csv::Writer<File>,
}

impl AuditSink {
    /// Truncate the audit file and write the header
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        create_parent(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(path)?);
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }

    /// Reopen the audit file of an interrupted run.
    ///
    /// Anything past `committed_len` belongs to an archive that never reached
    /// its checkpoint and is discarded. The header is only written when the
    /// file is new or empty.
    pub fn resume(path: &Path, committed_len: Option<u64>) -> Result<Self, PipelineError> {
        create_parent(path)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut len = file.metadata()?.len();
        if let Some(committed) = committed_len.filter(|&c| c < len) {
            warn!(
                "Discarding {} uncommitted bytes from {}",
                len - committed,
                path.display()
            );
            file.set_len(committed)?;
            len = committed;
        }
        file.seek(SeekFrom::End(0))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if len == 0 {
            writer.write_record(HEADER)?;
        }
        Ok(Self { writer })
    }

    pub fn record(&mut self, row: AuditRow<'_>) -> Result<(), PipelineError> {
        self.writer.write_record([
            row.path,
            row.words_count.to_string().as_str(),
            row.to.join(";").as_str(),
            row.cc.join(";").as_str(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush buffered rows and return the resulting file length
    pub fn commit(&mut self) -> Result<u64, PipelineError> {
        self.flush()?;
        Ok(self.writer.get_ref().metadata()?.len())
    }
}

fn create_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
