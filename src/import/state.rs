//! Aggregate state: recipient scores, running totals and the checkpoint
//!
//! The state is threaded through the run as a value. Each completed archive
//! produces a new snapshot via [`AggregateState::absorb`], which is persisted
//! before it replaces the previous one.

use super::source::PipelineError;
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Number of ranked recipients kept in the snapshot
pub const DEFAULT_TOP_N: usize = 100;

/// Score added per "To" occurrence
pub const TO_WEIGHT: f64 = 1.0;

/// Score added per "CC" occurrence
pub const CC_WEIGHT: f64 = 0.5;

/// Cumulative recipient scores, enumerated in first-insertion order.
///
/// Insertion order is the tie-break for ranking and survives a checkpoint
/// round-trip (serialized as a JSON object in that order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipientScoreTable {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl RecipientScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to an address, inserting it at the end if unseen
    pub fn add(&mut self, address: &str, weight: f64) {
        match self.index.get(address) {
            Some(&i) => self.entries[i].1 += weight,
            None => {
                self.index.insert(address.to_string(), self.entries.len());
                self.entries.push((address.to_string(), weight));
            }
        }
    }

    /// Fold another table into this one, in the other table's order
    pub fn merge(&mut self, other: &RecipientScoreTable) {
        for (address, score) in other.iter() {
            self.add(address, score);
        }
    }

    pub fn get(&self, address: &str) -> Option<f64> {
        self.index.get(address).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(a, s)| (a.as_str(), *s))
    }

    /// The `n` highest scores, descending, ties in enumeration order
    pub fn top(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked = self.entries.clone();
        // sort_by is stable
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

impl Serialize for RecipientScoreTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (address, score) in &self.entries {
            map.serialize_entry(address, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RecipientScoreTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RecipientScoreTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of address to score")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut table = RecipientScoreTable::new();
                while let Some((address, score)) = access.next_entry::<String, f64>()? {
                    table.add(&address, score);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Totals gathered from a single archive before they are committed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveTally {
    pub words_count: u64,
    pub files_count: u64,
    pub scores: RecipientScoreTable,
}

impl ArchiveTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one counted native file
    pub fn record_file(&mut self, words: u64) {
        self.words_count += words;
        self.files_count += 1;
    }

    /// Weight a manifest's recipients: all "To" occurrences, then all "CC"
    pub fn record_recipients<'a>(
        &mut self,
        to: impl IntoIterator<Item = &'a str>,
        cc: impl IntoIterator<Item = &'a str>,
    ) {
        for address in to {
            self.scores.add(address, TO_WEIGHT);
        }
        for address in cc {
            self.scores.add(address, CC_WEIGHT);
        }
    }
}

/// Snapshot of pipeline progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckpointRecord", into = "CheckpointRecord")]
pub struct AggregateState {
    /// True cumulative word count (may be zero)
    pub words_count: u64,
    pub files_count: u64,
    pub top_emails: RecipientScoreTable,
    pub top_sorted_emails: Vec<(String, f64)>,
    /// Identity keys of fully processed archives, in completion order
    pub completed_archives: Vec<String>,
    /// Length of the audit file once the last completed archive was written
    pub audit_len: Option<u64>,
    /// When the snapshot was last persisted
    pub saved_at: Option<DateTime<Utc>>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Word count as reported: floored to 1 so averages stay defined
    pub fn reported_words(&self) -> u64 {
        self.words_count.max(1)
    }

    /// Average words per file, with both operands floored
    pub fn average(&self) -> f64 {
        self.reported_words() as f64 / self.files_count.max(1) as f64
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed_archives.iter().any(|k| k == key)
    }

    /// Produce the next snapshot with an archive's totals folded in
    pub fn absorb(&self, key: &str, tally: &ArchiveTally, top_n: usize) -> AggregateState {
        let mut next = self.clone();
        next.words_count += tally.words_count;
        next.files_count += tally.files_count;
        next.top_emails.merge(&tally.scores);
        next.top_sorted_emails = next.top_emails.top(top_n);
        next.completed_archives.push(key.to_string());
        next
    }

    /// Record the committed length of the audit file
    pub fn with_audit_len(mut self, len: u64) -> Self {
        self.audit_len = Some(len);
        self
    }

    /// Persist the snapshot atomically: write a sibling temp file, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut snapshot = self.clone();
        snapshot.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&snapshot)?;

        let temp_path = temp_path_for(path);
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Load a snapshot written by [`AggregateState::save`]
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            PipelineError::Checkpoint(format!("cannot decode {}: {}", path.display(), e))
        })
    }

    /// Load the snapshot if the checkpoint file exists
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, PipelineError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// On-disk layout of the checkpoint file
#[derive(Serialize, Deserialize)]
struct CheckpointRecord {
    words_count: u64,
    #[serde(default)]
    average: f64,
    files_count: u64,
    top_emails: RecipientScoreTable,
    #[serde(default)]
    top_sorted_emails: Vec<(String, f64)>,
    #[serde(alias = "email_folders")]
    completed_archives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audit_len: Option<u64>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

impl From<AggregateState> for CheckpointRecord {
    fn from(state: AggregateState) -> Self {
        Self {
            words_count: state.reported_words(),
            average: state.average(),
            files_count: state.files_count,
            top_emails: state.top_emails,
            top_sorted_emails: state.top_sorted_emails,
            completed_archives: state.completed_archives,
            audit_len: state.audit_len,
            saved_at: state.saved_at,
        }
    }
}

impl From<CheckpointRecord> for AggregateState {
    fn from(record: CheckpointRecord) -> Self {
        // Every counted file adds at least one word, so with no files the
        // stored value can only be the floor.
        let words_count = if record.files_count == 0 {
            0
        } else {
            record.words_count
        };
        Self {
            words_count,
            files_count: record.files_count,
            top_emails: record.top_emails,
            top_sorted_emails: record.top_sorted_emails,
            completed_archives: record.completed_archives,
            audit_len: record.audit_len,
            saved_at: record.saved_at,
        }
    }
}
