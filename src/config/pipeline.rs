//! Corpus pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::import::DEFAULT_TOP_N;

/// Where the corpus lives and where the run keeps its working files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the archives
    pub email_root: PathBuf,
    /// Scratch directory archives are extracted into
    pub unzip_dir: PathBuf,
    /// CSV audit trail
    pub audit_path: PathBuf,
    /// Checkpoint file
    pub state_path: PathBuf,
    /// File name suffix that marks an archive
    pub archive_suffix: String,
    /// File name suffix of manifests inside an extracted archive
    pub manifest_extension: String,
    /// Number of ranked recipients to keep
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            email_root: PathBuf::from("/mnt/email/edrm-enron-v2"),
            unzip_dir: PathBuf::from("./zeal_unzip"),
            audit_path: PathBuf::from("./zeal.csv"),
            state_path: PathBuf::from("./state.json"),
            archive_suffix: "_xml.zip".to_string(),
            manifest_extension: ".xml".to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }
}
