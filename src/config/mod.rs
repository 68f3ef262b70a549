//! Configuration for mailtally

mod logging;
mod pipeline;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use pipeline::PipelineConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Corpus and working file locations
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects every error and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        let pipeline = &self.pipeline;

        if pipeline.top_n == 0 {
            errors.push("top_n must be positive".to_string());
        }
        if pipeline.archive_suffix.is_empty() {
            errors.push("archive_suffix must not be empty".to_string());
        }
        if pipeline.manifest_extension.is_empty() {
            errors.push("manifest_extension must not be empty".to_string());
        }

        for (name, path) in [
            ("email_root", &pipeline.email_root),
            ("unzip_dir", &pipeline.unzip_dir),
            ("audit_path", &pipeline.audit_path),
            ("state_path", &pipeline.state_path),
            ("logging.file", &self.logging.file),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(format!("{} must not be empty", name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
