//! Configuration management for harvest.
//!
//! Configuration is loaded from a TOML file with sensible defaults; every
//! sub-struct implements `Default` so a missing file or section never stops
//! a run.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for harvest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listing-source settings
    pub sources: SourcesConfig,

    /// Extraction run settings
    pub extraction: ExtractionConfig,

    /// Near-duplicate detection settings
    pub dedup: DedupConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// URL validation settings
    pub security: SecurityConfig,

    /// Output location settings
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories, falling back to
    /// ~/.harvest/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "harvest", "harvest")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".harvest").join("config.toml")
            })
    }

    /// Resolved output root (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        let path_str = self.storage.output_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Directory standardized images are written under, keyed by property.
    pub fn images_dir(&self) -> PathBuf {
        self.output_dir().join("images")
    }

    /// Path of the resumable run-state file.
    pub fn state_path(&self) -> PathBuf {
        self.output_dir().join("extraction_state.json")
    }

    /// Path of the persisted hash index (LSH buckets are never persisted).
    pub fn hash_index_path(&self) -> PathBuf {
        self.output_dir().join("hash_index.json")
    }

    /// Path of the image manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir().join("image_manifest.json")
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
