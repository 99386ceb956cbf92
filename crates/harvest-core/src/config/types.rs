//! Sub-configuration structs with pipeline defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Listing-source settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourcesConfig {
    /// Source identifiers to extract from. Empty means every source the
    /// discovery layer provides.
    pub enabled: Vec<String>,
}

/// Policy for marking a property completed when only some sources succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionPolicy {
    /// Completed as soon as one enabled source finishes cleanly.
    AnySource,
    /// Completed only when every enabled source finishes cleanly.
    AllSources,
}

/// Extraction run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Max properties extracted simultaneously
    pub max_concurrent_properties: usize,

    /// Skip properties already marked completed in the state file
    pub resume: bool,

    /// When a property is considered completed for resume purposes
    pub completion_policy: CompletionPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_properties: 3,
            resume: true,
            completion_policy: CompletionPolicy::AnySource,
        }
    }
}

/// Near-duplicate detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Max Hamming distance (of 64 bits) for a primary-hash match
    pub similarity_threshold: u32,

    /// Max Hamming distance for the confirming difference hash
    pub dhash_threshold: u32,

    /// Number of equal-width LSH bands the 64-bit hash is split into.
    /// Must divide 64.
    pub num_bands: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 8,
            dhash_threshold: 10,
            num_bands: 8,
        }
    }
}

/// Resource limits to protect against hostile or broken inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum raw download size in megabytes
    pub max_raw_file_size_mb: u64,

    /// Maximum standardized image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decoded pixel ceiling (decompression-bomb guard)
    pub max_pixel_count: u64,

    /// Download timeout in milliseconds
    pub download_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_raw_file_size_mb: 50,
            max_image_dimension: 1024,
            max_pixel_count: 64_000_000,
            download_timeout_ms: 30_000,
        }
    }
}

/// URL validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Strict mode: candidate hosts must match the CDN allowlist.
    /// Permissive mode still blocks private/internal addresses.
    pub strict_url_mode: bool,

    /// CDN domains accepted in strict mode (exact or subdomain match)
    pub allowed_cdn_domains: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            strict_url_mode: false,
            allowed_cdn_domains: vec![
                "photos.zillowstatic.com".to_string(),
                "ap.rdcpix.com".to_string(),
                "ssl.cdn-redfin.com".to_string(),
            ],
        }
    }
}

/// Output location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for images and persisted state
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("~/.harvest/output"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
