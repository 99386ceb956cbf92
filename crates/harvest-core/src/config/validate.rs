//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.max_concurrent_properties == 0 {
            return Err(ConfigError::ValidationError(
                "extraction.max_concurrent_properties must be > 0".into(),
            ));
        }
        if self.dedup.num_bands == 0 || 64 % self.dedup.num_bands != 0 {
            return Err(ConfigError::ValidationError(
                "dedup.num_bands must divide 64".into(),
            ));
        }
        if self.dedup.similarity_threshold > 64 {
            return Err(ConfigError::ValidationError(
                "dedup.similarity_threshold must be <= 64".into(),
            ));
        }
        if self.dedup.dhash_threshold > 64 {
            return Err(ConfigError::ValidationError(
                "dedup.dhash_threshold must be <= 64".into(),
            ));
        }
        if self.limits.max_raw_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_raw_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.max_pixel_count == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_pixel_count must be > 0".into(),
            ));
        }
        if self.limits.download_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.download_timeout_ms must be > 0".into(),
            ));
        }
        if self.security.strict_url_mode && self.security.allowed_cdn_domains.is_empty() {
            return Err(ConfigError::ValidationError(
                "security.allowed_cdn_domains must not be empty in strict mode".into(),
            ));
        }
        Ok(())
    }
}
