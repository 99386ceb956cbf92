//! HTTP download collaborator.
//!
//! The orchestrator only needs "bytes for a validated URL, within a
//! timeout", so the fetcher is a narrow object-safe trait; the reqwest
//! implementation is what production runs use, tests substitute mocks.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LimitsConfig;
use crate::error::SourceError;

/// Fetches raw bytes for a validated URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// reqwest-backed fetcher with a bounded per-request timeout and a
/// response-size ceiling matching the standardizer's raw-size limit.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl ReqwestFetcher {
    /// Build a fetcher from the configured limits.
    pub fn new(limits: &LimitsConfig) -> Result<Self, SourceError> {
        let timeout = Duration::from_millis(limits.download_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("harvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;
        Ok(Self {
            client,
            timeout,
            max_bytes: limits.max_raw_file_size_mb * 1024 * 1024,
        })
    }
}

#[async_trait]
impl ImageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let timeout_ms = self.timeout.as_millis() as u64;

        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| SourceError::Timeout {
                url: url.to_string(),
                timeout_ms,
            })?
            .map_err(|e| SourceError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Reject on the declared length before buffering the body
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(SourceError::PayloadTooLarge {
                    url: url.to_string(),
                    max_bytes: self.max_bytes,
                });
            }
        }

        let bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| SourceError::Timeout {
                url: url.to_string(),
                timeout_ms,
            })?
            .map_err(|e| SourceError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(SourceError::PayloadTooLarge {
                url: url.to_string(),
                max_bytes: self.max_bytes,
            });
        }

        Ok(bytes.to_vec())
    }
}
