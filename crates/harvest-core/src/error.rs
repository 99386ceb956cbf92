//! Error types for the harvest extraction pipeline.
//!
//! Errors are organized by stage so that the orchestrator can catch each
//! failure at the narrowest possible scope and convert it into statistics
//! and log entries instead of aborting the run.

use thiserror::Error;

/// Top-level error type for harvest operations.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// URL validation (SSRF defense) rejections
    #[error("URL validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Image standardization failures
    #[error("Image processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// Perceptual hashing failures
    #[error("Deduplication error: {0}")]
    Dedup(#[from] DedupError),

    /// Discovery/download collaborator failures
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// URL rejection reasons. Every candidate URL that fails validation is
/// skipped before any network fetch; the reason string ends up in logs
/// and per-source statistics.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty or whitespace-only URL
    #[error("empty URL")]
    EmptyUrl,

    /// URL failed to parse
    #[error("malformed URL: {0}")]
    Malformed(#[from] url::ParseError),

    /// URL scheme not allowed (e.g., file://, ftp://, javascript:)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// URL has no host component
    #[error("URL has no host")]
    NoHost,

    /// Host is explicitly blocked (e.g., localhost, metadata hostnames)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP falls in a blocked range (private, loopback, link-local, ...)
    #[error("blocked IP range: {0}")]
    BlockedIp(String),

    /// Strict mode: host is not on the CDN allowlist
    #[error("host not on CDN allowlist: {0}")]
    NotAllowlisted(String),

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),
}

/// Image standardization errors, in the order the guards run.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Raw payload exceeds the configured size ceiling
    #[error("payload too large: {size_mb}MB > {max_mb}MB")]
    PayloadTooLarge { size_mb: u64, max_mb: u64 },

    /// Magic bytes do not match any known image format
    #[error("unrecognized image format (invalid magic bytes)")]
    InvalidMagicBytes,

    /// Declared pixel count exceeds the decompression-bomb ceiling
    #[error("image {width}x{height} exceeds pixel ceiling of {max_pixels}")]
    PixelCeilingExceeded {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    /// Image decoding failed (corrupt, truncated, or unsupported data)
    #[error("decode error: {0}")]
    Decode(String),

    /// Re-encoding to the canonical format failed
    #[error("encode error: {0}")]
    Encode(String),
}

/// Perceptual hashing errors.
#[derive(Error, Debug)]
pub enum DedupError {
    /// Empty image payload
    #[error("empty image payload")]
    EmptyInput,

    /// Payload could not be decoded for hashing
    #[error("unreadable image payload: {0}")]
    Unreadable(String),
}

/// Failures of the external discovery/download collaborators.
///
/// All of these are recoverable: a source error fails one source for one
/// property, never the run.
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Transport-level HTTP failure
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Network operation exceeded its bounded timeout
    #[error("timeout fetching {url} after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Response body exceeds the raw-size ceiling
    #[error("response for {url} exceeds {max_bytes} bytes")]
    PayloadTooLarge { url: String, max_bytes: u64 },

    /// URL discovery failed for a property
    #[error("discovery failed for {property_key} via {source_name}: {message}")]
    Discovery {
        source_name: String,
        property_key: String,
        message: String,
    },
}

/// Convenience type alias for harvest results.
pub type Result<T> = std::result::Result<T, HarvestError>;
