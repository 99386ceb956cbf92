//! Harvest Core - listing-photo extraction and near-duplicate detection.
//!
//! Harvest pulls property photographs from multiple listing sources,
//! removes near-duplicates across sources, and standardizes everything
//! into a canonical format, surviving crashes and partial failures.
//!
//! # Architecture
//!
//! ```text
//! URL -> Validate (SSRF) -> Fetch -> Standardize -> Hash -> Dedup (LSH)
//!                                                            |
//!                            state / stats / manifest  <-----+
//! ```
//!
//! Source-specific scraping is out of scope: candidate URLs arrive through
//! the injected [`pipeline::UrlDiscovery`] collaborator, bytes through
//! [`pipeline::ImageFetcher`]. Everything the pipeline persists (run
//! state, hash index, manifest) is written atomically and reloaded
//! tolerantly, so an interrupted run resumes cleanly.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use harvest_core::{Config, Extractor, ExtractionPlan, ReqwestFetcher};
//!
//! #[tokio::main]
//! async fn main() -> harvest_core::Result<()> {
//!     let config = Config::load()?;
//!     let plan = ExtractionPlan::load("plan.json".as_ref())?;
//!     let fetcher = Arc::new(ReqwestFetcher::new(&config.limits)?);
//!     let extractor = Extractor::new(config, fetcher, plan.discoveries);
//!     let result = extractor.extract_all(&plan.properties).await?;
//!     println!("stored {} images", result.images_downloaded);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod dedup;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod security;
pub mod state;
pub mod stats;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use dedup::{Deduplicator, DedupStats, PerceptualHash};
pub use error::{
    ConfigError, DedupError, HarvestError, ProcessingError, Result, SourceError, ValidationError,
};
pub use manifest::{ManifestEntry, ManifestManager};
pub use pipeline::{
    CancelToken, ExtractionPlan, Extractor, ImageFetcher, ImageStandardizer, ReqwestFetcher,
    StandardizedImage, UrlDiscovery,
};
pub use security::{UrlValidator, ValidationResult};
pub use state::{ExtractionState, StateManager};
pub use stats::{ExtractionResult, SourceStats, StatsTracker};
pub use types::Property;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
