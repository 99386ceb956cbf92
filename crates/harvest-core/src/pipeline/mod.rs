//! Extraction pipeline components.
//!
//! This module contains the stages a candidate photo URL passes through:
//! - **discovery**: per-source candidate URL supply (injected collaborator)
//! - **fetch**: HTTP download behind a narrow trait (injected collaborator)
//! - **standardize**: validation guards, RGB conversion, bounded resize,
//!   PNG re-encode
//! - **extractor**: orchestrates the full workflow with bounded concurrency

pub mod discovery;
pub mod extractor;
pub mod fetch;
pub mod standardize;

// Re-exports for convenient access
pub use discovery::{ExtractionPlan, PlanFileDiscovery, UrlDiscovery};
pub use extractor::{CancelToken, Extractor};
pub use fetch::{ImageFetcher, ReqwestFetcher};
pub use standardize::{ImageStandardizer, StandardizedImage};
