//! End-to-end extraction orchestration.
//!
//! For each property, each enabled source is processed sequentially:
//! discover candidate URLs, validate, fetch, standardize, dedup-check,
//! persist. Properties run concurrently under a semaphore bound so no
//! source gets hammered by an unbounded fan-out. Every per-URL and
//! per-source failure is caught at that scope and turned into a log line
//! and a counter; only an unusable output location aborts the run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{CompletionPolicy, Config};
use crate::dedup::{Deduplicator, PerceptualHash};
use crate::error::{ProcessingError, Result};
use crate::manifest::{ManifestEntry, ManifestManager};
use crate::security::UrlValidator;
use crate::state::StateManager;
use crate::stats::{ExtractionResult, StatsTracker};
use crate::types::Property;

use super::discovery::UrlDiscovery;
use super::fetch::ImageFetcher;
use super::standardize::{ImageStandardizer, StandardizedImage};

/// Cooperative run-level cancellation.
///
/// Checked at property and URL boundaries only, so in-flight per-image
/// work always finishes and the state file stays resumable.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of processing one candidate URL.
enum UrlOutcome {
    Stored { image_id: String },
    Duplicate { original_id: String },
}

struct SourceOutcome {
    found: u64,
    downloaded: u64,
}

/// Drives the full extraction workflow.
pub struct Extractor {
    config: Config,
    worker: Arc<PropertyWorker>,
    cancel: CancelToken,
}

impl Extractor {
    /// Build an extractor from configuration and the injected
    /// discovery/fetch collaborators.
    ///
    /// Discoveries whose source is not in `sources.enabled` are dropped;
    /// an empty enabled list keeps them all.
    pub fn new(
        config: Config,
        fetcher: Arc<dyn ImageFetcher>,
        discoveries: Vec<Arc<dyn UrlDiscovery>>,
    ) -> Self {
        let enabled = &config.sources.enabled;
        let discoveries: Vec<_> = discoveries
            .into_iter()
            .filter(|d| enabled.is_empty() || enabled.iter().any(|s| s == d.source()))
            .collect();

        let cancel = CancelToken::new();
        let worker = Arc::new(PropertyWorker {
            validator: UrlValidator::new(&config.security),
            standardizer: Arc::new(ImageStandardizer::new(config.limits.clone())),
            dedup: Arc::new(Deduplicator::open(
                config.hash_index_path(),
                config.dedup.clone(),
            )),
            state: Arc::new(StateManager::open(config.state_path())),
            manifest: Arc::new(ManifestManager::open(config.manifest_path())),
            fetcher,
            discoveries,
            images_dir: config.images_dir(),
            policy: config.extraction.completion_policy,
            cancel: cancel.clone(),
        });

        Self {
            config,
            worker,
            cancel,
        }
    }

    /// Handle for requesting a graceful stop from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.worker.dedup
    }

    pub fn state(&self) -> &StateManager {
        &self.worker.state
    }

    pub fn manifest(&self) -> &ManifestManager {
        &self.worker.manifest
    }

    /// Extract photos for every property.
    ///
    /// With `extraction.resume` set, properties already marked completed
    /// are skipped. Work is spread over at most
    /// `extraction.max_concurrent_properties` simultaneous tasks.
    pub async fn extract_all(&self, properties: &[Property]) -> Result<ExtractionResult> {
        // The one catastrophic precondition: an unusable output location
        std::fs::create_dir_all(&self.worker.images_dir)?;

        let stats = Arc::new(StatsTracker::new());
        let semaphore = Arc::new(Semaphore::new(
            self.config.extraction.max_concurrent_properties,
        ));
        let resume = self.config.extraction.resume;

        tracing::info!(
            "Extracting {} properties across {} sources (max {} concurrent)",
            properties.len(),
            self.worker.discoveries.len(),
            self.config.extraction.max_concurrent_properties
        );

        let mut tasks = JoinSet::new();
        for property in properties {
            if resume && self.worker.state.is_completed(&property.key) {
                tracing::debug!("Skipping {}: already completed", property.key);
                continue;
            }
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested; not scheduling further properties");
                break;
            }

            let worker = Arc::clone(&self.worker);
            let stats = Arc::clone(&stats);
            let semaphore = Arc::clone(&semaphore);
            let property = property.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if worker.cancel.is_cancelled() {
                    return;
                }
                worker.process_property(&property, &stats).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Property task aborted: {e}");
            }
        }

        Ok(stats.finalize())
    }
}

/// The per-property workhorse, shared across concurrent tasks.
struct PropertyWorker {
    validator: UrlValidator,
    standardizer: Arc<ImageStandardizer>,
    dedup: Arc<Deduplicator>,
    state: Arc<StateManager>,
    manifest: Arc<ManifestManager>,
    fetcher: Arc<dyn ImageFetcher>,
    discoveries: Vec<Arc<dyn UrlDiscovery>>,
    images_dir: PathBuf,
    policy: CompletionPolicy,
    cancel: CancelToken,
}

impl PropertyWorker {
    async fn process_property(&self, property: &Property, stats: &StatsTracker) {
        tracing::info!("Extracting property {}", property.key);
        let mut sources_ok = 0usize;
        let mut sources_failed = 0usize;

        for discovery in &self.discoveries {
            if self.cancel.is_cancelled() {
                break;
            }
            let source = discovery.source();
            match self
                .process_source(property, discovery.as_ref(), stats)
                .await
            {
                Ok(outcome) => {
                    sources_ok += 1;
                    stats.record_property_completed(source, outcome.found, outcome.downloaded);
                    tracing::info!(
                        "{} via {}: stored {} of {} candidates",
                        property.key,
                        source,
                        outcome.downloaded,
                        outcome.found
                    );
                }
                Err(e) => {
                    sources_failed += 1;
                    stats.record_property_failed(source);
                    tracing::warn!("{} via {}: source failed: {e}", property.key, source);
                }
            }
        }

        // A cancelled property with unvisited sources must not be marked
        // completed, or the resumed run would never revisit them.
        let interrupted =
            self.cancel.is_cancelled() && sources_ok + sources_failed < self.discoveries.len();
        let completed = !interrupted
            && match self.policy {
                CompletionPolicy::AnySource => sources_ok > 0,
                CompletionPolicy::AllSources => sources_failed == 0 && sources_ok > 0,
            };

        let marked = if completed {
            self.state.mark_completed(&property.key)
        } else {
            self.state.mark_failed(&property.key)
        };
        if let Err(e) = marked {
            tracing::error!("Cannot persist state for {}: {e}", property.key);
        }
    }

    /// Process one source for one property. URL-level failures are
    /// swallowed here; only discovery failures fail the source.
    async fn process_source(
        &self,
        property: &Property,
        discovery: &dyn UrlDiscovery,
        stats: &StatsTracker,
    ) -> std::result::Result<SourceOutcome, crate::error::SourceError> {
        let urls = discovery.discover_urls(property).await?;
        let found = urls.len() as u64;
        let mut downloaded = 0u64;

        for url in &urls {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.process_url(property, discovery.source(), url).await {
                Ok(UrlOutcome::Stored { image_id }) => {
                    downloaded += 1;
                    tracing::debug!("Stored {url} as {image_id}");
                }
                Ok(UrlOutcome::Duplicate { original_id }) => {
                    stats.record_duplicate(discovery.source());
                    tracing::debug!("Skipping {url}: near-duplicate of {original_id}");
                }
                Err(e) => {
                    tracing::debug!("Skipping {url}: {e}");
                }
            }
        }

        Ok(SourceOutcome { found, downloaded })
    }

    /// The atomic per-image sequence: validate, fetch, standardize, hash,
    /// dedup-check, persist, register, record.
    async fn process_url(
        &self,
        property: &Property,
        source: &str,
        url: &str,
    ) -> Result<UrlOutcome> {
        self.validator.validate_resolved(url).await?;
        let raw = self.fetcher.fetch(url).await?;

        // Decode, resize, and hash are CPU-bound; keep them off the I/O runtime
        let standardizer = Arc::clone(&self.standardizer);
        let dedup = Arc::clone(&self.dedup);
        let (image, hash) =
            tokio::task::spawn_blocking(move || -> Result<(StandardizedImage, PerceptualHash)> {
                let image = standardizer.standardize(&raw)?;
                let hash = dedup.compute_hash(&image.bytes)?;
                Ok((image, hash))
            })
            .await
            .map_err(|e| ProcessingError::Decode(format!("standardize task failed: {e}")))??;

        if let Some(original_id) = self.dedup.is_duplicate(&hash) {
            return Ok(UrlOutcome::Duplicate { original_id });
        }

        let image_id = image_id_for(&image.bytes);
        let property_dir = self.images_dir.join(&property.key);
        tokio::fs::create_dir_all(&property_dir).await?;
        let local_path = property_dir.join(format!("{image_id}.{}", image.format));
        tokio::fs::write(&local_path, &image.bytes).await?;

        self.dedup
            .register(&image_id, hash, source, &property.key)?;
        self.manifest.record(ManifestEntry {
            id: image_id.clone(),
            property_key: property.key.clone(),
            source: source.to_string(),
            local_path,
            width: image.width,
            height: image.height,
            phash: hash.phash_hex(),
        })?;

        Ok(UrlOutcome::Stored { image_id })
    }
}

/// Deterministic image id from the standardized bytes. Retrying a crashed
/// property regenerates the same ids, so re-registration is a no-op.
fn image_id_for(bytes: &[u8]) -> String {
    let digest = blake3::hash(bytes);
    format!("img_{}", &digest.to_hex().as_str()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::io::Cursor;

    struct StaticDiscovery {
        source: String,
        urls: BTreeMap<String, Vec<String>>,
        timeout_for: HashSet<String>,
    }

    #[async_trait]
    impl UrlDiscovery for StaticDiscovery {
        fn source(&self) -> &str {
            &self.source
        }

        async fn discover_urls(
            &self,
            property: &Property,
        ) -> std::result::Result<Vec<String>, SourceError> {
            if self.timeout_for.contains(&property.key) {
                return Err(SourceError::Timeout {
                    url: format!("https://x.example/{}", property.key),
                    timeout_ms: 5,
                });
            }
            Ok(self.urls.get(&property.key).cloned().unwrap_or_default())
        }
    }

    struct StaticFetcher {
        responses: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl ImageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, SourceError> {
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| SourceError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    fn png_bytes(seed: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([seed.wrapping_mul(x as u8), y as u8, seed ^ (x as u8)])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.output_dir = dir.to_path_buf();
        config
    }

    // Test URLs use public IP literals so validation never touches DNS
    fn url(n: u32) -> String {
        format!("http://203.0.113.7/photos/{n}.png")
    }

    fn extractor_for(
        dir: &std::path::Path,
        urls: BTreeMap<String, Vec<String>>,
        timeout_for: HashSet<String>,
        responses: HashMap<String, Vec<u8>>,
    ) -> Extractor {
        Extractor::new(
            test_config(dir),
            Arc::new(StaticFetcher { responses }),
            vec![Arc::new(StaticDiscovery {
                source: "mls".to_string(),
                urls,
                timeout_for,
            })],
        )
    }

    #[tokio::test]
    async fn test_partial_failure_isolated_to_one_property() {
        let dir = tempfile::tempdir().unwrap();

        let mut urls = BTreeMap::new();
        urls.insert("prop-1".to_string(), vec![url(1)]);
        urls.insert("prop-2".to_string(), vec![url(2)]);
        urls.insert("prop-3".to_string(), vec![url(3)]);

        let mut responses = HashMap::new();
        responses.insert(url(1), png_bytes(3));
        responses.insert(url(3), png_bytes(91));

        // Source times out for prop-2 only
        let timeout_for: HashSet<_> = ["prop-2".to_string()].into();

        let extractor = extractor_for(dir.path(), urls, timeout_for, responses);
        let properties = vec![
            Property::new("prop-1"),
            Property::new("prop-2"),
            Property::new("prop-3"),
        ];
        let result = extractor.extract_all(&properties).await.unwrap();

        assert!(extractor.state().is_completed("prop-1"));
        assert!(!extractor.state().is_completed("prop-2"));
        assert!(extractor.state().is_completed("prop-3"));
        assert!(extractor
            .state()
            .snapshot()
            .failed_properties
            .contains("prop-2"));

        assert_eq!(result.failed, 1);
        assert_eq!(result.processed, 2);
        assert_eq!(result.images_found, 2);
        assert_eq!(result.images_downloaded + result.duplicates, 2);
        assert!(result.success_rate() > 0.6 && result.success_rate() < 0.7);
    }

    #[tokio::test]
    async fn test_same_image_across_properties_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();

        let mut urls = BTreeMap::new();
        urls.insert("prop-1".to_string(), vec![url(1), url(2)]);

        // Two URLs serving byte-identical photos
        let mut responses = HashMap::new();
        responses.insert(url(1), png_bytes(7));
        responses.insert(url(2), png_bytes(7));

        let extractor = extractor_for(dir.path(), urls, HashSet::new(), responses);
        let result = extractor
            .extract_all(&[Property::new("prop-1")])
            .await
            .unwrap();

        assert_eq!(result.images_found, 2);
        assert_eq!(result.images_downloaded, 1);
        assert_eq!(result.duplicates, 1);
        assert_eq!(extractor.manifest().len(), 1);
        assert_eq!(extractor.dedup().len(), 1);
        assert!(extractor.state().is_completed("prop-1"));

        // The stored file exists where the manifest says, under the
        // property-keyed directory
        let (id, entry) = extractor.manifest().snapshot().pop_first().unwrap();
        assert_eq!(entry.id, id);
        assert!(entry.local_path.starts_with(dir.path()));
        assert!(entry.local_path.to_string_lossy().contains("prop-1"));
        assert!(entry.local_path.exists());
    }

    #[tokio::test]
    async fn test_resume_skips_completed_properties() {
        let dir = tempfile::tempdir().unwrap();

        let mut urls = BTreeMap::new();
        urls.insert("prop-1".to_string(), vec![url(1)]);
        let mut responses = HashMap::new();
        responses.insert(url(1), png_bytes(5));

        {
            let extractor = extractor_for(
                dir.path(),
                urls.clone(),
                HashSet::new(),
                responses.clone(),
            );
            extractor
                .extract_all(&[Property::new("prop-1")])
                .await
                .unwrap();
            assert!(extractor.state().is_completed("prop-1"));
        }

        // Second run resumes over the same output dir and does nothing
        let extractor = extractor_for(dir.path(), urls, HashSet::new(), responses);
        let result = extractor
            .extract_all(&[Property::new("prop-1")])
            .await
            .unwrap();
        assert_eq!(result.processed, 0);
        assert_eq!(result.images_found, 0);
    }

    #[tokio::test]
    async fn test_invalid_urls_are_skipped_without_failing_source() {
        let dir = tempfile::tempdir().unwrap();

        let mut urls = BTreeMap::new();
        urls.insert(
            "prop-1".to_string(),
            vec![
                "ftp://internal/secret.jpg".to_string(),
                "http://169.254.169.254/latest/meta-data".to_string(),
                url(1),
            ],
        );
        let mut responses = HashMap::new();
        responses.insert(url(1), png_bytes(9));

        let extractor = extractor_for(dir.path(), urls, HashSet::new(), responses);
        let result = extractor
            .extract_all(&[Property::new("prop-1")])
            .await
            .unwrap();

        assert_eq!(result.failed, 0);
        assert_eq!(result.images_found, 3);
        assert_eq!(result.images_downloaded, 1);
        assert!(extractor.state().is_completed("prop-1"));
    }

    #[tokio::test]
    async fn test_corrupt_payload_counts_as_missed_download() {
        let dir = tempfile::tempdir().unwrap();

        let mut urls = BTreeMap::new();
        urls.insert("prop-1".to_string(), vec![url(1)]);
        let mut responses = HashMap::new();
        responses.insert(url(1), b"<html>503 backend sadness</html>".to_vec());

        let extractor = extractor_for(dir.path(), urls, HashSet::new(), responses);
        let result = extractor
            .extract_all(&[Property::new("prop-1")])
            .await
            .unwrap();

        assert_eq!(result.images_found, 1);
        assert_eq!(result.images_downloaded, 0);
        // The source itself still finished cleanly
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_schedules_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let mut urls = BTreeMap::new();
        urls.insert("prop-1".to_string(), vec![url(1)]);
        let mut responses = HashMap::new();
        responses.insert(url(1), png_bytes(2));

        let extractor = extractor_for(dir.path(), urls, HashSet::new(), responses);
        extractor.cancel_token().cancel();

        let result = extractor
            .extract_all(&[Property::new("prop-1")])
            .await
            .unwrap();
        assert_eq!(result.processed + result.failed, 0);
        assert!(!extractor.state().is_completed("prop-1"));
    }

    #[tokio::test]
    async fn test_disabled_sources_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.sources.enabled = vec!["portal".to_string()];

        let mut urls = BTreeMap::new();
        urls.insert("prop-1".to_string(), vec![url(1)]);
        let mut responses = HashMap::new();
        responses.insert(url(1), png_bytes(2));

        let extractor = Extractor::new(
            config,
            Arc::new(StaticFetcher { responses }),
            vec![Arc::new(StaticDiscovery {
                source: "mls".to_string(),
                urls,
                timeout_for: HashSet::new(),
            })],
        );

        let result = extractor
            .extract_all(&[Property::new("prop-1")])
            .await
            .unwrap();
        // The only discovery is for a disabled source: nothing happens
        assert_eq!(result.images_found, 0);
    }

    #[test]
    fn test_image_id_is_deterministic() {
        let a = image_id_for(b"same bytes");
        let b = image_id_for(b"same bytes");
        let c = image_id_for(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("img_"));
        assert_eq!(a.len(), 4 + 16);
    }
}
