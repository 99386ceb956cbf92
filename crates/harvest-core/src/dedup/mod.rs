//! Near-duplicate detection engine.
//!
//! The `Deduplicator` owns the hash records (the single persisted source
//! of truth) and a derived LSH band index that is rebuilt on every load.
//! All mutations run under one lock and persist atomically before the
//! lock is released, so concurrent property tasks can never race an
//! in-memory update against a snapshot write.

pub mod index;
pub mod phash;

pub use phash::{hamming, HashComputer, PerceptualHash};

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DedupConfig;
use crate::error::{DedupError, Result};
use crate::store;

use index::LshIndex;

/// One registered image's fingerprints and provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct HashRecord {
    pub image_id: String,
    pub hash: PerceptualHash,
    pub source: String,
    pub property_key: String,
    pub registered_at: DateTime<Utc>,
}

/// Persisted form of a record; hashes stored as 16 hex chars.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    phash: String,
    dhash: String,
    source: String,
    property_key: String,
    registered_at: DateTime<Utc>,
}

impl StoredRecord {
    fn from_record(record: &HashRecord) -> Self {
        Self {
            phash: record.hash.phash_hex(),
            dhash: record.hash.dhash_hex(),
            source: record.source.clone(),
            property_key: record.property_key.clone(),
            registered_at: record.registered_at,
        }
    }

    fn into_record(self, image_id: &str) -> Option<HashRecord> {
        Some(HashRecord {
            image_id: image_id.to_string(),
            hash: PerceptualHash::from_hex(&self.phash, &self.dhash)?,
            source: self.source,
            property_key: self.property_key,
            registered_at: self.registered_at,
        })
    }
}

/// Index statistics for operator tooling and the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct DedupStats {
    pub total_images: usize,
    pub per_source: BTreeMap<String, usize>,
    pub num_bands: u32,
    pub bucket_count: usize,
    pub avg_bucket_size: f64,
    pub max_bucket_size: usize,
    pub similarity_threshold: u32,
}

struct DedupInner {
    records: HashMap<String, HashRecord>,
    index: LshIndex,
}

/// Near-duplicate detector with LSH-indexed lookup and crash-safe
/// persistence.
pub struct Deduplicator {
    config: DedupConfig,
    path: PathBuf,
    computer: HashComputer,
    inner: Mutex<DedupInner>,
}

impl Deduplicator {
    /// Open a deduplicator backed by `path`.
    ///
    /// A missing, empty, or corrupt index file degrades to an empty index
    /// with a warning; individually malformed records are skipped so one
    /// bad entry cannot poison the rest. Buckets are always rebuilt from
    /// the loaded records.
    pub fn open(path: impl Into<PathBuf>, config: DedupConfig) -> Self {
        let path = path.into();
        let mut records = HashMap::new();

        if let Some(raw) = store::load_json::<HashMap<String, serde_json::Value>>(&path) {
            for (image_id, value) in raw {
                let record = serde_json::from_value::<StoredRecord>(value)
                    .ok()
                    .and_then(|stored| stored.into_record(&image_id));
                match record {
                    Some(record) => {
                        records.insert(image_id, record);
                    }
                    None => {
                        tracing::warn!("Skipping malformed hash record for {image_id}");
                    }
                }
            }
        }

        let mut index = LshIndex::new(config.num_bands);
        for record in records.values() {
            index.insert(&record.image_id, record.hash.phash);
        }

        tracing::debug!(
            "Loaded {} hash records into {} LSH buckets from {:?}",
            records.len(),
            index.bucket_count(),
            path
        );

        Self {
            config,
            path,
            computer: HashComputer::new(),
            inner: Mutex::new(DedupInner { records, index }),
        }
    }

    /// Compute both perceptual fingerprints for raw image bytes.
    pub fn compute_hash(&self, bytes: &[u8]) -> std::result::Result<PerceptualHash, DedupError> {
        self.computer.compute(bytes)
    }

    /// Look up a near-duplicate of `hash`.
    ///
    /// The candidate set is the union of bucket memberships across all
    /// bands; each candidate is filtered by primary-hash Hamming distance
    /// and confirmed by the secondary hash. The first match in candidate
    /// order (lexicographic by id, stable across restarts) wins.
    pub fn is_duplicate(&self, hash: &PerceptualHash) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        for candidate_id in inner.index.candidates(hash.phash) {
            let Some(record) = inner.records.get(&candidate_id) else {
                continue;
            };
            if hamming(hash.phash, record.hash.phash) <= self.config.similarity_threshold
                && hamming(hash.dhash, record.hash.dhash) <= self.config.dhash_threshold
            {
                return Some(candidate_id);
            }
        }
        None
    }

    /// Candidate ids for `hash` prior to Hamming filtering.
    pub fn candidate_ids(&self, hash: &PerceptualHash) -> Vec<String> {
        self.inner.lock().unwrap().index.candidates(hash.phash)
    }

    /// Register an image's fingerprints.
    ///
    /// Re-registering an identical `(image_id, hash)` pair is a no-op;
    /// a changed hash replaces the old record and its bucket entries.
    /// The updated record set is persisted before returning.
    pub fn register(
        &self,
        image_id: &str,
        hash: PerceptualHash,
        source: &str,
        property_key: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.records.get(image_id) {
            if existing.hash == hash {
                return Ok(());
            }
            let old_phash = existing.hash.phash;
            inner.index.remove(image_id, old_phash);
        }

        inner.records.insert(
            image_id.to_string(),
            HashRecord {
                image_id: image_id.to_string(),
                hash,
                source: source.to_string(),
                property_key: property_key.to_string(),
                registered_at: Utc::now(),
            },
        );
        inner.index.insert(image_id, hash.phash);

        self.persist(&inner)
    }

    /// Delete a record and every bucket entry it owned.
    pub fn remove(&self, image_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner.records.remove(image_id) else {
            return Ok(());
        };
        inner.index.remove(image_id, record.hash.phash);
        self.persist(&inner)
    }

    /// Reset all in-memory structures and persist the empty state.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.clear();
        inner.index.clear();
        self.persist(&inner)
    }

    /// Number of registered images.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of index statistics.
    pub fn stats(&self) -> DedupStats {
        let inner = self.inner.lock().unwrap();
        let mut per_source: BTreeMap<String, usize> = BTreeMap::new();
        for record in inner.records.values() {
            *per_source.entry(record.source.clone()).or_default() += 1;
        }
        let (avg_bucket_size, max_bucket_size) = inner.index.occupancy();
        DedupStats {
            total_images: inner.records.len(),
            per_source,
            num_bands: inner.index.num_bands(),
            bucket_count: inner.index.bucket_count(),
            avg_bucket_size,
            max_bucket_size,
            similarity_threshold: self.config.similarity_threshold,
        }
    }

    /// Write the record map (records only, never buckets) atomically.
    /// Called with the lock held so the snapshot matches memory.
    fn persist(&self, inner: &DedupInner) -> Result<()> {
        let stored: BTreeMap<&str, StoredRecord> = inner
            .records
            .values()
            .map(|record| (record.image_id.as_str(), StoredRecord::from_record(record)))
            .collect();
        store::save_json(&self.path, &stored)
    }
}
