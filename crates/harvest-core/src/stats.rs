//! Per-source and global extraction counters.
//!
//! One record call per (property, source) attempt; `finalize` stamps the
//! end time and returns an immutable snapshot for the run summary.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one listing source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Property-source attempts that finished cleanly
    pub processed: u64,
    /// Property-source attempts that failed at the source level
    pub failed: u64,
    /// Candidate URLs discovered
    pub images_found: u64,
    /// Images standardized and persisted
    pub images_downloaded: u64,
    /// Images skipped as near-duplicates
    pub duplicates: u64,
}

struct StatsInner {
    started_at: DateTime<Utc>,
    global: SourceStats,
    per_source: BTreeMap<String, SourceStats>,
}

/// Accumulates counters during a run.
pub struct StatsTracker {
    inner: Mutex<StatsInner>,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    /// Start tracking; the start timestamp is taken now.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner {
                started_at: Utc::now(),
                global: SourceStats::default(),
                per_source: BTreeMap::new(),
            }),
        }
    }

    /// Record a clean property-source attempt.
    pub fn record_property_completed(&self, source: &str, found: u64, downloaded: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.global.processed += 1;
        inner.global.images_found += found;
        inner.global.images_downloaded += downloaded;
        let entry = inner.per_source.entry(source.to_string()).or_default();
        entry.processed += 1;
        entry.images_found += found;
        entry.images_downloaded += downloaded;
    }

    /// Record a source-level failure for a property.
    pub fn record_property_failed(&self, source: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.global.failed += 1;
        inner.per_source.entry(source.to_string()).or_default().failed += 1;
    }

    /// Record one near-duplicate skip.
    pub fn record_duplicate(&self, source: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.global.duplicates += 1;
        inner
            .per_source
            .entry(source.to_string())
            .or_default()
            .duplicates += 1;
    }

    /// Stamp the end time and return an immutable snapshot.
    pub fn finalize(&self) -> ExtractionResult {
        let inner = self.inner.lock().unwrap();
        ExtractionResult {
            started_at: inner.started_at,
            finished_at: Utc::now(),
            processed: inner.global.processed,
            failed: inner.global.failed,
            images_found: inner.global.images_found,
            images_downloaded: inner.global.images_downloaded,
            duplicates: inner.global.duplicates,
            per_source: inner.per_source.clone(),
        }
    }
}

/// Immutable summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: u64,
    pub failed: u64,
    pub images_found: u64,
    pub images_downloaded: u64,
    pub duplicates: u64,
    pub per_source: BTreeMap<String, SourceStats>,
}

impl ExtractionResult {
    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Fraction of property-source attempts that finished cleanly.
    /// A run with no attempts counts as fully successful.
    pub fn success_rate(&self) -> f64 {
        let total = self.processed + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.processed as f64 / total as f64
    }
}
