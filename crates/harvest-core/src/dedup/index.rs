//! LSH band index over 64-bit perceptual hashes.
//!
//! The hash is split into `num_bands` equal-width, non-overlapping bit
//! bands; each band's value keys a bucket of image ids. Two hashes close
//! enough in Hamming distance to agree exactly on at least one full band
//! co-occur in that band's bucket, so a lookup examines O(bucket) ids
//! instead of the whole index.
//!
//! Buckets are derived state: always rebuilt from the hash records on
//! load, never persisted.

use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug)]
pub struct LshIndex {
    num_bands: u32,
    band_bits: u32,
    buckets: HashMap<(u32, u64), HashSet<String>>,
}

impl LshIndex {
    /// Create an empty index. `num_bands` must divide 64 (enforced by
    /// config validation).
    pub fn new(num_bands: u32) -> Self {
        debug_assert!(num_bands > 0 && 64 % num_bands == 0);
        Self {
            num_bands,
            band_bits: 64 / num_bands,
            buckets: HashMap::new(),
        }
    }

    fn band_value(&self, band: u32, phash: u64) -> u64 {
        let mask = if self.band_bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.band_bits) - 1
        };
        (phash >> (band * self.band_bits)) & mask
    }

    /// Insert an id into the bucket of every band of its hash.
    pub fn insert(&mut self, image_id: &str, phash: u64) {
        for band in 0..self.num_bands {
            self.buckets
                .entry((band, self.band_value(band, phash)))
                .or_default()
                .insert(image_id.to_string());
        }
    }

    /// Remove an id from every band bucket it was inserted into.
    ///
    /// Empty buckets are dropped so no dangling entries remain.
    pub fn remove(&mut self, image_id: &str, phash: u64) {
        for band in 0..self.num_bands {
            let key = (band, self.band_value(band, phash));
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.remove(image_id);
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
    }

    /// Union of bucket memberships across all bands of `phash`, in
    /// lexicographic id order for deterministic downstream tie-breaks.
    pub fn candidates(&self, phash: u64) -> Vec<String> {
        let mut out = BTreeSet::new();
        for band in 0..self.num_bands {
            if let Some(bucket) = self.buckets.get(&(band, self.band_value(band, phash))) {
                out.extend(bucket.iter().cloned());
            }
        }
        out.into_iter().collect()
    }

    /// Drop every bucket.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn num_bands(&self) -> u32 {
        self.num_bands
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// (average, maximum) bucket occupancy.
    pub fn occupancy(&self) -> (f64, usize) {
        if self.buckets.is_empty() {
            return (0.0, 0);
        }
        let total: usize = self.buckets.values().map(HashSet::len).sum();
        let max = self.buckets.values().map(HashSet::len).max().unwrap_or(0);
        (total as f64 / self.buckets.len() as f64, max)
    }
}
