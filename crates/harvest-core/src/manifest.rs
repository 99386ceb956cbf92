//! The image manifest: final metadata for every accepted image.
//!
//! Entries are keyed by image id, which is the only cross-reference key
//! shared with the deduplicator's hash records; no component holds a live
//! reference into another's state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store;

/// Catalog record for one accepted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub property_key: String,
    pub source: String,
    pub local_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Primary perceptual hash, 16 hex chars
    pub phash: String,
}

/// Owns the manifest file and serializes writes.
pub struct ManifestManager {
    path: PathBuf,
    inner: Mutex<BTreeMap<String, ManifestEntry>>,
}

impl ManifestManager {
    /// Open the manifest at `path`; missing or corrupt files degrade to an
    /// empty manifest with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries =
            store::load_json::<BTreeMap<String, ManifestEntry>>(&path).unwrap_or_default();
        tracing::debug!("Loaded {} manifest entries from {:?}", entries.len(), path);
        Self {
            path,
            inner: Mutex::new(entries),
        }
    }

    /// Record an accepted image and persist atomically.
    pub fn record(&self, entry: ManifestEntry) -> Result<()> {
        let mut entries = self.inner.lock().unwrap();
        entries.insert(entry.id.clone(), entry);
        store::save_json(&self.path, &*entries)
    }

    /// Look up an entry by image id.
    pub fn get(&self, image_id: &str) -> Option<ManifestEntry> {
        self.inner.lock().unwrap().get(image_id).cloned()
    }

    /// Copy of all entries, keyed by image id.
    pub fn snapshot(&self) -> BTreeMap<String, ManifestEntry> {
        self.inner.lock().unwrap().clone()
    }

    /// Number of recorded images.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
