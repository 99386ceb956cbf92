//! Resumable run state: which properties finished, which failed.
//!
//! The state file is the resume boundary. A property is either completed,
//! failed, or unknown; an extraction interrupted mid-property leaves no
//! persisted trace, so the next resumed run simply retries it (safe,
//! because registration and file writes are idempotent per image id).

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store;

/// Persisted extraction progress.
///
/// A property key belongs to at most one of the two sets; completion
/// supersedes a prior failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionState {
    pub completed_properties: BTreeSet<String>,
    pub failed_properties: BTreeSet<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for ExtractionState {
    fn default() -> Self {
        Self {
            completed_properties: BTreeSet::new(),
            failed_properties: BTreeSet::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Owns the state file and serializes all mutations.
pub struct StateManager {
    path: PathBuf,
    inner: Mutex<ExtractionState>,
}

impl StateManager {
    /// Open the state file at `path`. Missing or corrupt files degrade to
    /// an empty state with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = store::load_json::<ExtractionState>(&path).unwrap_or_default();
        tracing::debug!(
            "Loaded extraction state: {} completed, {} failed",
            state.completed_properties.len(),
            state.failed_properties.len()
        );
        Self {
            path,
            inner: Mutex::new(state),
        }
    }

    /// Whether a property has been marked completed.
    pub fn is_completed(&self, property_key: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .completed_properties
            .contains(property_key)
    }

    /// Mark a property completed, superseding any earlier failure, and
    /// persist the new state atomically.
    pub fn mark_completed(&self, property_key: &str) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.failed_properties.remove(property_key);
        state.completed_properties.insert(property_key.to_string());
        state.last_updated = Utc::now();
        store::save_json(&self.path, &*state)
    }

    /// Mark a property failed and persist atomically. A property already
    /// completed stays completed.
    pub fn mark_failed(&self, property_key: &str) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.completed_properties.contains(property_key) {
            state.failed_properties.insert(property_key.to_string());
        }
        state.last_updated = Utc::now();
        store::save_json(&self.path, &*state)
    }

    /// Persist the current state.
    pub fn save(&self) -> Result<()> {
        let state = self.inner.lock().unwrap();
        store::save_json(&self.path, &*state)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ExtractionState {
        self.inner.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, StateManager) {
        let dir = tempfile::tempdir().unwrap();
        let state = StateManager::open(dir.path().join("extraction_state.json"));
        (dir, state)
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let (_dir, state) = open_temp();
        let snapshot = state.snapshot();
        assert!(snapshot.completed_properties.is_empty());
        assert!(snapshot.failed_properties.is_empty());
    }

    #[test]
    fn test_mark_completed_and_query() {
        let (_dir, state) = open_temp();
        assert!(!state.is_completed("prop-1"));
        state.mark_completed("prop-1").unwrap();
        assert!(state.is_completed("prop-1"));
        assert!(!state.is_completed("prop-2"));
    }

    #[test]
    fn test_completion_supersedes_failure() {
        let (_dir, state) = open_temp();
        state.mark_failed("prop-1").unwrap();
        assert!(state.snapshot().failed_properties.contains("prop-1"));

        state.mark_completed("prop-1").unwrap();
        let snapshot = state.snapshot();
        assert!(snapshot.completed_properties.contains("prop-1"));
        assert!(!snapshot.failed_properties.contains("prop-1"));

        // A later failure does not demote a completed property
        state.mark_failed("prop-1").unwrap();
        let snapshot = state.snapshot();
        assert!(snapshot.completed_properties.contains("prop-1"));
        assert!(!snapshot.failed_properties.contains("prop-1"));
    }

    #[test]
    fn test_key_in_at_most_one_set() {
        let (_dir, state) = open_temp();
        state.mark_failed("prop-1").unwrap();
        state.mark_completed("prop-1").unwrap();
        state.mark_failed("prop-2").unwrap();

        let snapshot = state.snapshot();
        let overlap: Vec<_> = snapshot
            .completed_properties
            .intersection(&snapshot.failed_properties)
            .collect();
        assert!(overlap.is_empty());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extraction_state.json");

        let before = {
            let state = StateManager::open(&path);
            state.mark_completed("prop-1").unwrap();
            state.mark_failed("prop-2").unwrap();
            state.snapshot()
        };

        let reloaded = StateManager::open(&path).snapshot();
        assert_eq!(reloaded, before);
    }

    #[test]
    fn test_corrupt_state_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extraction_state.json");
        std::fs::write(&path, "]]] definitely not json").unwrap();

        let state = StateManager::open(&path);
        assert!(state.snapshot().completed_properties.is_empty());
        // And the manager can write over the corrupt file
        state.mark_completed("prop-1").unwrap();
        assert!(StateManager::open(&path).is_completed("prop-1"));
    }
}
