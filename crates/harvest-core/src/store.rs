//! Crash-safe JSON persistence.
//!
//! All persisted artifacts (run state, hash index, manifest) go through the
//! same temp-file-then-rename write path so a crash mid-write can never leave
//! a truncated file behind, and through the same tolerant read path so a
//! corrupt file degrades to a warning instead of killing the run.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::Result;

/// Write `value` as pretty JSON to `path` atomically.
///
/// The JSON is written to a sibling `.tmp` file first and renamed into
/// place, which is atomic on POSIX filesystems. Parent directories are
/// created as needed.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load JSON from `path`, tolerating absence and corruption.
///
/// Returns `None` when the file is missing, empty, unreadable, or not valid
/// JSON for `T`; corruption is logged as a warning so the caller can fall
/// back to an empty default rather than fail the run.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cannot read {:?}: {e} - starting from empty state", path);
            return None;
        }
    };

    if content.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                "Corrupt JSON in {:?}: {e} - starting from empty state",
                path
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);
        value.insert("b".to_string(), 2u32);

        save_json(&path, &value).unwrap();
        let loaded: BTreeMap<String, u32> = load_json(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/data.json");

        save_json(&path, &vec![1, 2, 3]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        save_json(&path, &42u32).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("data.json")]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Vec<u32>> = load_json(&dir.path().join("absent.json"));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{not valid json").unwrap();

        let loaded: Option<Vec<u32>> = load_json(&path);
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "").unwrap();

        let loaded: Option<Vec<u32>> = load_json(&path);
        assert!(loaded.is_none());
    }
}
