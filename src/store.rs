//! Baseline persistence
//!
//! The baseline is a pretty-printed JSON object of absolute path -> digest,
//! kept next to where the monitor runs (not inside the watched tree).

use crate::error::{FimError, Result};
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default baseline file name, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "file_hashes.json";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the last baseline, or an empty snapshot on first run
    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| FimError::storage(&self.path, e))?;

        serde_json::from_str(&content).map_err(|source| FimError::Serialization {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the snapshot, replacing any previous baseline.
    ///
    /// Goes through a sibling temp file and a rename so readers never see a
    /// half-written baseline.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = to_json(snapshot).map_err(|source| FimError::Serialization {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.temp_path();
        let written = write_synced(&tmp_path, &json)
            .and_then(|_| fs::rename(&tmp_path, &self.path));

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(FimError::storage(&self.path, e));
        }

        tracing::debug!("Saved {} entries to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_STATE_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

/// 4-space indented JSON, matching baselines written by earlier versions
fn to_json(snapshot: &Snapshot) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    snapshot.serialize(&mut serializer)?;
    Ok(buf)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut s = Snapshot::new();
        s.insert("/watched/a.txt", "aa11");
        s.insert("/watched/sub/b with space.txt", "bb22");
        s.insert("/watched/ünïcode.txt", "cc33");
        s
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("file_hashes.json"));
        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("file_hashes.json"));
        let snapshot = sample();

        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), snapshot);
    }

    #[test]
    fn test_round_trip_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("file_hashes.json"));

        store.save(&Snapshot::new()).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), Snapshot::new());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("file_hashes.json"));

        store.save(&sample()).unwrap();
        store.save(&Snapshot::new()).unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(!temp_dir.path().join("file_hashes.json.tmp").exists());
    }

    #[test]
    fn test_format_is_plain_json_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file_hashes.json");
        let store = SnapshotStore::new(&path);
        store.save(&sample()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    \"/watched/a.txt\": \"aa11\""));

        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["/watched/a.txt"], "aa11");
    }

    #[test]
    fn test_loads_baseline_written_by_hand() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file_hashes.json");
        fs::write(&path, r#"{"/x/a": "01", "/x/b": "02"}"#).unwrap();

        let snapshot = SnapshotStore::new(&path).load().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("/x/b"), Some("02"));
    }

    #[test]
    fn test_corrupt_baseline_is_hard_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file_hashes.json");
        fs::write(&path, "{\"/x/a\": ").unwrap();

        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, FimError::Serialization { .. }));
    }

    #[test]
    fn test_unwritable_destination_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("missing_dir").join("state.json"));

        let err = store.save(&sample()).unwrap_err();
        assert!(matches!(err, FimError::Storage { .. }));
    }
}
