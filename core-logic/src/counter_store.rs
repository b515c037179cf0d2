//! # Persistent Counter Store
//!
//! Durable `key -> count` map backed by a single pretty-printed JSON file.
//! The file is rewritten in full on every update. Reads never fail: a
//! missing or corrupt file yields an empty map. Writes are best-effort.
//!
//! A single writer process is assumed; no file locking is performed.

use crate::error::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

pub type Counts = BTreeMap<String, u32>;

#[derive(Debug, Clone)]
pub struct CounterStore {
    path: PathBuf,
}

impl CounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole map, degrading to empty on any failure.
    pub fn read(&self) -> Counts {
        match self.try_read() {
            Ok(counts) => counts,
            Err(e) => {
                warn!("{}. Starting from an empty counter map.", e);
                Counts::new()
            }
        }
    }

    fn try_read(&self) -> Result<Counts, StoreError> {
        let path = self.path.display().to_string();
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Counter file {} not found yet", path);
                return Ok(Counts::new());
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        if content.trim().is_empty() {
            return Ok(Counts::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupted { path, source })
    }

    /// Rewrites the file with `counts`. Failures are logged and swallowed.
    pub fn write(&self, counts: &Counts) {
        if let Err(e) = self.try_write(counts) {
            error!("{}", e);
        }
    }

    fn try_write(&self, counts: &Counts) -> Result<(), StoreError> {
        let path = self.path.display().to_string();
        let json = serde_json::to_string_pretty(counts).map_err(|e| StoreError::Write {
            path: path.clone(),
            msg: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write {
                path: path.clone(),
                msg: e.to_string(),
            })?;
        }

        fs::write(&self.path, json).map_err(|e| StoreError::Write {
            path,
            msg: e.to_string(),
        })
    }

    pub fn count(&self, key: &str) -> u32 {
        self.read().get(key).copied().unwrap_or(0)
    }

    /// Read-modify-write of a single key, saturating at `limit`.
    /// Returns the count now stored for `key`.
    pub fn increment(&self, key: &str, limit: u32) -> u32 {
        let mut counts = self.read();
        let entry = counts.entry(key.to_string()).or_insert(0);
        if *entry >= limit {
            return *entry;
        }
        *entry += 1;
        let new_count = *entry;
        self.write(&counts);
        new_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CounterStore::new(dir.path().join("deployment_counts.json"));
        assert!(store.read().is_empty());
        assert_eq!(store.count("0xabc"), 0);
    }

    #[test]
    fn test_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment_counts.json");
        fs::write(&path, "{ not json").unwrap();

        let store = CounterStore::new(&path);
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_increment_persists_and_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let store = CounterStore::new(dir.path().join("deployment_counts.json"));

        assert_eq!(store.increment("0xAbC", 2), 1);
        assert_eq!(store.increment("0xAbC", 2), 2);
        assert_eq!(store.increment("0xAbC", 2), 2);

        let reopened = CounterStore::new(store.path().to_path_buf());
        assert_eq!(reopened.count("0xAbC"), 2);
    }

    #[test]
    fn test_write_is_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = CounterStore::new(dir.path().join("counts.json"));
        let mut counts = Counts::new();
        counts.insert("0x1".into(), 1);
        store.write(&counts);

        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "{\n  \"0x1\": 1\n}");
    }
}
