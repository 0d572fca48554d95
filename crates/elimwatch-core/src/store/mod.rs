//! Persistent key-value storage behind the cache coordinator.
//!
//! Keys are coarse documents (one per cached resource class), not per-record
//! rows. The coordinator is the only writer.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

/// String key-value storage that survives restarts.
///
/// Implementations are synchronous; the documents involved are small and the
/// coordinator writes them in the same breath as its in-memory update.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read store file: {}", path.display()))
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write store file: {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove store file: {}", path.display()))
            }
        }
    }
}

/// In-memory store for tests and ephemeral runs.
///
/// Clone shares the underlying map, so a test can keep a handle and inspect
/// what the coordinator persisted.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("metadata").unwrap(), None);

        store.set("metadata", r#"{"a":1}"#).unwrap();
        assert_eq!(store.get("metadata").unwrap().as_deref(), Some(r#"{"a":1}"#));

        store.remove("metadata").unwrap();
        assert_eq!(store.get("metadata").unwrap(), None);
        // Removing an absent key is not an error
        store.remove("metadata").unwrap();
    }

    #[test]
    fn test_memory_store_clone_shares_entries() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(handle.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        assert_eq!(store.get("rosters").unwrap(), None);
        store.set("rosters", "{}").unwrap();
        assert_eq!(store.get("rosters").unwrap().as_deref(), Some("{}"));

        // Value lands as a .json file under the directory
        assert!(dir.path().join("rosters.json").exists());

        store.remove("rosters").unwrap();
        assert_eq!(store.get("rosters").unwrap(), None);
        store.remove("rosters").unwrap();
    }

    #[test]
    fn test_file_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache").join("elimwatch");
        let store = FileStore::new(nested.clone()).unwrap();
        store.set("metadata", "1").unwrap();
        assert!(nested.join("metadata.json").exists());
    }
}
