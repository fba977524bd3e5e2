//! File-based storage backend for persistent storage.

use crate::backend::KvBackend;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// The full map is kept in memory and written to disk as a JSON object
/// snapshot on every mutation, so data survives process restarts.
///
/// # Durability
///
/// Each mutation serializes the map to a sibling temp file and renames
/// it over the snapshot before returning. The rename is the commit
/// point; a crash mid-write leaves the previous snapshot intact.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// Internal locking ensures consistent access.
///
/// # Example
///
/// ```no_run
/// use kvbridge_store::{KvBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("state.json")).unwrap();
/// backend.set("greeting", "hello").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Opens a file-backed store, loading the snapshot if it exists.
    ///
    /// A missing file starts an empty store; the snapshot is created on
    /// the first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or does
    /// not contain a JSON object of strings.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .map_err(|e| StoreError::Corrupted(e.to_string()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current map to disk via temp file + rename.
    ///
    /// Callers must hold the write lock across this call so snapshots
    /// are serialized in mutation order.
    fn persist(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let raw = serde_json::to_string(entries)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.write();
        let existed = entries.remove(key).is_some();
        if existed {
            self.persist(&entries)?;
        }
        Ok(existed)
    }

    fn clear(&self) -> StoreResult<Vec<String>> {
        let mut entries = self.entries.write();
        let keys: Vec<String> = entries.keys().cloned().collect();
        entries.clear();
        self.persist(&entries)?;
        Ok(keys)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.read().len())
    }
}
