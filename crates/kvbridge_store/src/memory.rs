//! In-memory storage backend for testing.

use crate::backend::KvBackend;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use kvbridge_store::{KvBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.set("a", "1").unwrap();
/// assert_eq!(backend.get("a").unwrap().as_deref(), Some("1"));
/// assert_eq!(backend.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with entries.
    ///
    /// Useful for testing priming scenarios.
    #[must_use]
    pub fn with_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Returns a copy of all entries.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn clear(&self) -> StoreResult<Vec<String>> {
        let mut entries = self.entries.write();
        let keys = entries.keys().cloned().collect();
        entries.clear();
        Ok(keys)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.read().len())
    }
}
