//! Storage backend trait definition.

use crate::error::StoreResult;

/// A local key-value storage backend for kvbridge.
///
/// Backends are **ordered string maps**. They hold the device's current
/// state and know nothing about synchronization; mirroring and
/// propagation are layered on top by [`super::MirroredStore`].
///
/// # Invariants
///
/// - A successful `set` is immediately visible to `get` on return
/// - `remove` reports whether the key existed before the call
/// - `clear` returns the removed keys in map order
/// - `keys` iterates in lexicographic key order
/// - Backends must be `Send + Sync`; all methods take `&self` and
///   synchronize internally
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing and ephemeral use
/// - [`super::FileBackend`] - For persistent storage
pub trait KvBackend: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// The write is committed to the backing storage before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be committed.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`, returning `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be committed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Removes every entry, returning the removed keys in map order.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be committed.
    fn clear(&self) -> StoreResult<Vec<String>>;

    /// Returns all keys in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn len(&self) -> StoreResult<usize>;

    /// Returns `true` if the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
