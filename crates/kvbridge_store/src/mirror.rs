//! Mirroring decorator with origin-tagged change notification.
//!
//! [`MirroredStore`] wraps any [`KvBackend`] and reports every mutation
//! to a single observer. Each mutating call carries an explicit
//! [`WriteOrigin`] so the observer can tell host writes (to be
//! propagated outward) from writes the sync layer applied on behalf of
//! a remote device (which must not be propagated again).

use crate::backend::KvBackend;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Who initiated a store mutation.
///
/// The origin is a property of a single call, not of the key: the same
/// key may be written locally now and remotely later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// The host application wrote this entry on this device.
    Local,
    /// The sync layer applied a change that originated elsewhere.
    Remote,
}

/// A single mutation observed on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A key was set to a value.
    Set {
        /// The written key.
        key: String,
        /// The written value.
        value: String,
    },
    /// A key was removed.
    Removed {
        /// The removed key.
        key: String,
    },
    /// The store was cleared.
    Cleared {
        /// The keys that existed before the clear, in map order.
        keys: Vec<String>,
    },
}

/// Receives store mutations after they have committed.
///
/// The observer is invoked synchronously on the mutating caller's
/// thread, after the backend write has committed; the caller's own
/// `get` already sees the new state when the observer runs.
pub trait StoreObserver: Send + Sync {
    /// Called after every successful mutation, regardless of origin.
    fn on_store_event(&self, event: &StoreEvent, origin: WriteOrigin);
}

/// A decorator that mirrors every mutation to an observer.
///
/// This is the interception point of the bridge: the host application
/// and the sync engine both mutate state through a `MirroredStore`, and
/// the engine installs itself as the observer once at startup. The
/// backend remains reachable through [`MirroredStore::backend`] for
/// state that must stay device-private (it bypasses notification).
///
/// # Observer lifetime
///
/// The observer is held as a [`Weak`] reference; once the engine is
/// dropped, mutations proceed without notification.
///
/// # Example
///
/// ```rust
/// use kvbridge_store::{MemoryBackend, MirroredStore, WriteOrigin};
///
/// let store = MirroredStore::new(MemoryBackend::new());
/// store.set("a", "1", WriteOrigin::Local).unwrap();
/// assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
/// ```
pub struct MirroredStore<B: KvBackend> {
    backend: B,
    observer: RwLock<Option<Weak<dyn StoreObserver>>>,
}

impl<B: KvBackend> MirroredStore<B> {
    /// Wraps a backend with mirroring.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            observer: RwLock::new(None),
        }
    }

    /// Returns the wrapped backend.
    ///
    /// Writes made directly to the backend are not observed and never
    /// propagate; the sync engine uses this for its own metadata.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Installs the observer, replacing any previous one.
    ///
    /// There is exactly one observer slot; the engine installs itself
    /// here once at startup.
    pub fn attach_observer(&self, observer: Weak<dyn StoreObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Removes the observer, if any.
    pub fn detach_observer(&self) {
        *self.observer.write() = None;
    }

    /// Returns `true` if a live observer is attached.
    pub fn observer_attached(&self) -> bool {
        self.observer
            .read()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    fn notify(&self, event: &StoreEvent, origin: WriteOrigin) {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.on_store_event(event, origin);
        }
    }

    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.backend.get(key)
    }

    /// Stores `value` under `key` and notifies the observer.
    ///
    /// The backend commit happens first; the observer runs after and
    /// cannot fail the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails (the observer is
    /// then not notified).
    pub fn set(&self, key: &str, value: &str, origin: WriteOrigin) -> StoreResult<()> {
        self.backend.set(key, value)?;
        self.notify(
            &StoreEvent::Set {
                key: key.to_string(),
                value: value.to_string(),
            },
            origin,
        );
        Ok(())
    }

    /// Removes `key` and notifies the observer.
    ///
    /// Notification fires whether or not the key existed, matching the
    /// propagation contract: a removal is an instruction, not a diff.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend removal fails.
    pub fn remove(&self, key: &str, origin: WriteOrigin) -> StoreResult<bool> {
        let existed = self.backend.remove(key)?;
        self.notify(
            &StoreEvent::Removed {
                key: key.to_string(),
            },
            origin,
        );
        Ok(existed)
    }

    /// Clears the store and notifies the observer.
    ///
    /// The event carries the keys that existed before the clear so the
    /// observer can propagate a per-key removal for each.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend clear fails.
    pub fn clear(&self, origin: WriteOrigin) -> StoreResult<Vec<String>> {
        let keys = self.backend.clear()?;
        self.notify(&StoreEvent::Cleared { keys: keys.clone() }, origin);
        Ok(keys)
    }

    /// Returns all keys in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        self.backend.keys()
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn len(&self) -> StoreResult<usize> {
        self.backend.len()
    }

    /// Returns `true` if the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn is_empty(&self) -> StoreResult<bool> {
        self.backend.is_empty()
    }
}

/// Helper for installing an `Arc`-held observer.
///
/// Coerces the concrete observer to the trait object and downgrades it,
/// so callers don't need the unsized-coercion incantation.
pub fn attach<B: KvBackend, O: StoreObserver + 'static>(
    store: &MirroredStore<B>,
    observer: &Arc<O>,
) {
    let observer: Arc<dyn StoreObserver> = observer.clone();
    let weak: Weak<dyn StoreObserver> = Arc::downgrade(&observer);
    store.attach_observer(weak);
}
