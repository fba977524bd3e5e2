//! The remote store trait and subscription handle.

use crate::error::RemoteResult;
use crate::event::RemoteEvent;
use crate::record::RemoteRecord;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Callback invoked for each change on the remote collection.
pub type RemoteListener = Arc<dyn Fn(RemoteEvent) + Send + Sync>;

/// The replicated collection as consumed by the sync engine.
///
/// The host constructs an implementation (and whatever connection or
/// authentication it needs) before the engine starts; the engine only
/// sees this interface.
///
/// # Invariants
///
/// - `fetch_all` returns the full current snapshot at call time
/// - `upsert` has merge semantics: the value and tagging fields are
///   replaced, any other server-side fields are left untouched
/// - Events for the same key are delivered in remote commit order
/// - After a subscription is cancelled, its listener is never invoked
///   again
pub trait RemoteStore: Send + Sync {
    /// Verifies the remote store is reachable and authenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if the collaborator cannot be reached or the
    /// credentials were rejected.
    fn connect(&self) -> RemoteResult<()>;

    /// Fetches the full current snapshot of the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be retrieved.
    fn fetch_all(&self) -> RemoteResult<Vec<RemoteRecord>>;

    /// Writes a value under `key`, tagged with the writing device.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or cannot be sent.
    fn upsert(&self, key: &str, value: &str, device_id: &str, ts: u64) -> RemoteResult<()>;

    /// Deletes the record under `key`.
    ///
    /// Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is rejected or cannot be sent.
    fn delete(&self, key: &str) -> RemoteResult<()>;

    /// Deletes every record in the collection.
    ///
    /// The engine propagates bulk clears per key and never calls this;
    /// it exists for administrative use by the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletes are rejected or cannot be sent.
    fn delete_all(&self) -> RemoteResult<()>;

    /// Starts live change delivery to `listener`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    fn subscribe(&self, listener: RemoteListener) -> RemoteResult<Subscription>;
}

/// Handle for a live subscription.
///
/// Cancellation is explicit: dropping the handle does **not**
/// unsubscribe. The engine owns exactly one of these while live and
/// cancels it on disable or re-enable.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Wraps the unsubscribe action of a remote implementation.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Stops event delivery. Idempotent.
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel();
        }
    }

    /// Returns `true` until [`Subscription::cancel`] has run.
    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
