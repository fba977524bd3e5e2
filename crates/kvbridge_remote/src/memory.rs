//! In-memory remote store for tests and loopback operation.

use crate::error::{RemoteError, RemoteResult};
use crate::event::RemoteEvent;
use crate::record::RemoteRecord;
use crate::store::{RemoteListener, RemoteStore, Subscription};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An in-memory [`RemoteStore`].
///
/// Behaves like a single-region replicated collection: upserts assign a
/// monotonic server stamp and fan out to live listeners synchronously,
/// in commit order. Intended for engine tests and for running the
/// bridge fully local; several devices (engines) can share one instance
/// through an `Arc` to simulate a fleet.
///
/// Failure injection (`set_connected`, `set_fail_fetch_all`,
/// `set_fail_upsert`) and call counters make the engine's containment
/// behavior observable from tests.
#[derive(Default)]
pub struct MemoryRemote {
    records: RwLock<BTreeMap<String, RemoteRecord>>,
    listeners: Arc<RwLock<Vec<(u64, RemoteListener)>>>,
    next_listener_id: AtomicU64,
    sequence: AtomicU64,
    disconnected: AtomicBool,
    fail_fetch_all: AtomicBool,
    fail_upsert: AtomicBool,
    upsert_calls: AtomicU64,
    delete_calls: AtomicU64,
    cancelled_subscriptions: Arc<AtomicU64>,
}

impl MemoryRemote {
    /// Creates a new, connected, empty remote store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the collaborator becoming (un)reachable.
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Makes subsequent `fetch_all` calls fail.
    pub fn set_fail_fetch_all(&self, fail: bool) {
        self.fail_fetch_all.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `upsert` calls fail.
    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    /// Inserts a record without emitting events or stamping.
    ///
    /// For arranging pre-existing remote state in priming tests.
    pub fn seed(&self, record: RemoteRecord) {
        self.records.write().insert(record.key.clone(), record);
    }

    /// Returns the record under `key`, if any.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<RemoteRecord> {
        self.records.read().get(key).cloned()
    }

    /// Returns a copy of all records.
    #[must_use]
    pub fn records(&self) -> BTreeMap<String, RemoteRecord> {
        self.records.read().clone()
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Number of subscription handles cancelled so far.
    #[must_use]
    pub fn cancelled_subscriptions(&self) -> u64 {
        self.cancelled_subscriptions.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls received (including failed ones).
    #[must_use]
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls received (including failed ones).
    #[must_use]
    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn check_connected(&self) -> RemoteResult<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(RemoteError::Unreachable("remote store offline".into()))
        } else {
            Ok(())
        }
    }

    /// Fans an event out to listeners registered at emit time.
    ///
    /// Listeners are cloned out of the lock first: a listener is free
    /// to call back into this store.
    fn emit(&self, event: RemoteEvent) {
        let listeners: Vec<RemoteListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }
}

impl RemoteStore for MemoryRemote {
    fn connect(&self) -> RemoteResult<()> {
        self.check_connected()
    }

    fn fetch_all(&self) -> RemoteResult<Vec<RemoteRecord>> {
        self.check_connected()?;
        if self.fail_fetch_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Backend("injected fetch_all failure".into()));
        }
        Ok(self.records.read().values().cloned().collect())
    }

    fn upsert(&self, key: &str, value: &str, device_id: &str, ts: u64) -> RemoteResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_connected()?;
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(RemoteError::Backend("injected upsert failure".into()));
        }

        let stamp = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = RemoteRecord {
            key: key.to_string(),
            value: Some(Value::String(value.to_string())),
            device_id: device_id.to_string(),
            ts,
            server_ts: Some(stamp),
        };

        let existed = {
            let mut records = self.records.write();
            records.insert(key.to_string(), record.clone()).is_some()
        };

        if existed {
            self.emit(RemoteEvent::Modified(record));
        } else {
            self.emit(RemoteEvent::Added(record));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> RemoteResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_connected()?;

        let existed = self.records.write().remove(key).is_some();
        if existed {
            self.emit(RemoteEvent::Removed {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn delete_all(&self) -> RemoteResult<()> {
        self.check_connected()?;

        let keys: Vec<String> = {
            let mut records = self.records.write();
            let keys = records.keys().cloned().collect();
            records.clear();
            keys
        };
        for key in keys {
            self.emit(RemoteEvent::Removed { key });
        }
        Ok(())
    }

    fn subscribe(&self, listener: RemoteListener) -> RemoteResult<Subscription> {
        self.check_connected()?;

        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().push((id, listener));

        let listeners = Arc::clone(&self.listeners);
        let cancelled = Arc::clone(&self.cancelled_subscriptions);
        Ok(Subscription::new(move || {
            listeners.write().retain(|(entry_id, _)| *entry_id != id);
            cancelled.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
