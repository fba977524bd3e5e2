//! Sync engine lifecycle, push path, and pull path.

use crate::config::SyncConfig;
use crate::conflict::{resolve, Resolution};
use crate::device::DeviceId;
use crate::error::{SyncError, SyncResult};
use kvbridge_remote::{RemoteEvent, RemoteListener, RemoteRecord, RemoteStore, Subscription};
use kvbridge_store::{KvBackend, MirroredStore, StoreEvent, StoreObserver, WriteOrigin};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Reserved backend key holding the persisted enable flag.
pub const ENABLED_KEY: &str = "kvbridge.enabled";

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Sync is off; the store operates purely locally.
    Disabled,
    /// Verifying the remote collaborator is reachable.
    Connecting,
    /// Bulk reconciliation of local and remote state.
    Priming,
    /// Live: remote changes stream in, local changes stream out.
    Live,
}

impl SyncState {
    /// Returns true if the engine is enabled in any form.
    ///
    /// The push path is active in every enabled state, not just `Live`,
    /// so writes made during priming are not lost.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SyncState::Disabled)
    }

    /// Returns true if live change delivery is attached.
    pub fn is_live(&self) -> bool {
        matches!(self, SyncState::Live)
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Local writes pushed to the remote store.
    pub pushed_upserts: u64,
    /// Local removals pushed to the remote store.
    pub pushed_deletes: u64,
    /// Outward pushes that failed and were dropped.
    pub push_failures: u64,
    /// Remote events applied to the local store.
    pub remote_applied: u64,
    /// Remote events discarded as this device's own echoes.
    pub echoes_skipped: u64,
    /// Priming decisions that adopted the remote value.
    pub prime_adopted: u64,
    /// Priming decisions that kept the local value.
    pub prime_kept: u64,
    /// Records skipped during priming or live apply as malformed.
    pub apply_skipped: u64,
    /// Last contained error, if any.
    pub last_error: Option<String>,
}

/// The synchronization engine.
///
/// Orchestrates a [`MirroredStore`] and a [`RemoteStore`]: owns the
/// enable/disable lifecycle, runs priming, holds the live subscription,
/// and forwards local writes outward. Construct it with
/// [`SyncEngine::new`], which also installs the engine as the store's
/// observer; the handle is an `Arc` because both collaborators call
/// back into it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kvbridge_engine::{SyncConfig, SyncEngine};
/// use kvbridge_remote::MemoryRemote;
/// use kvbridge_store::{MemoryBackend, MirroredStore, WriteOrigin};
///
/// let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
/// let remote = Arc::new(MemoryRemote::new());
/// let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
///
/// engine.enable(&SyncConfig::new("key", "project")).unwrap();
/// store.set("note", "hello", WriteOrigin::Local).unwrap();
/// assert!(remote.record("note").is_some());
/// ```
pub struct SyncEngine<B: KvBackend + 'static, R: RemoteStore + 'static> {
    store: Arc<MirroredStore<B>>,
    remote: Arc<R>,
    device_id: DeviceId,
    state: RwLock<SyncState>,
    subscription: Mutex<Option<Subscription>>,
    stats: RwLock<SyncStats>,
    // Handed to the subscription listener so events reach the engine
    // without keeping it alive.
    weak_self: Weak<Self>,
}

impl<B: KvBackend + 'static, R: RemoteStore + 'static> SyncEngine<B, R> {
    /// Creates the engine and installs it as the store's observer.
    ///
    /// Loads (or generates) the device identity from the store's
    /// backend. The engine starts `Disabled`; call
    /// [`SyncEngine::enable`] to start syncing.
    ///
    /// # Errors
    ///
    /// Returns an error if the device identity cannot be read or
    /// persisted.
    pub fn new(store: Arc<MirroredStore<B>>, remote: Arc<R>) -> SyncResult<Arc<Self>> {
        let device_id = DeviceId::load_or_create(store.backend())?;

        let engine = Arc::new_cyclic(|weak| Self {
            store: Arc::clone(&store),
            remote,
            device_id,
            state: RwLock::new(SyncState::Disabled),
            subscription: Mutex::new(None),
            stats: RwLock::new(SyncStats::default()),
            weak_self: weak.clone(),
        });

        kvbridge_store::attach(&store, &engine);
        Ok(engine)
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// This installation's identity.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Records a contained failure without interrupting operation.
    fn note_failure(&self, error: &SyncError) {
        self.stats.write().last_error = Some(error.to_string());
    }

    /// Enables sync: connect, prime, then go live.
    ///
    /// Enabling while already enabled tears down the previous
    /// subscription and restarts from `Connecting`. The enable flag is
    /// persisted once the configuration validates, so the host can
    /// re-enable on next startup even if this attempt fails to
    /// connect.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Configuration`] if mandatory fields are missing;
    ///   the engine state is not touched.
    /// - [`SyncError::Connection`] if the remote collaborator is
    ///   unreachable or the subscription cannot be established; the
    ///   engine returns to `Disabled`.
    /// - [`SyncError::Store`] if the enable flag cannot be persisted.
    ///
    /// A priming failure is *not* an error: it is logged and the
    /// engine proceeds to live sync.
    pub fn enable(&self, config: &SyncConfig) -> SyncResult<()> {
        if let Err(error) = config.validate() {
            warn!(%error, "sync not enabled");
            return Err(error);
        }

        self.teardown_subscription();
        self.persist_enabled(true)?;
        self.set_state(SyncState::Connecting);

        if let Err(remote_error) = self.remote.connect() {
            self.set_state(SyncState::Disabled);
            let error = SyncError::Connection(remote_error);
            warn!(%error, "sync not enabled");
            self.note_failure(&error);
            return Err(error);
        }

        self.set_state(SyncState::Priming);
        self.prime();

        let engine = self.weak_self.clone();
        let listener: RemoteListener = Arc::new(move |event| {
            if let Some(engine) = engine.upgrade() {
                engine.apply_remote(event);
            }
        });

        match self.remote.subscribe(listener) {
            Ok(subscription) => {
                *self.subscription.lock() = Some(subscription);
            }
            Err(remote_error) => {
                self.set_state(SyncState::Disabled);
                let error = SyncError::Connection(remote_error);
                warn!(%error, "live subscription failed");
                self.note_failure(&error);
                return Err(error);
            }
        }

        self.set_state(SyncState::Live);
        info!(device_id = %self.device_id, "sync live");
        Ok(())
    }

    /// Disables sync, cancelling the live subscription.
    ///
    /// Idempotent: disabling a disabled engine is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the enable flag cannot be persisted; the
    /// subscription is torn down regardless.
    pub fn disable(&self) -> SyncResult<()> {
        self.teardown_subscription();

        let was_enabled = self.state().is_enabled();
        self.set_state(SyncState::Disabled);
        self.persist_enabled(false)?;

        if was_enabled {
            info!("sync disabled");
        }
        Ok(())
    }

    fn teardown_subscription(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }
    }

    fn persist_enabled(&self, enabled: bool) -> SyncResult<()> {
        let flag = if enabled { "1" } else { "" };
        self.store.backend().set(ENABLED_KEY, flag)?;
        Ok(())
    }

    /// Bulk reconciliation: fold the remote snapshot into local state.
    ///
    /// Entries present locally but absent remotely are left untouched.
    /// Failure to fetch is logged and priming is skipped for this
    /// cycle; availability is favored over full reconciliation.
    fn prime(&self) {
        let records = match self.remote.fetch_all() {
            Ok(records) => records,
            Err(remote_error) => {
                let error = SyncError::Prime(remote_error);
                warn!(%error, "continuing to live sync unprimed");
                self.note_failure(&error);
                return;
            }
        };

        let total = records.len();
        for record in records {
            if let Err(error) = self.prime_record(&record) {
                debug!(%error, "skipped record during priming");
                self.note_failure(&error);
                self.stats.write().apply_skipped += 1;
            }
        }

        let stats = self.stats.read();
        info!(
            total,
            adopted = stats.prime_adopted,
            kept = stats.prime_kept,
            "priming complete"
        );
    }

    fn prime_record(&self, record: &RemoteRecord) -> SyncResult<()> {
        let Some(value) = record.normalized_value() else {
            return Err(SyncError::Apply {
                key: record.key.clone(),
                reason: "record has no value".into(),
            });
        };

        let local = self.store.get(&record.key)?;
        match resolve(local.as_deref(), &value) {
            Resolution::AdoptRemote => {
                self.store
                    .set(&record.key, &value, WriteOrigin::Remote)?;
                self.stats.write().prime_adopted += 1;
            }
            Resolution::KeepLocal => {
                self.stats.write().prime_kept += 1;
            }
        }
        Ok(())
    }

    /// Pull path: applies one live remote event to the local store.
    ///
    /// Upserts tagged with this device's identity are echoes of our own
    /// pushes and are discarded. Removals always win; no echo or
    /// conflict check (removing an absent key is harmless).
    fn apply_remote(&self, event: RemoteEvent) {
        match event {
            RemoteEvent::Added(record) | RemoteEvent::Modified(record) => {
                if record.device_id == self.device_id.as_str() {
                    debug!(key = %record.key, "skipped own echo");
                    self.stats.write().echoes_skipped += 1;
                    return;
                }

                let Some(value) = record.normalized_value() else {
                    let error = SyncError::Apply {
                        key: record.key.clone(),
                        reason: "record has no value".into(),
                    };
                    warn!(%error, "skipped live record");
                    self.note_failure(&error);
                    self.stats.write().apply_skipped += 1;
                    return;
                };

                match self.store.set(&record.key, &value, WriteOrigin::Remote) {
                    Ok(()) => self.stats.write().remote_applied += 1,
                    Err(store_error) => {
                        let error = SyncError::Store(store_error);
                        warn!(key = %record.key, %error, "failed to apply remote write");
                        self.note_failure(&error);
                    }
                }
            }
            RemoteEvent::Removed { key } => {
                match self.store.remove(&key, WriteOrigin::Remote) {
                    Ok(_) => self.stats.write().remote_applied += 1,
                    Err(store_error) => {
                        let error = SyncError::Store(store_error);
                        warn!(%key, %error, "failed to apply remote removal");
                        self.note_failure(&error);
                    }
                }
            }
        }
    }

    /// Push path: forwards one local mutation to the remote store.
    ///
    /// Fire-and-forget: the local write has already committed, and a
    /// push failure must never surface to the store caller.
    fn push(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Set { key, value } => {
                let ts = unix_millis();
                match self
                    .remote
                    .upsert(key, value, self.device_id.as_str(), ts)
                {
                    Ok(()) => self.stats.write().pushed_upserts += 1,
                    Err(source) => self.note_push_failure(key, source),
                }
            }
            StoreEvent::Removed { key } => match self.remote.delete(key) {
                Ok(()) => self.stats.write().pushed_deletes += 1,
                Err(source) => self.note_push_failure(key, source),
            },
            StoreEvent::Cleared { keys } => {
                // The remote contract only exposes per-key delete for
                // propagation, so a bulk clear fans out.
                for key in keys {
                    match self.remote.delete(key) {
                        Ok(()) => self.stats.write().pushed_deletes += 1,
                        Err(source) => self.note_push_failure(key, source),
                    }
                }
            }
        }
    }

    fn note_push_failure(&self, key: &str, source: kvbridge_remote::RemoteError) {
        let error = SyncError::Push {
            key: key.to_string(),
            source,
        };
        warn!(%error, "dropped push; local state unaffected");
        self.note_failure(&error);
        self.stats.write().push_failures += 1;
    }
}

impl<B: KvBackend + 'static, R: RemoteStore + 'static> StoreObserver for SyncEngine<B, R> {
    fn on_store_event(&self, event: &StoreEvent, origin: WriteOrigin) {
        // Remote-origin writes were applied by the pull path (or by
        // priming); forwarding them back out would echo them forever.
        if origin == WriteOrigin::Remote {
            return;
        }
        if !self.state().is_enabled() {
            return;
        }
        self.push(event);
    }
}

/// Reads the persisted enable flag.
///
/// Hosts check this at startup to decide whether to call
/// [`SyncEngine::enable`] with their persisted configuration.
pub fn is_sync_enabled<B: KvBackend>(backend: &B) -> bool {
    matches!(backend.get(ENABLED_KEY), Ok(Some(flag)) if !flag.is_empty())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbridge_remote::MemoryRemote;
    use kvbridge_store::MemoryBackend;

    fn engine_fixture() -> (
        Arc<MirroredStore<MemoryBackend>>,
        Arc<MemoryRemote>,
        Arc<SyncEngine<MemoryBackend, MemoryRemote>>,
    ) {
        let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
        let remote = Arc::new(MemoryRemote::new());
        let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
        (store, remote, engine)
    }

    fn config() -> SyncConfig {
        SyncConfig::new("key", "project")
    }

    #[test]
    fn starts_disabled() {
        let (_store, _remote, engine) = engine_fixture();
        assert_eq!(engine.state(), SyncState::Disabled);
        assert!(!engine.state().is_enabled());
    }

    #[test]
    fn enable_reaches_live() {
        let (store, _remote, engine) = engine_fixture();
        engine.enable(&config()).unwrap();

        assert_eq!(engine.state(), SyncState::Live);
        assert!(is_sync_enabled(store.backend()));
    }

    #[test]
    fn invalid_config_keeps_disabled() {
        let (store, _remote, engine) = engine_fixture();
        let result = engine.enable(&SyncConfig::default());

        assert!(matches!(result, Err(SyncError::Configuration(_))));
        assert_eq!(engine.state(), SyncState::Disabled);
        assert!(!is_sync_enabled(store.backend()));
    }

    #[test]
    fn connect_failure_keeps_disabled() {
        let (_store, remote, engine) = engine_fixture();
        remote.set_connected(false);

        let result = engine.enable(&config());
        assert!(matches!(result, Err(SyncError::Connection(_))));
        assert_eq!(engine.state(), SyncState::Disabled);
    }

    #[test]
    fn prime_failure_still_goes_live() {
        let (_store, remote, engine) = engine_fixture();
        remote.set_fail_fetch_all(true);

        engine.enable(&config()).unwrap();
        assert_eq!(engine.state(), SyncState::Live);
        assert!(engine.stats().last_error.unwrap().contains("prime failed"));
    }

    #[test]
    fn disable_is_idempotent() {
        let (_store, remote, engine) = engine_fixture();
        engine.enable(&config()).unwrap();

        engine.disable().unwrap();
        engine.disable().unwrap();

        assert_eq!(engine.state(), SyncState::Disabled);
        assert_eq!(remote.listener_count(), 0);
        assert_eq!(remote.cancelled_subscriptions(), 1);
    }

    #[test]
    fn state_predicates() {
        assert!(!SyncState::Disabled.is_enabled());
        assert!(SyncState::Connecting.is_enabled());
        assert!(SyncState::Priming.is_enabled());
        assert!(SyncState::Live.is_enabled());
        assert!(SyncState::Live.is_live());
        assert!(!SyncState::Priming.is_live());
    }

    #[test]
    fn enabled_flag_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(!is_sync_enabled(&backend));

        backend.set(ENABLED_KEY, "1").unwrap();
        assert!(is_sync_enabled(&backend));

        backend.set(ENABLED_KEY, "").unwrap();
        assert!(!is_sync_enabled(&backend));
    }
}
