//! End-to-end tests wiring the engine to in-memory collaborators.

use kvbridge_engine::{is_sync_enabled, SyncConfig, SyncEngine, SyncState};
use kvbridge_remote::{MemoryRemote, RemoteRecord, RemoteStore};
use kvbridge_store::{
    FileBackend, KvBackend, MemoryBackend, MirroredStore, StoreResult, WriteOrigin,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> SyncConfig {
    SyncConfig::new("test-key", "test-project")
}

/// A backend that counts `set` calls per key, for observing how many
/// times sync actually mutated an entry.
#[derive(Default)]
struct CountingBackend {
    inner: MemoryBackend,
    set_counts: Mutex<BTreeMap<String, usize>>,
}

impl CountingBackend {
    fn set_count(&self, key: &str) -> usize {
        self.set_counts.lock().get(key).copied().unwrap_or(0)
    }
}

impl KvBackend for CountingBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        *self.set_counts.lock().entry(key.to_string()).or_insert(0) += 1;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.inner.remove(key)
    }

    fn clear(&self) -> StoreResult<Vec<String>> {
        self.inner.clear()
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }

    fn len(&self) -> StoreResult<usize> {
        self.inner.len()
    }
}

#[test]
fn local_write_is_pushed_and_not_echoed_back() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(CountingBackend::default()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    store.set("note", "hello", WriteOrigin::Local).unwrap();

    // The push reached the remote, tagged with our identity.
    let record = remote.record("note").unwrap();
    assert_eq!(record.device_id, engine.device_id().as_str());
    assert_eq!(record.normalized_value().as_deref(), Some("hello"));

    // The live event our own upsert produced was discarded, so the
    // entry was written exactly once.
    assert_eq!(store.backend().set_count("note"), 1);
    assert_eq!(engine.stats().echoes_skipped, 1);
    assert_eq!(engine.stats().pushed_upserts, 1);
}

#[test]
fn two_devices_converge() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());

    let store_a = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine_a = SyncEngine::new(Arc::clone(&store_a), Arc::clone(&remote)).unwrap();
    engine_a.enable(&config()).unwrap();

    let store_b = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine_b = SyncEngine::new(Arc::clone(&store_b), Arc::clone(&remote)).unwrap();
    engine_b.enable(&config()).unwrap();

    assert_ne!(engine_a.device_id(), engine_b.device_id());

    store_a.set("shared", "from-a", WriteOrigin::Local).unwrap();
    assert_eq!(store_b.get("shared").unwrap().as_deref(), Some("from-a"));

    store_b.set("reply", "from-b", WriteOrigin::Local).unwrap();
    assert_eq!(store_a.get("reply").unwrap().as_deref(), Some("from-b"));

    // One push per write; the receiving side applied with remote
    // origin and must not have pushed again.
    assert_eq!(remote.upsert_calls(), 2);
}

#[test]
fn remote_removal_wins_on_other_devices() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());

    let store_a = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine_a = SyncEngine::new(Arc::clone(&store_a), Arc::clone(&remote)).unwrap();
    engine_a.enable(&config()).unwrap();

    let store_b = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine_b = SyncEngine::new(Arc::clone(&store_b), Arc::clone(&remote)).unwrap();
    engine_b.enable(&config()).unwrap();

    store_a.set("doomed", "x", WriteOrigin::Local).unwrap();
    assert!(store_b.get("doomed").unwrap().is_some());

    store_a.remove("doomed", WriteOrigin::Local).unwrap();
    assert!(store_b.get("doomed").unwrap().is_none());
    assert!(store_a.get("doomed").unwrap().is_none());
}

#[test]
fn priming_adopts_absent_keys() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(RemoteRecord::text("fresh", "remote value", "dev-other", 10));

    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    assert_eq!(store.get("fresh").unwrap().as_deref(), Some("remote value"));
    assert_eq!(engine.stats().prime_adopted, 1);

    // Adoption is a remote-origin write; nothing was pushed back.
    assert_eq!(remote.upsert_calls(), 0);
}

#[test]
fn priming_is_last_write_wins_when_comparable() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(RemoteRecord::text(
        "newer-remote",
        r#"{"v":2,"updatedAt":10}"#,
        "dev-other",
        10,
    ));
    remote.seed(RemoteRecord::text(
        "older-remote",
        r#"{"v":2,"updatedAt":5}"#,
        "dev-other",
        10,
    ));

    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    store
        .set("newer-remote", r#"{"v":1,"updatedAt":5}"#, WriteOrigin::Local)
        .unwrap();
    store
        .set("older-remote", r#"{"v":1,"updatedAt":10}"#, WriteOrigin::Local)
        .unwrap();

    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    assert_eq!(
        store.get("newer-remote").unwrap().as_deref(),
        Some(r#"{"v":2,"updatedAt":10}"#)
    );
    assert_eq!(
        store.get("older-remote").unwrap().as_deref(),
        Some(r#"{"v":1,"updatedAt":10}"#)
    );
}

#[test]
fn priming_never_clobbers_untimestamped_local_state() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(RemoteRecord::text(
        "legacy",
        r#"{"v":"remote","updatedAt":999}"#,
        "dev-other",
        10,
    ));

    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    store
        .set("legacy", "pre-instrumentation value", WriteOrigin::Local)
        .unwrap();

    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    assert_eq!(
        store.get("legacy").unwrap().as_deref(),
        Some("pre-instrumentation value")
    );
    assert_eq!(engine.stats().prime_kept, 1);
}

#[test]
fn priming_leaves_local_only_keys_untouched() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());

    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    store
        .set("local-only", "still here", WriteOrigin::Local)
        .unwrap();

    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    assert_eq!(
        store.get("local-only").unwrap().as_deref(),
        Some("still here")
    );
}

#[test]
fn priming_skips_malformed_records_and_continues() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(RemoteRecord {
        key: "broken".into(),
        value: None,
        device_id: "dev-other".into(),
        ts: 10,
        server_ts: None,
    });
    remote.seed(RemoteRecord::text("good", "value", "dev-other", 11));

    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    assert!(store.get("broken").unwrap().is_none());
    assert_eq!(store.get("good").unwrap().as_deref(), Some("value"));
    assert_eq!(engine.stats().apply_skipped, 1);
    assert_eq!(engine.state(), SyncState::Live);
}

#[test]
fn structured_remote_values_are_normalized() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(RemoteRecord::structured(
        "settings",
        serde_json::json!({"theme": "dark"}),
        "dev-other",
        10,
    ));

    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    assert_eq!(
        store.get("settings").unwrap().as_deref(),
        Some(r#"{"theme":"dark"}"#)
    );
}

#[test]
fn delete_propagates_exactly_once() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    store.set("gone", "soon", WriteOrigin::Local).unwrap();
    store.remove("gone", WriteOrigin::Local).unwrap();

    assert_eq!(remote.delete_calls(), 1);
    assert!(store.get("gone").unwrap().is_none());
    assert!(remote.record("gone").is_none());
    assert_eq!(engine.stats().pushed_deletes, 1);
}

#[test]
fn bulk_clear_propagates_per_key() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    store.set("a", "1", WriteOrigin::Local).unwrap();
    store.set("b", "2", WriteOrigin::Local).unwrap();
    store.set("c", "3", WriteOrigin::Local).unwrap();

    store.clear(WriteOrigin::Local).unwrap();

    assert_eq!(remote.delete_calls(), 3);
    assert!(remote.records().is_empty());
    assert_eq!(engine.stats().pushed_deletes, 3);
}

#[test]
fn double_enable_holds_a_single_subscription() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();

    engine.enable(&config()).unwrap();
    engine.enable(&config()).unwrap();
    assert_eq!(remote.listener_count(), 1);
    assert_eq!(remote.cancelled_subscriptions(), 1);

    engine.disable().unwrap();
    assert_eq!(remote.listener_count(), 0);
    assert_eq!(remote.cancelled_subscriptions(), 2);
}

#[test]
fn disabled_engine_stops_pushing_and_pulling() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();

    engine.enable(&config()).unwrap();
    engine.disable().unwrap();

    store.set("offline", "write", WriteOrigin::Local).unwrap();
    assert_eq!(remote.upsert_calls(), 0);

    // A change committed remotely while disabled is not delivered.
    remote.upsert("elsewhere", "v", "dev-other", 10).unwrap();
    assert!(store.get("elsewhere").unwrap().is_none());
}

#[test]
fn push_failure_leaves_local_state_authoritative() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();

    remote.set_fail_upsert(true);
    store.set("kept", "locally", WriteOrigin::Local).unwrap();

    assert_eq!(store.get("kept").unwrap().as_deref(), Some("locally"));
    assert!(remote.record("kept").is_none());
    assert_eq!(engine.state(), SyncState::Live);
    assert_eq!(engine.stats().push_failures, 1);
}

#[test]
fn device_identity_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let first_id = {
        let store = Arc::new(MirroredStore::new(FileBackend::open(&path).unwrap()));
        let remote = Arc::new(MemoryRemote::new());
        let engine = SyncEngine::new(Arc::clone(&store), remote).unwrap();
        engine.enable(&config()).unwrap();
        engine.device_id().clone()
    };

    let store = Arc::new(MirroredStore::new(FileBackend::open(&path).unwrap()));
    assert!(is_sync_enabled(store.backend()));

    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), remote).unwrap();
    assert_eq!(engine.device_id(), &first_id);
}

#[test]
fn metadata_keys_are_never_pushed() {
    init_tracing();
    let store = Arc::new(MirroredStore::new(MemoryBackend::new()));
    let remote = Arc::new(MemoryRemote::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&remote)).unwrap();
    engine.enable(&config()).unwrap();
    engine.disable().unwrap();
    engine.enable(&config()).unwrap();

    // Device identity and the enable flag live in the backend and moved
    // through enable/disable cycles without a single remote write.
    assert_eq!(remote.upsert_calls(), 0);
    assert!(remote.records().is_empty());
}
