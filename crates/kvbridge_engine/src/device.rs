//! Per-installation device identity.

use kvbridge_store::{KvBackend, StoreResult};
use std::fmt;
use uuid::Uuid;

/// Reserved backend key holding the device identifier.
pub const DEVICE_ID_KEY: &str = "kvbridge.device_id";

/// Opaque identifier of this installation.
///
/// Generated once, persisted in the local store's backend (bypassing
/// the mirrored layer, so it never propagates), and reused for the
/// lifetime of the installation. Outgoing writes are tagged with it;
/// incoming events carrying it are echoes of this device's own writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Loads the persisted identity, generating and persisting a fresh
    /// one on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or written.
    pub fn load_or_create<B: KvBackend>(backend: &B) -> StoreResult<Self> {
        if let Some(existing) = backend.get(DEVICE_ID_KEY)? {
            if !existing.is_empty() {
                return Ok(Self(existing));
            }
        }

        let id = format!("dev-{}", Uuid::new_v4().simple());
        backend.set(DEVICE_ID_KEY, &id)?;
        Ok(Self(id))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
