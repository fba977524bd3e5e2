//! Conflict resolution between local and remote versions of a key.
//!
//! Applied only during priming. Live events are trusted to be newer
//! than whatever they replace and bypass this entirely.

use kvbridge_remote::embedded_updated_at;

/// Which version of a key survives priming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Write the remote value into the local store.
    AdoptRemote,
    /// Leave the local value untouched this cycle.
    KeepLocal,
}

/// Decides between a local value and a remote value for the same key.
///
/// Last-write-wins when both sides carry comparable embedded
/// timestamps, local-wins otherwise:
///
/// 1. No local value: adopt the remote unconditionally.
/// 2. Either side unparseable or missing its embedded `updatedAt`:
///    keep local. A local value that predates instrumentation must not
///    be clobbered on recency we cannot establish.
/// 3. Both comparable: adopt remote iff strictly newer; ties keep
///    local.
pub fn resolve(local: Option<&str>, remote: &str) -> Resolution {
    let Some(local) = local else {
        return Resolution::AdoptRemote;
    };

    match (embedded_updated_at(local), embedded_updated_at(remote)) {
        (Some(local_ts), Some(remote_ts)) if remote_ts > local_ts => Resolution::AdoptRemote,
        _ => Resolution::KeepLocal,
    }
}
