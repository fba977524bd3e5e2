//! Error types for the sync engine.

use kvbridge_remote::RemoteError;
use kvbridge_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Only `Configuration`, `Connection`, and `Store` ever reach the host
/// (from `enable`/`disable`); the rest are logged and contained at the
/// engine boundary so local store callers are never affected.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Enable was requested without the mandatory configuration fields.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote collaborator was unreachable or rejected credentials.
    #[error("connection failed: {0}")]
    Connection(RemoteError),

    /// Bulk reconciliation failed; the engine proceeds to live sync.
    #[error("prime failed: {0}")]
    Prime(RemoteError),

    /// An individual outward upsert or delete failed; dropped.
    #[error("push failed for key {key}: {source}")]
    Push {
        /// The key whose write was being pushed.
        key: String,
        /// The underlying remote failure.
        source: RemoteError,
    },

    /// A malformed remote record was skipped.
    #[error("cannot apply remote record for key {key}: {reason}")]
    Apply {
        /// The key of the skipped record.
        key: String,
        /// Why the record could not be applied.
        reason: String,
    },

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
