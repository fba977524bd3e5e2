//! Error types for remote store operations.

use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur against the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote store could not be reached.
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    /// The remote store rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote store reported an operation failure.
    #[error("remote operation failed: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}
