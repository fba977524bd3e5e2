//! # kvbridge Remote
//!
//! Remote store abstraction and wire types for kvbridge.
//!
//! This crate specifies what the sync engine needs from a replicated
//! remote collection, without knowing how the connection to it was
//! established:
//! - [`RemoteRecord`] - the replicated entry and its wire shape
//! - [`RemoteEvent`] - per-key change notifications
//! - [`RemoteStore`] - the consumed interface (fetch, upsert, delete,
//!   subscribe)
//! - [`Subscription`] - explicit-cancel handle for a live subscription
//! - [`MemoryRemote`] - in-memory implementation for tests and loopback
//!
//! ## Guarantees
//!
//! - `fetch_all` returns the full snapshot at call time
//! - Events for the *same* key arrive in remote commit order; there is
//!   no cross-key ordering guarantee
//! - Every operation may fail; failures are non-fatal to the engine

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod memory;
mod record;
mod store;

pub use error::{RemoteError, RemoteResult};
pub use event::RemoteEvent;
pub use memory::MemoryRemote;
pub use record::{embedded_updated_at, RemoteRecord};
pub use store::{RemoteListener, RemoteStore, Subscription};
