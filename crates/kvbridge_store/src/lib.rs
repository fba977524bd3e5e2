//! # kvbridge Store
//!
//! Local key-value storage for kvbridge.
//!
//! This crate provides the local half of the bridge:
//! - [`KvBackend`] - the capability interface of an ordered string map
//! - [`MemoryBackend`] - for testing and ephemeral use
//! - [`FileBackend`] - persistent JSON snapshot on disk
//! - [`MirroredStore`] - a decorator that notifies an observer of every
//!   mutation, tagged with its [`WriteOrigin`]
//!
//! ## Design Principles
//!
//! - Backends are plain ordered string maps with no sync knowledge
//! - Every mutation commits to the backend **before** anything else
//!   observes it - a caller always reads back its own write
//! - Interception is a visible decorator composed at construction, not a
//!   patched global; propagation decisions live in the observer
//!
//! ## Example
//!
//! ```rust
//! use kvbridge_store::{KvBackend, MemoryBackend, MirroredStore, WriteOrigin};
//!
//! let store = MirroredStore::new(MemoryBackend::new());
//! store.set("greeting", "hello", WriteOrigin::Local).unwrap();
//! assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod mirror;

pub use backend::KvBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use mirror::{attach, MirroredStore, StoreEvent, StoreObserver, WriteOrigin};
