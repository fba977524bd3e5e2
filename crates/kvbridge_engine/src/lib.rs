//! # kvbridge Engine
//!
//! Synchronization engine for kvbridge.
//!
//! This crate provides:
//! - Sync lifecycle state machine (disabled → connecting → priming → live)
//! - Priming (bulk reconciliation of local and remote state)
//! - Push path (local writes mirrored outward, fire-and-forget)
//! - Pull path (remote changes applied locally, echoes suppressed)
//! - Last-write-wins conflict resolution over embedded timestamps
//! - Stable per-installation device identity
//!
//! ## Architecture
//!
//! The engine sits between two collaborators it does not own: a
//! [`kvbridge_store::MirroredStore`] holding device state, and a
//! [`kvbridge_remote::RemoteStore`] the host connected before the
//! engine started. The engine installs itself as the store's observer
//! and as the remote subscription listener; everything it does is a
//! reaction to one of those two event sources plus the enable/disable
//! lifecycle.
//!
//! ## Key Invariants
//!
//! - Local writes commit locally before any remote dispatch
//! - A store caller never observes a sync failure
//! - A device's own writes are never re-applied to it
//! - At most one live subscription exists at a time
//! - Priming never deletes local entries (no delete-by-absence)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod device;
mod engine;
mod error;

pub use config::{SyncConfig, FIELD_API_KEY, FIELD_PROJECT_ID};
pub use conflict::{resolve, Resolution};
pub use device::{DeviceId, DEVICE_ID_KEY};
pub use engine::{is_sync_enabled, SyncEngine, SyncState, SyncStats, ENABLED_KEY};
pub use error::{SyncError, SyncResult};
