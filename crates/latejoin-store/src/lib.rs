//! # Latejoin Store
//!
//! Storage for the single authoritative snapshot of a session.
//!
//! ## Overview
//!
//! The [`SnapshotStore`] trait abstracts where the held snapshot lives.
//! [`MemorySnapshotStore`] keeps it in memory behind a lock, which is all a
//! session needs: snapshot lifetime equals session lifetime.
//!
//! [`GatedStore`] wraps any store with the participant's role so that only
//! the authority can originate a snapshot, while every role can record one
//! observed on the wire.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use latejoin_core::{ParticipantRole, SyncSnapshot};
//! use latejoin_store::{GatedStore, MemorySnapshotStore};
//!
//! async fn example() {
//!     let store = GatedStore::new(ParticipantRole::Authority, Arc::new(MemorySnapshotStore::new()));
//!     store.originate(SyncSnapshot::new().with("score", 100)).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Wholesale replace**: snapshots are never merged
//! - **Idempotent writes**: writing an equal snapshot returns `Unchanged`
//! - **No deletion**: once held, a snapshot is only ever superseded

pub mod error;
pub mod gated;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use gated::GatedStore;
pub use memory::MemorySnapshotStore;
pub use traits::{ReplaceResult, SnapshotStore};
