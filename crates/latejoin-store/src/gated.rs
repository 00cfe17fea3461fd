//! Role-gated access to a snapshot store.
//!
//! The authority is the only participant that may originate state. Any
//! participant may record a snapshot it observed on the sync data channel:
//! for a peer that is its cached copy, for the authority it is the echo of
//! its own broadcast.

use std::sync::Arc;

use latejoin_core::{ParticipantRole, SyncSnapshot};

use crate::error::{Result, StoreError};
use crate::traits::{ReplaceResult, SnapshotStore};

/// A [`SnapshotStore`] bound to the role of the participant that owns it.
pub struct GatedStore<S: SnapshotStore> {
    role: ParticipantRole,
    inner: Arc<S>,
}

impl<S: SnapshotStore> GatedStore<S> {
    /// Bind `inner` to `role`.
    pub fn new(role: ParticipantRole, inner: Arc<S>) -> Self {
        Self { role, inner }
    }

    /// The role writes are checked against.
    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    /// The wrapped store.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// The held snapshot, if any.
    pub async fn current(&self) -> Result<Option<SyncSnapshot>> {
        self.inner.current().await
    }

    /// Originate a new authoritative snapshot.
    ///
    /// Fails with [`StoreError::NotAuthority`] for peers.
    pub async fn originate(&self, snapshot: SyncSnapshot) -> Result<ReplaceResult> {
        if !self.role.is_authority() {
            return Err(StoreError::NotAuthority { role: self.role });
        }
        self.inner.replace(snapshot).await
    }

    /// Record a snapshot decoded from the sync data channel.
    pub async fn observe(&self, snapshot: SyncSnapshot) -> Result<ReplaceResult> {
        let result = self.inner.replace(snapshot).await?;
        tracing::trace!(role = %self.role, ?result, "observed snapshot");
        Ok(result)
    }
}

impl<S: SnapshotStore> Clone for GatedStore<S> {
    fn clone(&self) -> Self {
        Self {
            role: self.role,
            inner: Arc::clone(&self.inner),
        }
    }
}
