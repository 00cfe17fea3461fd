//! SnapshotStore trait: the abstract interface for the held snapshot.

use async_trait::async_trait;
use latejoin_core::SyncSnapshot;

use crate::error::Result;

/// Result of writing a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceResult {
    /// No snapshot was held before.
    Created,
    /// A different snapshot was replaced.
    Replaced,
    /// The held snapshot was already equal (idempotent - not an error).
    Unchanged,
}

impl ReplaceResult {
    /// Whether the held snapshot observably changed.
    pub fn changed(self) -> bool {
        !matches!(self, ReplaceResult::Unchanged)
    }
}

/// Async interface for holding one snapshot.
///
/// Implementations must serialize reads against writes: a sync request
/// handler may read while an echo handler on another task writes.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The held snapshot, if any.
    async fn current(&self) -> Result<Option<SyncSnapshot>>;

    /// Replace the held snapshot wholesale.
    async fn replace(&self, snapshot: SyncSnapshot) -> Result<ReplaceResult>;

    /// Number of writes that changed the held snapshot.
    async fn generation(&self) -> Result<u64>;
}
