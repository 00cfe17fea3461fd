//! In-memory implementation of the SnapshotStore trait.

use std::sync::RwLock;

use async_trait::async_trait;
use latejoin_core::SyncSnapshot;

use crate::error::Result;
use crate::traits::{ReplaceResult, SnapshotStore};

/// In-memory snapshot holder. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    snapshot: Option<SyncSnapshot>,
    generation: u64,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `snapshot`.
    pub fn with_snapshot(snapshot: SyncSnapshot) -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                snapshot: Some(snapshot),
                generation: 1,
            }),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn current(&self) -> Result<Option<SyncSnapshot>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.snapshot.clone())
    }

    async fn replace(&self, snapshot: SyncSnapshot) -> Result<ReplaceResult> {
        let mut inner = self.inner.write().unwrap();

        let result = match &inner.snapshot {
            None => ReplaceResult::Created,
            Some(held) if *held == snapshot => return Ok(ReplaceResult::Unchanged),
            Some(_) => ReplaceResult::Replaced,
        };

        inner.snapshot = Some(snapshot);
        inner.generation += 1;
        Ok(result)
    }

    async fn generation(&self) -> Result<u64> {
        Ok(self.inner.read().unwrap().generation)
    }
}
