//! An in-memory snapshot store.
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::{
    Result, StreamId,
    snapshot::{SnapshotStore, StoredSnapshot},
};

use dashmap::DashMap;

/// An in-memory, thread-safe snapshot store.
///
/// Only the latest snapshot per stream is kept.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<DashMap<StreamId, StoredSnapshot>>,
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    #[instrument(skip(self, state), fields(stream = %stream))]
    async fn save(&self, stream: &StreamId, version: i64, state: Vec<u8>) -> Result<()> {
        let stored_snapshot = StoredSnapshot::new(stream.clone(), version, state);
        self.snapshots.insert(stream.clone(), stored_snapshot);
        Ok(())
    }

    #[instrument(skip(self), fields(stream = %stream))]
    async fn load(&self, stream: &StreamId) -> Result<Option<StoredSnapshot>> {
        Ok(self.snapshots.get(stream).map(|r| r.clone()))
    }
}
