//! The snapshot module contains the traits and structs for creating and storing
//! aggregate snapshots.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Aggregate, Result, StreamId};

/// Represents a stored snapshot, including metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    /// The stream this snapshot materialises.
    stream: StreamId,
    /// The version of the aggregate when this snapshot was taken.
    version: i64,
    /// The opaque state produced by [`Aggregate::snapshot_state`].
    state: Vec<u8>,
    /// When the snapshot was taken.
    time: DateTime<Utc>,
}

impl StoredSnapshot {
    /// Creates a new stored snapshot, stamped with the current time.
    pub fn new(stream: StreamId, version: i64, state: Vec<u8>) -> Self {
        Self {
            stream,
            version,
            state,
            time: Utc::now(),
        }
    }

    /// Returns the stream this snapshot belongs to.
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Returns the version of the aggregate when this snapshot was taken.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the materialised state.
    pub fn state(&self) -> &[u8] {
        &self.state
    }

    /// Returns when the snapshot was taken.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A snapshot store is responsible for persisting and loading snapshots.
///
/// Snapshots are an optimization to reduce the time it takes to hydrate an
/// aggregate. Instead of replaying all events from the beginning of time, an
/// aggregate can be restored from a recent snapshot and then only replay the
/// events that occurred after it. The event stream stays authoritative.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Saves a snapshot for a given stream.
    ///
    /// This should overwrite any existing snapshot for the same stream.
    async fn save(&self, stream: &StreamId, version: i64, state: Vec<u8>) -> Result<()>;

    /// Loads the latest snapshot for a given stream.
    async fn load(&self, stream: &StreamId) -> Result<Option<StoredSnapshot>>;
}

/// Decides, after a successful save, whether a new snapshot should be taken.
///
/// The aggregate still holds the events that were just persisted when the
/// policy is consulted, so `aggregate.changes()` is the batch just written.
pub trait SnapshotPolicy<A: Aggregate>: Send + Sync {
    /// Returns `true` if a snapshot of `aggregate` should be written now.
    fn should_snapshot(&self, aggregate: &A) -> bool;
}

/// Snapshot after every save.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

/// Never snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

/// Snapshot whenever a save crosses a multiple of the given number of
/// versions. A non-positive interval never snapshots.
#[derive(Debug, Clone, Copy)]
pub struct Every(pub i64);

impl<A: Aggregate> SnapshotPolicy<A> for Always {
    fn should_snapshot(&self, _aggregate: &A) -> bool {
        true
    }
}

impl<A: Aggregate> SnapshotPolicy<A> for Never {
    fn should_snapshot(&self, _aggregate: &A) -> bool {
        false
    }
}

impl<A: Aggregate> SnapshotPolicy<A> for Every {
    fn should_snapshot(&self, aggregate: &A) -> bool {
        let interval = self.0;
        if interval <= 0 {
            return false;
        }
        let after = aggregate.version();
        let before = after - aggregate.changes().len() as i64;
        after / interval > before / interval
    }
}

impl<A, F> SnapshotPolicy<A> for F
where
    A: Aggregate,
    F: Fn(&A) -> bool + Send + Sync,
{
    fn should_snapshot(&self, aggregate: &A) -> bool {
        self(aggregate)
    }
}
