//! # Event-Sourced Aggregates
//!
//! `eventloom` models a domain entity as a sequence of immutable, typed
//! events. The current state of an entity is rebuilt by replaying its events,
//! and new events are persisted with optimistic concurrency control.
//!
//! ## Core Concepts
//!
//! - **[`Aggregate`]**: A consistency boundary. Command methods validate
//!   against the current state and record events; registered appliers fold
//!   each event into state, both live and during replay.
//! - **[`Event`]**: An immutable fact with a sequence number, a type name and a
//!   typed payload.
//! - **[`Codec`]**: Maps event type names to payload types so events can be
//!   encoded for storage and decoded on replay.
//! - **[`EventStore`]**: An append-only, per-stream log with a
//!   compare-and-append primitive.
//! - **[`SnapshotStore`]**: Optional materialised state used to bound replay
//!   cost.
//! - **[`Repository`]**: Fetches, saves and transactionally updates
//!   aggregates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use eventloom::{
//!     Aggregate, AggregateBase, Codec, Error, Result,
//!     repository::{GenericRepository, Repository},
//!     store::in_memory::InMemoryEventStore,
//! };
//! use uuid::Uuid;
//!
//! #[derive(Debug)]
//! struct Counter {
//!     base: AggregateBase<Self>,
//!     total: u64,
//! }
//!
//! impl Counter {
//!     fn increment(&mut self, by: u64) -> Result<()> {
//!         if by == 0 {
//!             return Err(Error::Validation("increment must be positive".into()));
//!         }
//!         self.next("incremented", by)
//!     }
//!
//!     fn incremented(&mut self, by: &u64) {
//!         self.total += by;
//!     }
//! }
//!
//! impl Aggregate for Counter {
//!     fn new(id: Uuid) -> Result<Self> {
//!         let mut base = AggregateBase::new("counter", id);
//!         base.register_applier("incremented", Self::incremented)?;
//!         Ok(Self { base, total: 0 })
//!     }
//!
//!     fn base(&self) -> &AggregateBase<Self> {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut AggregateBase<Self> {
//!         &mut self.base
//!     }
//! }
//!
//! async fn counter_example() -> Result<()> {
//!     let mut codec = Codec::new();
//!     codec.register::<u64>("incremented")?;
//!
//!     let store = Arc::new(InMemoryEventStore::default());
//!     let repo = GenericRepository::<Counter, _>::new(store, Arc::new(codec));
//!
//!     let mut counter = Counter::new(Uuid::new_v4())?;
//!     repo.verify(&counter)?;
//!
//!     repo.use_aggregate(&mut counter, |c: &mut Counter| c.increment(2))
//!         .await?;
//!     assert_eq!(counter.total, 2);
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

use futures::stream::BoxStream;

pub use async_trait::async_trait;

pub mod aggregate;
pub mod codec;
pub mod event;
pub mod repository;
pub mod snapshot;
pub mod store;

pub use aggregate::{Aggregate, AggregateBase};
pub use codec::Codec;
pub use event::{Event, Payload, RecordedEvent, StreamId};
pub use repository::{GenericRepository, Repository};
pub use snapshot::{SnapshotPolicy, SnapshotStore, StoredSnapshot};

/// The error type for this crate.
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    /// Occurs when a stream's current version does not match the version an
    /// append expected, indicating a concurrent writer got there first.
    #[error("aggregate conflict on {stream}: expected version {expected}, found {actual}")]
    Conflict {
        /// The contended stream.
        stream: StreamId,
        /// The version the writer expected.
        expected: i64,
        /// The version actually recorded.
        actual: i64,
    },
    /// Occurs when an aggregate has neither events nor a snapshot.
    #[error("aggregate not found: {0}")]
    NotFound(StreamId),
    /// Occurs when reading past the start of a stream that does not exist.
    #[error("event stream not found: {0}")]
    StreamNotFound(StreamId),
    /// No applier or codec is registered for an event type.
    #[error("unregistered event type {0:?}")]
    UnregisteredEventType(String),
    /// An applier or codec was registered twice for the same event type.
    #[error("event type {0:?} is already registered")]
    DuplicateRegistration(String),
    /// An event does not directly follow the version it is applied to or
    /// appended after.
    #[error("sequence gap: expected sequence {expected}, found {found}")]
    SequenceGap {
        /// The sequence number that should have come next.
        expected: i64,
        /// The sequence number that was supplied.
        found: i64,
    },
    /// An event payload is not of the type registered for its event type.
    #[error("payload of {event_type:?} is not a {expected}")]
    PayloadMismatch {
        /// The event type name.
        event_type: String,
        /// The registered payload type.
        expected: &'static str,
    },
    /// A payload could not be serialised.
    #[error("failed to encode {event_type:?} payload: {reason}")]
    Encode {
        /// The event type name.
        event_type: String,
        /// The serializer's message.
        reason: String,
    },
    /// Stored bytes could not be deserialised into the registered payload type.
    #[error("failed to decode {event_type:?} payload: {reason}")]
    Decode {
        /// The event type name.
        event_type: String,
        /// The deserializer's message.
        reason: String,
    },
    /// Snapshotting or restoring an aggregate failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
    /// Wraps an error from the underlying event or snapshot store.
    #[error("event store error: {0}")]
    Store(String),
    /// Occurs when a command fails a validation rule.
    #[error("validation error: {0}")]
    Validation(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An ordered, finite stream of recorded events.
pub type EventStream = BoxStream<'static, Result<RecordedEvent>>;

/// The trait for event stores.
///
/// An event store keeps one append-only stream of encoded events per
/// [`StreamId`]. Sequence numbers within a stream start at 1 and have no
/// gaps.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `events` to `stream` if, and only if, the stream's current
    /// version equals `expected_version`.
    ///
    /// The events must already be numbered `expected_version + 1` onwards.
    /// This operation must be atomic: either every event is appended or none
    /// is. Of two concurrent appends with the same expected version exactly
    /// one succeeds; the other fails with [`Error::Conflict`].
    async fn append(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: Vec<RecordedEvent>,
    ) -> Result<()>;

    /// Reads the events of `stream` with a sequence number of at least
    /// `from_version`, in ascending order.
    ///
    /// A stream that does not exist reads as empty when `from_version <= 1`
    /// and fails with [`Error::StreamNotFound`] otherwise.
    async fn read(&self, stream: &StreamId, from_version: i64) -> Result<EventStream>;
}
