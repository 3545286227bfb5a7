//! Event types: the stream identity, decoded events and their encoded form.
use std::{any::Any, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A type-erased event payload.
///
/// Payloads are shared rather than copied so that an event can sit in an
/// aggregate's uncommitted buffer and be applied without cloning its data.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Identifies an event stream: one aggregate instance of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    kind: String,
    id: Uuid,
}

impl StreamId {
    /// Creates a stream id for the aggregate `kind` with the given `id`.
    pub fn new(kind: impl Into<String>, id: Uuid) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Returns the aggregate kind, e.g. `"list"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the aggregate id.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// An immutable, decoded event carrying a typed payload.
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) id: Uuid,
    pub(crate) stream: StreamId,
    pub(crate) sequence: i64,
    pub(crate) name: String,
    pub(crate) payload: Payload,
    pub(crate) time: DateTime<Utc>,
}

impl Event {
    /// Creates a new event for `stream` at position `sequence`, stamped with
    /// the current time and a fresh id.
    pub fn new<T>(stream: StreamId, sequence: i64, name: impl Into<String>, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::from_payload(stream, sequence, name, Arc::new(payload))
    }

    /// Like [`Event::new`] but takes an already type-erased payload.
    pub fn from_payload(
        stream: StreamId,
        sequence: i64,
        name: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream,
            sequence,
            name: name.into(),
            payload,
            time: Utc::now(),
        }
    }

    /// Returns the unique id of this event.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the stream this event belongs to.
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Returns the id of the aggregate that produced this event.
    pub fn aggregate_id(&self) -> Uuid {
        self.stream.id
    }

    /// Returns the kind of the aggregate that produced this event.
    pub fn aggregate_kind(&self) -> &str {
        &self.stream.kind
    }

    /// Returns the position of this event in its stream, which is also the
    /// aggregate version it produces.
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Returns the event type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the payload downcast to `T`, or `None` if it is another type.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Returns the type-erased payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns when the event was created.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

/// The encoded form of an [`Event`], as persisted by an event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub(crate) id: Uuid,
    pub(crate) stream: StreamId,
    pub(crate) sequence: i64,
    pub(crate) event_type: String,
    pub(crate) data: Vec<u8>,
    pub(crate) time: DateTime<Utc>,
}

impl RecordedEvent {
    /// Creates a new recorded event.
    pub fn new(
        id: Uuid,
        stream: StreamId,
        sequence: i64,
        event_type: impl Into<String>,
        data: Vec<u8>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            stream,
            sequence,
            event_type: event_type.into(),
            data,
            time,
        }
    }

    /// Returns the unique id of the event.
    pub fn id(&self) -> Uuid {
        self.id
    }
    /// Returns the stream the event belongs to.
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }
    /// Returns the position of the event in its stream.
    pub fn sequence(&self) -> i64 {
        self.sequence
    }
    /// Returns the event type name.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
    /// Returns the encoded payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    /// Returns when the event was created.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}
