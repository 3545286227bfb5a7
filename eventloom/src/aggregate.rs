//! The aggregate abstraction: identity, version, uncommitted events and the
//! applier table that folds events into state.
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use uuid::Uuid;

use crate::{Error, Event, Result, StreamId};

/// A state mutation registered for one event type.
type Applier<A> = Arc<dyn Fn(&mut A, &Event) -> Result<()> + Send + Sync>;

/// The bookkeeping every aggregate embeds: its stream identity, its version,
/// the events produced since the last save and the appliers for each event
/// type it understands.
pub struct AggregateBase<A> {
    stream: StreamId,
    version: i64,
    changes: Vec<Event>,
    appliers: HashMap<String, Applier<A>>,
}

impl<A: 'static> AggregateBase<A> {
    /// Creates an empty base for the aggregate `kind` with the given `id`.
    pub fn new(kind: impl Into<String>, id: Uuid) -> Self {
        Self {
            stream: StreamId::new(kind, id),
            version: 0,
            changes: Vec::new(),
            appliers: HashMap::new(),
        }
    }

    /// Registers `apply` as the state mutation for events of `event_type`
    /// carrying payloads of type `T`.
    ///
    /// The same function is used when recording new events and when replaying
    /// stored ones, so it must depend on nothing but the payload and the
    /// aggregate's own state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRegistration`] if `event_type` already has an
    /// applier.
    pub fn register_applier<T, F>(&mut self, event_type: impl Into<String>, apply: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&mut A, &T) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        if self.appliers.contains_key(&event_type) {
            return Err(Error::DuplicateRegistration(event_type));
        }

        let applier: Applier<A> = Arc::new(move |aggregate: &mut A, event: &Event| {
            let payload = event.data::<T>().ok_or_else(|| Error::PayloadMismatch {
                event_type: event.name().to_owned(),
                expected: std::any::type_name::<T>(),
            })?;
            apply(aggregate, payload);
            Ok(())
        });
        self.appliers.insert(event_type, applier);
        Ok(())
    }
}

impl<A> AggregateBase<A> {
    /// Returns the stream this aggregate reads from and appends to.
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Returns the aggregate id.
    pub fn id(&self) -> Uuid {
        self.stream.id()
    }

    /// Returns the aggregate kind.
    pub fn kind(&self) -> &str {
        self.stream.kind()
    }

    /// Returns the sequence number of the last applied event, 0 if none.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the events recorded since the last successful save.
    pub fn changes(&self) -> &[Event] {
        &self.changes
    }

    /// Returns the event types this aggregate has appliers for.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.appliers.keys().map(String::as_str)
    }

    /// Drops the uncommitted events once they have been persisted.
    pub fn commit(&mut self) {
        self.changes.clear();
    }

    pub(crate) fn applier(&self, event_type: &str) -> Result<Applier<A>> {
        self.appliers
            .get(event_type)
            .cloned()
            .ok_or_else(|| Error::UnregisteredEventType(event_type.to_owned()))
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

impl<A> fmt::Debug for AggregateBase<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<_> = self.appliers.keys().collect();
        event_types.sort();
        f.debug_struct("AggregateBase")
            .field("stream", &self.stream)
            .field("version", &self.version)
            .field("changes", &self.changes.len())
            .field("event_types", &event_types)
            .finish()
    }
}

/// An aggregate is a consistency boundary whose state is derived entirely by
/// folding its event stream.
///
/// Command methods validate against the current state and then call
/// [`Aggregate::next`]; they never mutate fields directly.
pub trait Aggregate: Send + Sync + Sized + 'static {
    /// Creates an empty instance (version 0) for `id` with all appliers
    /// registered.
    ///
    /// # Errors
    ///
    /// Fails if applier registration fails, e.g. on a duplicate event type.
    fn new(id: Uuid) -> Result<Self>;

    /// Returns the embedded base.
    fn base(&self) -> &AggregateBase<Self>;

    /// Returns the embedded base mutably.
    fn base_mut(&mut self) -> &mut AggregateBase<Self>;

    /// Serialises the domain state for a snapshot.
    ///
    /// `Ok(None)` means the aggregate does not support snapshots, which is the
    /// default.
    fn snapshot_state(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Restores the domain state from a snapshot produced by
    /// [`Aggregate::snapshot_state`]. The version is restored by the caller.
    fn restore_snapshot(&mut self, state: &[u8]) -> Result<()> {
        let _ = state;
        Err(Error::Snapshot(format!(
            "aggregate kind {:?} does not support snapshots",
            self.base().kind()
        )))
    }

    /// Returns the aggregate id.
    fn id(&self) -> Uuid {
        self.base().id()
    }

    /// Returns the current version.
    fn version(&self) -> i64 {
        self.base().version()
    }

    /// Returns the events recorded since the last successful save.
    fn changes(&self) -> &[Event] {
        self.base().changes()
    }

    /// Applies a stored event during replay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceGap`] unless the event directly follows the
    /// current version, [`Error::UnregisteredEventType`] if no applier exists
    /// for its type and [`Error::PayloadMismatch`] if its payload is not the
    /// registered type. State is untouched on error.
    fn apply(&mut self, event: &Event) -> Result<()> {
        let expected = self.version() + 1;
        if event.sequence() != expected {
            return Err(Error::SequenceGap {
                expected,
                found: event.sequence(),
            });
        }

        let applier = self.base().applier(event.name())?;
        applier(self, event)?;
        self.base_mut().set_version(event.sequence());
        Ok(())
    }

    /// Records a new event: applies it immediately and buffers it for the
    /// next save.
    ///
    /// # Errors
    ///
    /// Same as [`Aggregate::apply`]; nothing is buffered on error.
    fn next<T>(&mut self, event_type: &str, payload: T) -> Result<()>
    where
        T: Any + Send + Sync,
    {
        let event = Event::new(
            self.base().stream().clone(),
            self.version() + 1,
            event_type,
            payload,
        );
        self.apply(&event)?;
        self.base_mut().changes.push(event);
        Ok(())
    }
}
