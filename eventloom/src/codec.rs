//! The codec registry maps event type names to payload types.
//!
//! A [`Codec`] is built once at startup, then shared read-only (usually
//! behind an `Arc`) by every repository that needs it.
use std::{any::Any, collections::HashMap, fmt, marker::PhantomData, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Event, Payload, RecordedEvent, Result};

/// Encodes and decodes the payload of one registered event type.
trait PayloadCodec: Send + Sync {
    fn encode(&self, event_type: &str, payload: &(dyn Any + Send + Sync)) -> Result<Vec<u8>>;
    fn decode(&self, event_type: &str, data: &[u8]) -> Result<Payload>;
}

struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> PayloadCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn encode(&self, event_type: &str, payload: &(dyn Any + Send + Sync)) -> Result<Vec<u8>> {
        let payload = payload
            .downcast_ref::<T>()
            .ok_or_else(|| Error::PayloadMismatch {
                event_type: event_type.to_owned(),
                expected: std::any::type_name::<T>(),
            })?;
        serde_json::to_vec(payload).map_err(|e| Error::Encode {
            event_type: event_type.to_owned(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, event_type: &str, data: &[u8]) -> Result<Payload> {
        let payload: T = serde_json::from_slice(data).map_err(|e| Error::Decode {
            event_type: event_type.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(payload))
    }
}

/// Registry of event type names and the payload types they carry.
#[derive(Default)]
pub struct Codec {
    codecs: HashMap<String, Box<dyn PayloadCodec>>,
}

impl Codec {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that events of `event_type` carry payloads of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRegistration`] if `event_type` is already
    /// registered.
    pub fn register<T>(&mut self, event_type: impl Into<String>) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        if self.codecs.contains_key(&event_type) {
            return Err(Error::DuplicateRegistration(event_type));
        }
        self.codecs
            .insert(event_type, Box::new(JsonCodec::<T>(PhantomData)));
        Ok(())
    }

    /// Returns whether `event_type` has been registered.
    pub fn is_registered(&self, event_type: &str) -> bool {
        self.codecs.contains_key(event_type)
    }

    /// Returns all registered event type names.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    /// Encodes a payload of `event_type` to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnregisteredEventType`] for unknown types,
    /// [`Error::PayloadMismatch`] if `payload` is not the registered type and
    /// [`Error::Encode`] if serialization fails.
    pub fn encode(&self, event_type: &str, payload: &(dyn Any + Send + Sync)) -> Result<Vec<u8>> {
        self.lookup(event_type)?.encode(event_type, payload)
    }

    /// Decodes bytes into a payload of the type registered for `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnregisteredEventType`] for unknown types and
    /// [`Error::Decode`] for malformed bytes.
    pub fn decode(&self, event_type: &str, data: &[u8]) -> Result<Payload> {
        self.lookup(event_type)?.decode(event_type, data)
    }

    /// Encodes an event into the form persisted by an event store.
    pub fn encode_event(&self, event: &Event) -> Result<RecordedEvent> {
        let data = self.encode(event.name(), &**event.payload())?;
        Ok(RecordedEvent::new(
            event.id(),
            event.stream().clone(),
            event.sequence(),
            event.name(),
            data,
            event.time(),
        ))
    }

    /// Decodes a persisted event.
    pub fn decode_event(&self, record: RecordedEvent) -> Result<Event> {
        let payload = self.decode(&record.event_type, &record.data)?;
        Ok(Event {
            id: record.id,
            stream: record.stream,
            sequence: record.sequence,
            name: record.event_type,
            payload,
            time: record.time,
        })
    }

    fn lookup(&self, event_type: &str) -> Result<&dyn PayloadCodec> {
        self.codecs
            .get(event_type)
            .map(|codec| &**codec)
            .ok_or_else(|| Error::UnregisteredEventType(event_type.to_owned()))
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<_> = self.event_types().collect();
        event_types.sort();
        f.debug_struct("Codec")
            .field("event_types", &event_types)
            .finish()
    }
}
