//! An in-memory event store, useful for testing and development.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use futures::StreamExt;
use tracing::{debug, instrument};

use crate::{Error, EventStore, EventStream, RecordedEvent, Result, StreamId};

/// Thread-safe map keyed by stream id.
type StoreMap = DashMap<StreamId, Vec<RecordedEvent>>;

/// An in-memory, thread-safe event store.
///
/// Each append runs entirely under the map's entry lock for its stream, so the
/// version check and the write form one atomic step and different streams
/// never contend.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<StoreMap>,
}

impl InMemoryEventStore {
    /// Returns the current version of `stream`, 0 if it does not exist.
    pub fn version(&self, stream: &StreamId) -> i64 {
        self.streams
            .get(stream)
            .and_then(|events| events.last().map(RecordedEvent::sequence))
            .unwrap_or(0)
    }
}

/// Checks that `events` belong to `stream` and continue it from `version`.
fn validate(stream: &StreamId, version: i64, events: &[RecordedEvent]) -> Result<()> {
    for (expected, event) in (version + 1..).zip(events) {
        if event.stream() != stream {
            return Err(Error::Store(format!(
                "event {} belongs to {}, not {stream}",
                event.id(),
                event.stream()
            )));
        }
        if event.sequence() != expected {
            return Err(Error::SequenceGap {
                expected,
                found: event.sequence(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, events), fields(stream = %stream, count = events.len()))]
    async fn append(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: Vec<RecordedEvent>,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        match self.streams.entry(stream.clone()) {
            Entry::Occupied(mut entry) => {
                let current_version = entry.get().last().map_or(0, RecordedEvent::sequence);
                if current_version != expected_version {
                    return Err(Error::Conflict {
                        stream: stream.clone(),
                        expected: expected_version,
                        actual: current_version,
                    });
                }
                validate(stream, current_version, &events)?;
                entry.get_mut().extend(events);
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    return Err(Error::Conflict {
                        stream: stream.clone(),
                        expected: expected_version,
                        actual: 0,
                    });
                }
                validate(stream, 0, &events)?;
                entry.insert(events);
            }
        }

        debug!("events appended");
        Ok(())
    }

    #[instrument(skip(self), fields(stream = %stream))]
    async fn read(&self, stream: &StreamId, from_version: i64) -> Result<EventStream> {
        let events: Vec<RecordedEvent> = match self.streams.get(stream) {
            Some(events) => events
                .iter()
                .filter(|e| e.sequence() >= from_version)
                .cloned()
                .collect(),
            None if from_version <= 1 => Vec::new(),
            None => return Err(Error::StreamNotFound(stream.clone())),
        };

        Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed())
    }
}
