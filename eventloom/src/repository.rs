//! Provides a generic repository for interacting with aggregates.
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    Aggregate, Codec, Error, EventStore, Result,
    snapshot::{SnapshotPolicy, SnapshotStore},
};

/// How many times [`Repository::use_aggregate`] re-fetches and re-runs its
/// closure after a concurrency conflict before giving up.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Defines the standard interface for a repository.
#[async_trait]
pub trait Repository<A: Aggregate>: Send + Sync {
    /// Rebuilds `aggregate` from its latest snapshot, if any, and the events
    /// after it.
    ///
    /// Events are replayed on top of the aggregate's current version, so a
    /// fresh instance is rebuilt from scratch. Fails with
    /// [`Error::NotFound`] if the aggregate has neither events nor a
    /// snapshot.
    async fn fetch(&self, aggregate: &mut A) -> Result<()>;

    /// Persists the aggregate's uncommitted events and clears them.
    ///
    /// Does nothing if there are no uncommitted events. Fails with
    /// [`Error::Conflict`] if another writer appended to the stream since the
    /// aggregate was fetched; the caller decides whether to retry.
    async fn save(&self, aggregate: &mut A) -> Result<()>;

    /// Fetches `aggregate`, runs `f` against it and saves the result.
    ///
    /// A missing aggregate is treated as new. On a concurrency conflict the
    /// in-memory aggregate is discarded, re-fetched and `f` runs again, up to a
    /// bounded number of retries. Errors returned by `f` abort the operation
    /// without saving.
    async fn use_aggregate<F, E>(&self, aggregate: &mut A, f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut A) -> std::result::Result<(), E> + Send,
        E: From<Error> + Send;

    /// Loads an aggregate instance from the store.
    async fn load(&self, id: Uuid) -> Result<A> {
        let mut aggregate = A::new(id)?;
        self.fetch(&mut aggregate).await?;
        Ok(aggregate)
    }
}

struct Snapshots<A: Aggregate> {
    store: Arc<dyn SnapshotStore>,
    policy: Box<dyn SnapshotPolicy<A>>,
}

/// A generic, high-level repository for loading and saving aggregates.
///
/// This repository orchestrates an [`EventStore`], the [`Codec`] used to
/// encode payloads and an optional [`SnapshotStore`].
pub struct GenericRepository<A, S>
where
    A: Aggregate,
    S: EventStore,
{
    store: Arc<S>,
    codec: Arc<Codec>,
    snapshots: Option<Snapshots<A>>,
    max_retries: usize,
}

impl<A, S> GenericRepository<A, S>
where
    A: Aggregate,
    S: EventStore,
{
    /// Creates a new `GenericRepository` without snapshots.
    pub fn new(store: Arc<S>, codec: Arc<Codec>) -> Self {
        Self {
            store,
            codec,
            snapshots: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Enables snapshots: after each successful save `policy` decides
    /// whether the aggregate's state is written to `store`.
    pub fn with_snapshots<SS, P>(mut self, store: Arc<SS>, policy: P) -> Self
    where
        SS: SnapshotStore + 'static,
        P: SnapshotPolicy<A> + 'static,
    {
        self.snapshots = Some(Snapshots {
            store,
            policy: Box::new(policy),
        });
        self
    }

    /// Sets how many times [`Repository::use_aggregate`] retries after a
    /// concurrency conflict.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the retry bound of [`Repository::use_aggregate`].
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Checks that every event type `aggregate` can apply has a codec, so a
    /// missing registration surfaces at startup instead of on first save.
    ///
    /// Construction does not run this check; call it once per aggregate type
    /// after building the repository.
    pub fn verify(&self, aggregate: &A) -> Result<()> {
        match aggregate
            .base()
            .event_types()
            .find(|event_type| !self.codec.is_registered(event_type))
        {
            Some(event_type) => Err(Error::UnregisteredEventType(event_type.to_owned())),
            None => Ok(()),
        }
    }

    /// Restores `aggregate` from its snapshot, if one exists and can be
    /// used. Any snapshot problem leaves the aggregate fresh for full replay.
    async fn hydrate_from_snapshot(&self, aggregate: &mut A) -> Result<()> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(());
        };

        let stored = match snapshots.store.load(aggregate.base().stream()).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(()),
            Err(error) => {
                warn!(%error, "snapshot load failed, replaying full stream");
                return Ok(());
            }
        };

        if let Err(error) = aggregate.restore_snapshot(stored.state()) {
            warn!(%error, "snapshot restore failed, replaying full stream");
            *aggregate = A::new(aggregate.id())?;
            return Ok(());
        }
        aggregate.base_mut().set_version(stored.version());
        debug!(version = stored.version(), "aggregate restored from snapshot");
        Ok(())
    }

    async fn write_snapshot(&self, snapshots: &Snapshots<A>, aggregate: &A) {
        let state = match aggregate.snapshot_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("aggregate does not support snapshots");
                return;
            }
            Err(error) => {
                warn!(%error, "failed to serialise snapshot");
                return;
            }
        };

        let version = aggregate.version();
        match snapshots
            .store
            .save(aggregate.base().stream(), version, state)
            .await
        {
            Ok(()) => debug!(version, "snapshot written"),
            Err(error) => warn!(%error, version, "failed to write snapshot"),
        }
    }
}

#[async_trait]
impl<A, S> Repository<A> for GenericRepository<A, S>
where
    A: Aggregate,
    S: EventStore + 'static,
{
    #[instrument(skip_all, fields(stream = %aggregate.base().stream()))]
    async fn fetch(&self, aggregate: &mut A) -> Result<()> {
        if aggregate.version() == 0 {
            self.hydrate_from_snapshot(aggregate).await?;
        }

        let stream = aggregate.base().stream().clone();
        let mut events = self.store.read(&stream, aggregate.version() + 1).await?;

        let mut replayed = 0_usize;
        while let Some(record) = events.try_next().await? {
            let event = self.codec.decode_event(record)?;
            aggregate.apply(&event)?;
            replayed += 1;
        }

        // Guard against loading a non-existing aggregate.
        if aggregate.version() == 0 {
            return Err(Error::NotFound(stream));
        }

        debug!(replayed, version = aggregate.version(), "aggregate fetched");
        Ok(())
    }

    #[instrument(skip_all, fields(stream = %aggregate.base().stream()))]
    async fn save(&self, aggregate: &mut A) -> Result<()> {
        let changes = aggregate.changes();
        if changes.is_empty() {
            return Ok(());
        }

        let count = changes.len();
        let expected_version = aggregate.version() - count as i64;
        let records = changes
            .iter()
            .map(|event| self.codec.encode_event(event))
            .collect::<Result<Vec<_>>>()?;

        let stream = aggregate.base().stream().clone();
        self.store.append(&stream, expected_version, records).await?;

        // The policy sees the batch that was just written.
        let snapshots = self
            .snapshots
            .as_ref()
            .filter(|snapshots| snapshots.policy.should_snapshot(&*aggregate));
        aggregate.base_mut().commit();
        debug!(count, version = aggregate.version(), "events saved");

        if let Some(snapshots) = snapshots {
            self.write_snapshot(snapshots, aggregate).await;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(stream = %aggregate.base().stream()))]
    async fn use_aggregate<F, E>(&self, aggregate: &mut A, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut A) -> std::result::Result<(), E> + Send,
        E: From<Error> + Send,
    {
        let mut retries = 0;
        loop {
            match self.fetch(aggregate).await {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(error) => return Err(error.into()),
            }

            f(aggregate)?;

            match self.save(aggregate).await {
                Ok(()) => return Ok(()),
                Err(Error::Conflict {
                    expected, actual, ..
                }) if retries < self.max_retries => {
                    retries += 1;
                    warn!(retries, expected, actual, "concurrency conflict, retrying");
                    *aggregate = A::new(aggregate.id())?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

#[async_trait]
impl<A, R> Repository<A> for Arc<R>
where
    A: Aggregate,
    R: Repository<A> + Send + Sync,
{
    async fn fetch(&self, aggregate: &mut A) -> Result<()> {
        (**self).fetch(aggregate).await
    }

    async fn save(&self, aggregate: &mut A) -> Result<()> {
        (**self).save(aggregate).await
    }

    async fn use_aggregate<F, E>(&self, aggregate: &mut A, f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut A) -> std::result::Result<(), E> + Send,
        E: From<Error> + Send,
    {
        (**self).use_aggregate(aggregate, f).await
    }
}
