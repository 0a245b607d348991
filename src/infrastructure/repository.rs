//! Event stream repository
//!
//! Bridges [`AggregateRoot`] instances and the durable stores: loads by
//! folding a stream (optionally shortcut by a snapshot), saves by appending
//! the recorded events under an expected-version assertion. The repository
//! holds no locks — the store's optimistic-concurrency check is the only
//! arbiter between concurrent writers, and a conflict passes through here
//! untouched.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::TryStreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateRoot, AggregateType, ApplyError};
use crate::infrastructure::event_store::{EventStore, EventStoreError};
use crate::infrastructure::snapshot_store::{AggregateSnapshot, SnapshotStore};

/// Failures surfaced while loading or saving an aggregate.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The event store refused a read or write. Concurrency conflicts
    /// travel through this variant unmodified.
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// A stored event no longer fits the aggregate's event enum. The
    /// stream and the aggregate definition disagree; replay cannot
    /// continue.
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl RepositoryError {
    /// True when the underlying cause is an optimistic-concurrency
    /// rejection.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::Store(err) if err.is_concurrency_conflict()
        )
    }
}

/// Loads and saves one aggregate type against an event store, with optional
/// snapshot acceleration.
pub struct AggregateRepository<A: AggregateType> {
    event_store: Arc<dyn EventStore>,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    marker: PhantomData<A>,
}

impl<A: AggregateType> AggregateRepository<A> {
    /// Repository without snapshot support; every load replays the full
    /// stream.
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            event_store,
            snapshot_store: None,
            marker: PhantomData,
        }
    }

    /// Attach a snapshot store. Whether snapshots are written is still up
    /// to [`AggregateType::snapshot_policy`].
    pub fn with_snapshot_store(mut self, snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(snapshot_store);
        self
    }

    /// Stream identifier for an aggregate instance of this type.
    pub fn stream_id(aggregate_id: &str) -> String {
        format!("{}-{}", A::NAME, aggregate_id)
    }

    /// Reconstitute an aggregate from its snapshot and/or stream.
    ///
    /// Returns `Ok(None)` when the stream has zero events and no snapshot
    /// exists. Snapshot lookups are best-effort: a failed or undecodable
    /// snapshot degrades to a full replay instead of failing the load.
    pub async fn load(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRoot<A>>, RepositoryError> {
        let stream_id = Self::stream_id(aggregate_id);

        let (mut root, from_version, snapshotted) = match self.usable_snapshot(aggregate_id).await {
            Some((version, state)) => (
                AggregateRoot::from_snapshot(aggregate_id, version, state),
                version,
                true,
            ),
            None => (AggregateRoot::new(aggregate_id), 0, false),
        };

        let mut stream = self
            .event_store
            .load_stream_from(&stream_id, from_version)
            .await?;
        let mut replayed = 0u64;
        while let Some(stored) = stream.try_next().await? {
            root.replay(&stored.event)?;
            replayed += 1;
        }

        if !snapshotted && replayed == 0 {
            return Ok(None);
        }

        debug!(
            aggregate_type = A::NAME,
            aggregate_id,
            version = root.version(),
            replayed,
            snapshotted,
            "loaded aggregate"
        );
        Ok(Some(root))
    }

    /// Persist the aggregate's recorded events.
    ///
    /// Draining nothing is a no-op. Otherwise the events are appended with
    /// an expected version equal to the aggregate's version before they
    /// were folded in; a concurrent writer that got there first surfaces as
    /// a concurrency conflict. A due snapshot is then written best-effort.
    pub async fn save(&self, aggregate: &mut AggregateRoot<A>) -> Result<(), RepositoryError> {
        let events = aggregate.pop_recorded_events();
        if events.is_empty() {
            return Ok(());
        }

        let version = aggregate.version();
        let previous_version = version - events.len() as u64;
        let stream_id = Self::stream_id(aggregate.id());

        self.event_store
            .append_to(&stream_id, previous_version, events)
            .await?;
        debug!(
            aggregate_type = A::NAME,
            aggregate_id = aggregate.id(),
            previous_version,
            version,
            "appended recorded events"
        );

        self.write_due_snapshot(aggregate, previous_version).await;
        Ok(())
    }

    async fn usable_snapshot(&self, aggregate_id: &str) -> Option<(u64, A::State)> {
        let store = self.snapshot_store.as_ref()?;

        let snapshot = match store.get(A::NAME, aggregate_id).await {
            Ok(found) => found?,
            Err(err) => {
                warn!(
                    aggregate_type = A::NAME,
                    aggregate_id,
                    error = %err,
                    "snapshot lookup failed, replaying full stream"
                );
                return None;
            }
        };

        match serde_json::from_value(snapshot.state) {
            Ok(state) => Some((snapshot.version, state)),
            Err(err) => {
                warn!(
                    aggregate_type = A::NAME,
                    aggregate_id,
                    version = snapshot.version,
                    error = %err,
                    "snapshot state undecodable, replaying full stream"
                );
                None
            }
        }
    }

    async fn write_due_snapshot(&self, aggregate: &AggregateRoot<A>, previous_version: u64) {
        let Some(store) = self.snapshot_store.as_ref() else {
            return;
        };
        if !A::snapshot_policy().is_due(previous_version, aggregate.version()) {
            return;
        }
        let Some(state) = aggregate.state() else {
            return;
        };

        let state = match serde_json::to_value(state) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    aggregate_type = A::NAME,
                    aggregate_id = aggregate.id(),
                    error = %err,
                    "aggregate state unserializable, skipping snapshot"
                );
                return;
            }
        };

        let snapshot =
            AggregateSnapshot::new(A::NAME, aggregate.id(), aggregate.version(), state);
        match store.put(snapshot).await {
            Ok(()) => info!(
                aggregate_type = A::NAME,
                aggregate_id = aggregate.id(),
                version = aggregate.version(),
                "snapshot stored"
            ),
            Err(err) => warn!(
                aggregate_type = A::NAME,
                aggregate_id = aggregate.id(),
                version = aggregate.version(),
                error = %err,
                "snapshot write failed, command unaffected"
            ),
        }
    }
}
