//! Event store contract and in-memory reference implementation
//!
//! The store is append-only and stream-ordered. Every stream belongs to one
//! aggregate instance; sequences are 1-based and contiguous. Appends carry
//! the version the writer last observed, and the store is the single
//! authority that resolves concurrent writers by rejecting stale appends.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::message::EventMessage;

/// Failures surfaced by an event store implementation.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream advanced past the version the writer observed. The
    /// caller's view is stale; only a full re-dispatch can help.
    #[error("concurrency conflict on stream {stream}: expected version {expected}, current version {current}")]
    ConcurrencyConflict {
        /// Stream the stale append targeted.
        stream: String,
        /// Version the writer asserted.
        expected: u64,
        /// Version the stream actually has.
        current: u64,
    },

    /// Events could not be encoded or decoded by the backend.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The backend failed to read or write.
    #[error("storage error: {0}")]
    StorageError(String),
}

impl EventStoreError {
    /// True for the optimistic-concurrency rejection.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// One event as persisted: the message plus its stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Stream the event belongs to.
    pub stream_id: String,
    /// 1-based, contiguous position within the stream.
    pub sequence: u64,
    /// The recorded event message, causation metadata included.
    pub event: EventMessage,
    /// When the store accepted the event.
    pub stored_at: DateTime<Utc>,
}

/// Ordered delivery of stored events; lets rehydration fold without
/// materializing a whole history.
pub type EventStream = BoxStream<'static, Result<StoredEvent, EventStoreError>>;

/// Append-only event stream storage.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Deliver the events of `stream_id` with sequence strictly greater
    /// than `from_version`, in sequence order. Unknown streams deliver
    /// nothing.
    async fn load_stream_from(
        &self,
        stream_id: &str,
        from_version: u64,
    ) -> Result<EventStream, EventStoreError>;

    /// Append `events` to `stream_id`, asserting the stream currently sits
    /// at `expected_version`. A mismatch returns
    /// [`EventStoreError::ConcurrencyConflict`] and appends nothing.
    async fn append_to(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<EventMessage>,
    ) -> Result<(), EventStoreError>;
}

/// In-memory event store for tests, demos, and as the reference for what
/// the contract demands of real backends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<String, Vec<StoredEvent>>>>,
}

impl InMemoryEventStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one stream's history, sequences assigned from
    /// 1. Mirrors "given these facts already happened" test setups.
    pub fn with_history(stream_id: impl Into<String>, events: Vec<EventMessage>) -> Self {
        let stream_id = stream_id.into();
        let stored = seal(&stream_id, 0, events);
        let mut streams = HashMap::new();
        streams.insert(stream_id, stored);
        Self {
            streams: Arc::new(RwLock::new(streams)),
        }
    }

    /// Current version (= number of events) of a stream; 0 when absent.
    pub async fn stream_version(&self, stream_id: &str) -> u64 {
        self.streams
            .read()
            .await
            .get(stream_id)
            .map(|stream| stream.len() as u64)
            .unwrap_or(0)
    }

    /// Snapshot of a stream's full contents, for assertions.
    pub async fn recorded_events(&self, stream_id: &str) -> Vec<StoredEvent> {
        self.streams
            .read()
            .await
            .get(stream_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load_stream_from(
        &self,
        stream_id: &str,
        from_version: u64,
    ) -> Result<EventStream, EventStoreError> {
        let streams = self.streams.read().await;
        let events: Vec<Result<StoredEvent, EventStoreError>> = streams
            .get(stream_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|stored| stored.sequence > from_version)
                    .cloned()
                    .map(Ok)
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            stream = %stream_id,
            from_version,
            count = events.len(),
            "loaded event stream"
        );
        Ok(stream::iter(events).boxed())
    }

    async fn append_to(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<EventMessage>,
    ) -> Result<(), EventStoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut streams = self.streams.write().await;
        let current = streams
            .get(stream_id)
            .map(|stream| stream.len() as u64)
            .unwrap_or(0);
        if current != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                stream: stream_id.to_string(),
                expected: expected_version,
                current,
            });
        }

        let appended = events.len();
        let stream = streams.entry(stream_id.to_string()).or_default();
        stream.extend(seal(stream_id, current, events));

        debug!(
            stream = %stream_id,
            appended,
            version = stream.len(),
            "appended events"
        );
        Ok(())
    }
}

fn seal(stream_id: &str, base_version: u64, events: Vec<EventMessage>) -> Vec<StoredEvent> {
    events
        .into_iter()
        .enumerate()
        .map(|(offset, event)| StoredEvent {
            stream_id: stream_id.to_string(),
            sequence: base_version + offset as u64 + 1,
            event,
            stored_at: Utc::now(),
        })
        .collect()
}
