// Copyright 2025 Cowboy AI, LLC.

//! Snapshot store for aggregate state persistence
//!
//! Snapshots shortcut full-history replay: a cached copy of an aggregate's
//! folded state at some version. Losing one costs replay time, never
//! correctness, which is why the repository treats every snapshot operation
//! as best-effort.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Error from the underlying storage system.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Error encoding or decoding snapshot state.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// A cached, versioned copy of an aggregate's folded state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Aggregate type the snapshot belongs to.
    pub aggregate_type: String,
    /// Aggregate instance the snapshot belongs to.
    pub aggregate_id: String,
    /// Stream version the state was folded up to.
    pub version: u64,
    /// The folded state, serialized as JSON.
    pub state: serde_json::Value,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl AggregateSnapshot {
    /// Snapshot of `state` as of `version`, stamped with the current time.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        version: u64,
        state: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            version,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Storage for aggregate snapshots, keyed by type and identifier.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Latest snapshot for the aggregate, if any exists.
    async fn get(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError>;

    /// Store a snapshot, replacing any previous one for the same aggregate.
    async fn put(&self, snapshot: AggregateSnapshot) -> Result<(), SnapshotError>;
}

/// In-memory snapshot store for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<String, AggregateSnapshot>>>,
}

impl InMemorySnapshotStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the stored snapshot for an aggregate, for assertions.
    pub async fn latest_version(&self, aggregate_type: &str, aggregate_id: &str) -> Option<u64> {
        self.snapshots
            .read()
            .await
            .get(&snapshot_key(aggregate_type, aggregate_id))
            .map(|snapshot| snapshot.version)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError> {
        let snapshots = self.snapshots.read().await;
        let found = snapshots.get(&snapshot_key(aggregate_type, aggregate_id));

        debug!(
            aggregate_type = %aggregate_type,
            aggregate_id = %aggregate_id,
            version = found.map(|snapshot| snapshot.version),
            "snapshot lookup"
        );
        Ok(found.cloned())
    }

    async fn put(&self, snapshot: AggregateSnapshot) -> Result<(), SnapshotError> {
        let key = snapshot_key(&snapshot.aggregate_type, &snapshot.aggregate_id);

        debug!(
            aggregate_type = %snapshot.aggregate_type,
            aggregate_id = %snapshot.aggregate_id,
            version = snapshot.version,
            "storing snapshot"
        );
        self.snapshots.write().await.insert(key, snapshot);
        Ok(())
    }
}

fn snapshot_key(aggregate_type: &str, aggregate_id: &str) -> String {
    format!("{aggregate_type}.{aggregate_id}")
}
