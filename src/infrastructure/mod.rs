// Copyright 2025 Cowboy AI, LLC.

//! Infrastructure layer
//!
//! This module contains the persistence concerns behind the processing
//! pipeline:
//! - Event store contract and in-memory implementation
//! - Snapshot storage
//! - The aggregate repository tying the two together

pub mod event_store;
pub mod repository;
pub mod snapshot_store;

pub use event_store::{
    EventStore, EventStoreError, EventStream, InMemoryEventStore, StoredEvent,
};
pub use repository::{AggregateRepository, RepositoryError};
pub use snapshot_store::{
    AggregateSnapshot, InMemorySnapshotStore, SnapshotError, SnapshotStore,
};
