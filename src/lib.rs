//! # Commandeer
//!
//! Command processing runtime for event-sourced aggregates.
//!
//! This crate provides the building blocks for turning commands into
//! persisted domain events:
//! - **Messages**: commands in, events out; name, uuid, payload, metadata
//! - **Command Router**: immutable name-to-handler table with explicit
//!   fall-through for commands nobody routes
//! - **Command Processor**: per-command unit that invokes the domain
//!   function and pairs its output positionally with declared event names
//! - **Aggregates**: state folded from ordered event history, never stored
//!   directly
//! - **Repository**: optimistic-concurrency append plus snapshot-assisted
//!   replay over pluggable stores
//! - **Schemas**: declared payload shapes enforced at the processing
//!   boundary
//!
//! ## Design Principles
//!
//! 1. **Events Are The Record**: aggregate state is a pure fold over its
//!    event history; replaying the same history always produces the same
//!    state
//! 2. **Plain Domain Functions**: domain logic yields payloads and knows
//!    nothing about messaging; processors name, validate, and stamp them
//! 3. **Causation Everywhere**: every produced event carries the uuid and
//!    name of the command that caused it
//! 4. **No Locks**: concurrent writers contend on expected stream versions
//!    and the loser retries with fresh state
//! 5. **Snapshots Accelerate, History Decides**: a snapshot shortens
//!    replay but never overrides the events behind it
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use commandeer::infrastructure::InMemoryEventStore;
//! use commandeer::{
//!     AggregateType, CommandDescriptor, CommandMessage, CommandRouter, DomainFunction, Payload,
//! };
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct UserState {
//!     id: String,
//!     username: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! #[serde(tag = "event", content = "payload")]
//! enum UserEvent {
//!     UserWasRegistered { id: String, username: String },
//! }
//!
//! struct User;
//!
//! impl AggregateType for User {
//!     const NAME: &'static str = "User";
//!     const IDENTIFIER: &'static str = "id";
//!     type State = UserState;
//!     type Event = UserEvent;
//!
//!     fn apply(_state: Option<UserState>, event: &UserEvent) -> UserState {
//!         match event {
//!             UserEvent::UserWasRegistered { id, username } => UserState {
//!                 id: id.clone(),
//!                 username: username.clone(),
//!             },
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryEventStore::new());
//! let register = DomainFunction::<User>::create(|command| Ok(vec![command.payload().clone()]));
//! let router = CommandRouter::builder(store)
//!     .route(CommandDescriptor::new("RegisterUser", register).records("UserWasRegistered"))
//!     .build()?;
//!
//! let command = CommandMessage::new(
//!     "RegisterUser",
//!     Payload::from([
//!         ("id".to_string(), json!("u1")),
//!         ("username".to_string(), json!("Alex")),
//!     ]),
//! );
//! let outcome = router.dispatch(&command).await?;
//! assert!(outcome.is_handled());
//! # Ok(())
//! # })
//! # }
//! ```

#![warn(missing_docs)]

mod aggregate;
mod message;
mod processor;
mod router;
mod schema;

pub mod infrastructure;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export core types
pub use aggregate::{AggregateRoot, AggregateType, ApplyError, SnapshotPolicy};
pub use message::{
    causation_metadata, CommandMessage, DefaultMessageFactory, EventMessage, MessageFactory,
    Metadata, Payload, CAUSATION_ID, CAUSATION_NAME,
};
pub use processor::{
    CommandDescriptor, CommandError, CommandProcessor, DomainError, DomainFunction,
};
pub use router::{
    CommandHandler, CommandRouter, CommandRouterBuilder, ConfigurationError, DispatchOutcome,
};
pub use schema::{FieldType, PayloadSchema, SchemaError};
