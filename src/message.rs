// Copyright 2025 Cowboy AI, LLC.

//! Command and event messages
//!
//! Commands and events share one wire shape: a name, a unique identifier,
//! an ordered payload of named fields, and a metadata map. They are kept as
//! two distinct types so the type system separates "a request to change
//! something" from "a fact that happened". Events additionally carry
//! causation metadata pointing back at the command that produced them.
//!
//! Field order in payloads is significant to callers that serialize
//! messages, so both payload and metadata use insertion-ordered maps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Ordered mapping of field name to JSON value carried by a message.
pub type Payload = IndexMap<String, Value>;

/// Ordered mapping of metadata key to JSON value attached to a message.
pub type Metadata = IndexMap<String, Value>;

/// Metadata key holding the uuid of the command that caused an event.
pub const CAUSATION_ID: &str = "_causation_id";

/// Metadata key holding the name of the command that caused an event.
pub const CAUSATION_NAME: &str = "_causation_name";

/// A named request to change exactly one aggregate.
///
/// Immutable once constructed; the processor reads it, never rewrites it.
///
/// # Examples
///
/// ```rust
/// use commandeer::{CommandMessage, Payload};
/// use serde_json::json;
///
/// let command = CommandMessage::new(
///     "RegisterUser",
///     Payload::from([
///         ("id".to_string(), json!("u1")),
///         ("username".to_string(), json!("Alex")),
///     ]),
/// );
///
/// assert_eq!(command.name(), "RegisterUser");
/// assert_eq!(command.payload()["username"], json!("Alex"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    name: String,
    uuid: Uuid,
    payload: Payload,
    metadata: Metadata,
}

impl CommandMessage {
    /// Create a command with a fresh uuid and empty metadata.
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self::from_parts(name, Uuid::new_v4(), payload, Metadata::new())
    }

    /// Create a command from all of its parts.
    pub fn from_parts(
        name: impl Into<String>,
        uuid: Uuid,
        payload: Payload,
        metadata: Metadata,
    ) -> Self {
        Self {
            name: name.into(),
            uuid,
            payload,
            metadata,
        }
    }

    /// Message name, e.g. `RegisterUser`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique message identifier.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Ordered payload fields.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Metadata attached by the sender.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// A named fact recorded against an aggregate's stream.
///
/// Structurally identical to [`CommandMessage`]; semantically it is already
/// true and can only be appended, never rejected. Events produced by the
/// processor carry [`CAUSATION_ID`] and [`CAUSATION_NAME`] metadata
/// referencing the triggering command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    name: String,
    uuid: Uuid,
    payload: Payload,
    metadata: Metadata,
}

impl EventMessage {
    /// Create an event with a fresh uuid and empty metadata.
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self::from_parts(name, Uuid::new_v4(), payload, Metadata::new())
    }

    /// Create an event from all of its parts.
    pub fn from_parts(
        name: impl Into<String>,
        uuid: Uuid,
        payload: Payload,
        metadata: Metadata,
    ) -> Self {
        Self {
            name: name.into(),
            uuid,
            payload,
            metadata,
        }
    }

    /// Event name, e.g. `UserWasRegistered`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique message identifier.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Ordered payload fields.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Metadata attached to the event.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Uuid of the command that caused this event, if stamped.
    pub fn causation_id(&self) -> Option<Uuid> {
        self.metadata
            .get(CAUSATION_ID)
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    /// Name of the command that caused this event, if stamped.
    pub fn causation_name(&self) -> Option<&str> {
        self.metadata.get(CAUSATION_NAME).and_then(Value::as_str)
    }
}

/// Build the causation metadata entries for events produced by `command`.
pub fn causation_metadata(command: &CommandMessage) -> Metadata {
    Metadata::from([
        (
            CAUSATION_ID.to_string(),
            Value::String(command.uuid().to_string()),
        ),
        (
            CAUSATION_NAME.to_string(),
            Value::String(command.name().to_string()),
        ),
    ])
}

/// Message-construction collaborator.
///
/// The processor builds every output event through a factory so hosts can
/// control identifier generation or stamp additional metadata without
/// touching the pipeline itself.
pub trait MessageFactory: Send + Sync {
    /// Build a command message from its parts.
    fn command(&self, name: &str, payload: Payload, metadata: Metadata) -> CommandMessage;

    /// Build an event message from its parts.
    fn event(&self, name: &str, payload: Payload, metadata: Metadata) -> EventMessage;
}

/// Factory assigning a fresh v4 uuid to every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageFactory;

impl MessageFactory for DefaultMessageFactory {
    fn command(&self, name: &str, payload: Payload, metadata: Metadata) -> CommandMessage {
        CommandMessage::from_parts(name, Uuid::new_v4(), payload, metadata)
    }

    fn event(&self, name: &str, payload: Payload, metadata: Metadata) -> EventMessage {
        EventMessage::from_parts(name, Uuid::new_v4(), payload, metadata)
    }
}
