// Copyright 2025 Cowboy AI, LLC.

//! Command processors
//!
//! One [`CommandProcessor`] exists per command type. It owns the full
//! invocation path: check the command really is its own, resolve the target
//! aggregate identifier from the payload, load or create the aggregate,
//! call the domain function, pair each produced payload positionally with a
//! declared event name, stamp causation metadata, fold the events into the
//! aggregate, and hand the result to the repository.
//!
//! The domain function stays free of messaging concerns — it emits plain
//! payloads and the processor decides how they are named, validated, and
//! announced. That split keeps aggregate mutation confined to the
//! processor/aggregate pair.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::aggregate::{AggregateRoot, AggregateType, ApplyError};
use crate::infrastructure::event_store::EventStore;
use crate::infrastructure::repository::{AggregateRepository, RepositoryError};
use crate::infrastructure::snapshot_store::SnapshotStore;
use crate::message::{causation_metadata, CommandMessage, MessageFactory, Payload};
use crate::schema::{PayloadSchema, SchemaError};

/// Error type domain functions may fail with. Domains bring their own error
/// enums; the processor only needs to carry them.
pub type DomainError = Box<dyn std::error::Error + Send + Sync>;

/// The domain logic a command invokes. The variant records whether the
/// command creates a new aggregate or acts on an existing one.
///
/// Both forms return the ordered, finite list of event payloads that
/// happened as a result of the command; the processor pairs them with the
/// descriptor's declared event names by position.
pub enum DomainFunction<A: AggregateType> {
    /// The command brings the aggregate into existence; the function sees
    /// only the command.
    Create(Arc<dyn Fn(&CommandMessage) -> Result<Vec<Payload>, DomainError> + Send + Sync>),

    /// The command acts on an existing aggregate; the function sees the
    /// current state and the command.
    Transition(
        Arc<dyn Fn(&A::State, &CommandMessage) -> Result<Vec<Payload>, DomainError> + Send + Sync>,
    ),
}

impl<A: AggregateType> DomainFunction<A> {
    /// Wrap a creating domain function.
    pub fn create(
        function: impl Fn(&CommandMessage) -> Result<Vec<Payload>, DomainError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        DomainFunction::Create(Arc::new(function))
    }

    /// Wrap a transitioning domain function.
    pub fn transition(
        function: impl Fn(&A::State, &CommandMessage) -> Result<Vec<Payload>, DomainError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        DomainFunction::Transition(Arc::new(function))
    }

    /// True when the command creates its aggregate.
    pub fn creates_aggregate(&self) -> bool {
        matches!(self, DomainFunction::Create(_))
    }
}

impl<A: AggregateType> Clone for DomainFunction<A> {
    fn clone(&self) -> Self {
        match self {
            DomainFunction::Create(f) => DomainFunction::Create(f.clone()),
            DomainFunction::Transition(f) => DomainFunction::Transition(f.clone()),
        }
    }
}

impl<A: AggregateType> std::fmt::Debug for DomainFunction<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainFunction::Create(_) => f.write_str("DomainFunction::Create"),
            DomainFunction::Transition(_) => f.write_str("DomainFunction::Transition"),
        }
    }
}

/// Static configuration of one command type: its name, its domain function,
/// where the aggregate identifier lives, and the ordered event-recorder map
/// pairing yield positions with event names (plus optional payload schemas).
///
/// Assembled once at startup, immutable afterwards. Everything required is
/// required by construction; there is no half-built descriptor to misroute.
pub struct CommandDescriptor<A: AggregateType> {
    command_name: String,
    identifier_field: String,
    function: DomainFunction<A>,
    command_schema: Option<PayloadSchema>,
    event_recorder: IndexMap<String, Option<PayloadSchema>>,
}

impl<A: AggregateType> CommandDescriptor<A> {
    /// Describe a command by name and domain function. The identifier field
    /// defaults to [`AggregateType::IDENTIFIER`].
    pub fn new(command_name: impl Into<String>, function: DomainFunction<A>) -> Self {
        Self {
            command_name: command_name.into(),
            identifier_field: A::IDENTIFIER.to_string(),
            function,
            command_schema: None,
            event_recorder: IndexMap::new(),
        }
    }

    /// Override the payload field holding the aggregate identifier.
    pub fn identified_by(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    /// Validate incoming command payloads against a schema before any other
    /// work happens.
    pub fn with_command_schema(mut self, schema: PayloadSchema) -> Self {
        self.command_schema = Some(schema);
        self
    }

    /// Declare the next event name the domain function's output maps to.
    pub fn records(mut self, event_name: impl Into<String>) -> Self {
        self.event_recorder.insert(event_name.into(), None);
        self
    }

    /// Declare the next event name together with a schema its payload must
    /// satisfy.
    pub fn records_with_schema(
        mut self,
        event_name: impl Into<String>,
        schema: PayloadSchema,
    ) -> Self {
        self.event_recorder.insert(event_name.into(), Some(schema));
        self
    }

    /// The command name this descriptor routes.
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// The payload field holding the aggregate identifier.
    pub fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    /// True when the command creates its aggregate.
    pub fn creates_aggregate(&self) -> bool {
        self.function.creates_aggregate()
    }

    /// Declared event names in positional order.
    pub fn declared_events(&self) -> impl Iterator<Item = &str> {
        self.event_recorder.keys().map(String::as_str)
    }
}

impl<A: AggregateType> std::fmt::Debug for CommandDescriptor<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("command_name", &self.command_name)
            .field("aggregate_type", &A::NAME)
            .field("identifier_field", &self.identifier_field)
            .field("creates_aggregate", &self.creates_aggregate())
            .field("events", &self.event_recorder.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Everything that can go wrong while processing one command.
///
/// Every variant aborts the invocation before persistence; either all of a
/// command's events are appended together or none are.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The host dispatched a command this processor does not handle.
    #[error("processor for {expected} received command {received}")]
    WrongCommandRouted {
        /// Command name the processor is configured for.
        expected: String,
        /// Command name actually received.
        received: String,
    },

    /// The command payload violated its declared schema.
    #[error("command {command} payload failed validation: {source}")]
    Schema {
        /// Offending command name.
        command: String,
        /// The violation.
        #[source]
        source: SchemaError,
    },

    /// The configured identifier field is absent (or null).
    #[error("command {command} payload is missing aggregate identifier field `{field}`")]
    MissingAggregateIdentifier {
        /// Offending command name.
        command: String,
        /// The configured identifier field.
        field: String,
    },

    /// The identifier field holds a value no aggregate id can be coerced
    /// from (an array or object).
    #[error("command {command} field `{field}` cannot be coerced to an aggregate identifier")]
    InvalidAggregateIdentifier {
        /// Offending command name.
        command: String,
        /// The configured identifier field.
        field: String,
    },

    /// A non-creating command targeted an aggregate with no history.
    #[error("aggregate {aggregate_type} with id {aggregate_id} not found")]
    AggregateNotFound {
        /// Target aggregate type.
        aggregate_type: String,
        /// Identifier extracted from the command.
        aggregate_id: String,
    },

    /// The domain function refused the command.
    #[error("command {command} rejected: {source}")]
    Rejected {
        /// Rejected command name.
        command: String,
        /// The domain's own error.
        #[source]
        source: DomainError,
    },

    /// The domain function produced more events than the event-recorder map
    /// declares names for.
    #[error("command {command} produced an event at position {index} but only {declared} event name(s) are declared for aggregate {aggregate_type}")]
    TooFewEventsDeclared {
        /// Offending command name.
        command: String,
        /// Target aggregate type.
        aggregate_type: String,
        /// Number of declared event-recorder entries.
        declared: usize,
        /// First produced position with no declared name.
        index: usize,
    },

    /// A produced event payload violated the schema declared at its
    /// position.
    #[error("event {event} at position {index} produced by {command} failed validation: {source}")]
    EventSchema {
        /// Producing command name.
        command: String,
        /// Declared event name at the offending position.
        event: String,
        /// Offending position.
        index: usize,
        /// The violation.
        #[source]
        source: SchemaError,
    },

    /// A recorded event could not be folded into the aggregate.
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Loading or saving the aggregate failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CommandError {
    /// True when the underlying cause is an optimistic-concurrency
    /// rejection; the caller may re-dispatch the command for a fresh cycle.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            CommandError::Repository(err) if err.is_concurrency_conflict()
        )
    }

    /// True when the target aggregate does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommandError::AggregateNotFound { .. })
    }
}

/// Per-command-type processing unit.
///
/// Holds the descriptor plus the store collaborators; the repository is
/// initialized once on first use and reused for the processor's lifetime.
pub struct CommandProcessor<A: AggregateType> {
    descriptor: CommandDescriptor<A>,
    event_store: Arc<dyn EventStore>,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    factory: Arc<dyn MessageFactory>,
    repository: OnceLock<AggregateRepository<A>>,
}

impl<A: AggregateType> CommandProcessor<A> {
    /// Assemble a processor from its descriptor and collaborators.
    pub fn new(
        descriptor: CommandDescriptor<A>,
        event_store: Arc<dyn EventStore>,
        snapshot_store: Option<Arc<dyn SnapshotStore>>,
        factory: Arc<dyn MessageFactory>,
    ) -> Self {
        Self {
            descriptor,
            event_store,
            snapshot_store,
            factory,
            repository: OnceLock::new(),
        }
    }

    /// The command name this processor handles.
    pub fn command_name(&self) -> &str {
        self.descriptor.command_name()
    }

    /// Process one command to completion: validate, resolve, invoke the
    /// domain function, record the produced events, persist.
    pub async fn process(&self, command: &CommandMessage) -> Result<(), CommandError> {
        if command.name() != self.descriptor.command_name {
            return Err(CommandError::WrongCommandRouted {
                expected: self.descriptor.command_name.clone(),
                received: command.name().to_string(),
            });
        }

        if let Some(schema) = &self.descriptor.command_schema {
            schema
                .validate(command.payload())
                .map_err(|source| CommandError::Schema {
                    command: command.name().to_string(),
                    source,
                })?;
        }

        let aggregate_id = self.aggregate_id(command)?;
        debug!(
            command = command.name(),
            uuid = %command.uuid(),
            aggregate_type = A::NAME,
            aggregate_id = %aggregate_id,
            "processing command"
        );

        let mut aggregate = self.resolve_aggregate(command, &aggregate_id).await?;

        let payloads = self.invoke_domain_function(command, &aggregate, &aggregate_id)?;

        for (index, payload) in payloads.into_iter().enumerate() {
            let Some((event_name, schema)) = self.descriptor.event_recorder.get_index(index)
            else {
                return Err(CommandError::TooFewEventsDeclared {
                    command: command.name().to_string(),
                    aggregate_type: A::NAME.to_string(),
                    declared: self.descriptor.event_recorder.len(),
                    index,
                });
            };

            if let Some(schema) = schema {
                schema
                    .validate(&payload)
                    .map_err(|source| CommandError::EventSchema {
                        command: command.name().to_string(),
                        event: event_name.clone(),
                        index,
                        source,
                    })?;
            }

            let event = self
                .factory
                .event(event_name, payload, causation_metadata(command));
            aggregate.record_that(event)?;
        }

        debug!(
            command = command.name(),
            aggregate_type = A::NAME,
            aggregate_id = %aggregate_id,
            recorded = aggregate.recorded_events().len(),
            version = aggregate.version(),
            "recorded events"
        );

        self.repository().save(&mut aggregate).await?;
        Ok(())
    }

    async fn resolve_aggregate(
        &self,
        command: &CommandMessage,
        aggregate_id: &str,
    ) -> Result<AggregateRoot<A>, CommandError> {
        if self.descriptor.creates_aggregate() {
            return Ok(AggregateRoot::new(aggregate_id));
        }

        self.repository()
            .load(aggregate_id)
            .await?
            .ok_or_else(|| CommandError::AggregateNotFound {
                aggregate_type: A::NAME.to_string(),
                aggregate_id: aggregate_id.to_string(),
            })
            .map_err(|err| {
                debug!(command = command.name(), "target aggregate not found");
                err
            })
    }

    fn invoke_domain_function(
        &self,
        command: &CommandMessage,
        aggregate: &AggregateRoot<A>,
        aggregate_id: &str,
    ) -> Result<Vec<Payload>, CommandError> {
        let result = match &self.descriptor.function {
            DomainFunction::Create(function) => function(command),
            DomainFunction::Transition(function) => {
                // a loaded aggregate has folded at least one event
                let state = aggregate.state().ok_or_else(|| CommandError::AggregateNotFound {
                    aggregate_type: A::NAME.to_string(),
                    aggregate_id: aggregate_id.to_string(),
                })?;
                function(state, command)
            }
        };

        result.map_err(|source| CommandError::Rejected {
            command: command.name().to_string(),
            source,
        })
    }

    fn aggregate_id(&self, command: &CommandMessage) -> Result<String, CommandError> {
        let field = &self.descriptor.identifier_field;
        let value = command
            .payload()
            .get(field)
            .filter(|value| !value.is_null())
            .ok_or_else(|| CommandError::MissingAggregateIdentifier {
                command: command.name().to_string(),
                field: field.clone(),
            })?;

        match value {
            Value::String(id) => Ok(id.clone()),
            Value::Number(id) => Ok(id.to_string()),
            Value::Bool(id) => Ok(id.to_string()),
            _ => Err(CommandError::InvalidAggregateIdentifier {
                command: command.name().to_string(),
                field: field.clone(),
            }),
        }
    }

    fn repository(&self) -> &AggregateRepository<A> {
        self.repository.get_or_init(|| {
            let repository = AggregateRepository::new(self.event_store.clone());
            match &self.snapshot_store {
                Some(snapshots) => repository.with_snapshot_store(snapshots.clone()),
                None => repository,
            }
        })
    }
}

impl<A: AggregateType> std::fmt::Debug for CommandProcessor<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("descriptor", &self.descriptor)
            .field("snapshots", &self.snapshot_store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{change_username, register_user, registered, User};
    use crate::infrastructure::event_store::InMemoryEventStore;
    use crate::message::DefaultMessageFactory;
    use crate::schema::FieldType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn register_user_fn() -> DomainFunction<User> {
        DomainFunction::create(|command| Ok(vec![command.payload().clone()]))
    }

    fn change_username_fn() -> DomainFunction<User> {
        DomainFunction::transition(|_state, command| {
            Ok(vec![Payload::from([(
                "username".to_string(),
                command.payload()["username"].clone(),
            )])])
        })
    }

    fn processor(
        store: &InMemoryEventStore,
        descriptor: CommandDescriptor<User>,
    ) -> CommandProcessor<User> {
        CommandProcessor::new(
            descriptor,
            Arc::new(store.clone()),
            None,
            Arc::new(DefaultMessageFactory),
        )
    }

    fn register_descriptor() -> CommandDescriptor<User> {
        CommandDescriptor::new("RegisterUser", register_user_fn()).records("UserWasRegistered")
    }

    fn change_descriptor() -> CommandDescriptor<User> {
        CommandDescriptor::new("ChangeUsername", change_username_fn())
            .records("UsernameWasChanged")
    }

    #[tokio::test]
    async fn foreign_command_is_rejected_before_any_work() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, register_descriptor());

        let err = processor
            .process(&change_username("u1", "codeliner"))
            .await
            .unwrap_err();

        match err {
            CommandError::WrongCommandRouted { expected, received } => {
                assert_eq!(expected, "RegisterUser");
                assert_eq!(received, "ChangeUsername");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stream_version("User-u1").await, 0);
    }

    #[tokio::test]
    async fn absent_identifier_field_rejects_the_command() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, register_descriptor());
        let command = CommandMessage::new(
            "RegisterUser",
            Payload::from([("username".to_string(), json!("Alex"))]),
        );

        let err = processor.process(&command).await.unwrap_err();

        match err {
            CommandError::MissingAggregateIdentifier { command, field } => {
                assert_eq!(command, "RegisterUser");
                assert_eq!(field, "id");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stream_version("User-u1").await, 0);
    }

    #[tokio::test]
    async fn null_identifier_counts_as_missing() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, register_descriptor());
        let command = CommandMessage::new(
            "RegisterUser",
            Payload::from([
                ("id".to_string(), json!(null)),
                ("username".to_string(), json!("Alex")),
            ]),
        );

        let err = processor.process(&command).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::MissingAggregateIdentifier { .. }
        ));
    }

    #[tokio::test]
    async fn numeric_identifier_is_coerced_to_a_string() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, register_descriptor());
        let command = CommandMessage::new(
            "RegisterUser",
            Payload::from([
                ("id".to_string(), json!(42)),
                ("username".to_string(), json!("Alex")),
            ]),
        );

        processor.process(&command).await.unwrap();

        assert_eq!(store.stream_version("User-42").await, 1);
    }

    #[tokio::test]
    async fn boolean_identifier_is_coerced_to_a_string() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, register_descriptor());
        let command = CommandMessage::new(
            "RegisterUser",
            Payload::from([
                ("id".to_string(), json!(true)),
                ("username".to_string(), json!("Alex")),
            ]),
        );

        processor.process(&command).await.unwrap();

        assert_eq!(store.stream_version("User-true").await, 1);
    }

    #[tokio::test]
    async fn structured_identifier_values_are_invalid() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, register_descriptor());

        for id in [json!(["u1"]), json!({"value": "u1"})] {
            let command = CommandMessage::new(
                "RegisterUser",
                Payload::from([
                    ("id".to_string(), id),
                    ("username".to_string(), json!("Alex")),
                ]),
            );

            let err = processor.process(&command).await.unwrap_err();
            assert!(matches!(
                err,
                CommandError::InvalidAggregateIdentifier { .. }
            ));
        }
    }

    #[tokio::test]
    async fn produced_events_carry_causation_in_yield_order() {
        let store = InMemoryEventStore::new();
        let function: DomainFunction<User> = DomainFunction::create(|command| {
            Ok(vec![
                command.payload().clone(),
                Payload::from([("username".to_string(), json!("codeliner"))]),
            ])
        });
        let descriptor = CommandDescriptor::new("RegisterUser", function)
            .records("UserWasRegistered")
            .records("UsernameWasChanged");
        let processor = processor(&store, descriptor);
        let command = register_user("u1", "Alex");

        processor.process(&command).await.unwrap();

        let stored = store.recorded_events("User-u1").await;
        let names: Vec<&str> = stored.iter().map(|stored| stored.event.name()).collect();
        assert_eq!(names, vec!["UserWasRegistered", "UsernameWasChanged"]);
        for stored in &stored {
            assert_eq!(stored.event.causation_id(), Some(command.uuid()));
            assert_eq!(stored.event.causation_name(), Some("RegisterUser"));
        }
        // version equals the number of yielded events
        assert_eq!(store.stream_version("User-u1").await, 2);
    }

    #[tokio::test]
    async fn extra_yield_fails_at_the_first_undeclared_index() {
        let store = InMemoryEventStore::new();
        let function: DomainFunction<User> = DomainFunction::create(|command| {
            Ok(vec![
                command.payload().clone(),
                Payload::from([("username".to_string(), json!("again"))]),
            ])
        });
        let descriptor =
            CommandDescriptor::new("RegisterUser", function).records("UserWasRegistered");
        let processor = processor(&store, descriptor);

        let err = processor
            .process(&register_user("u1", "Alex"))
            .await
            .unwrap_err();

        match err {
            CommandError::TooFewEventsDeclared {
                command,
                aggregate_type,
                declared,
                index,
            } => {
                assert_eq!(command, "RegisterUser");
                assert_eq!(aggregate_type, "User");
                assert_eq!(declared, 1);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // nothing was appended, not even the declared first event
        assert_eq!(store.stream_version("User-u1").await, 0);
    }

    #[tokio::test]
    async fn transition_on_unknown_aggregate_is_not_found() {
        let store = InMemoryEventStore::new();
        let processor = processor(&store, change_descriptor());

        let err = processor
            .process(&change_username("ghost", "codeliner"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        match err {
            CommandError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } => {
                assert_eq!(aggregate_type, "User");
                assert_eq!(aggregate_id, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stream_version("User-ghost").await, 0);
    }

    #[tokio::test]
    async fn transition_loads_history_and_appends_behind_it() {
        let store = InMemoryEventStore::with_history("User-u1", vec![registered("Alex")]);
        let processor = processor(&store, change_descriptor());
        let command = change_username("u1", "codeliner");

        processor.process(&command).await.unwrap();

        let stored = store.recorded_events("User-u1").await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].event.name(), "UsernameWasChanged");
        assert_eq!(stored[1].sequence, 2);
        assert_eq!(stored[1].event.causation_id(), Some(command.uuid()));
        assert_eq!(stored[1].event.payload()["username"], json!("codeliner"));
    }

    #[tokio::test]
    async fn domain_rejection_carries_the_domain_error() {
        let store = InMemoryEventStore::with_history("User-u1", vec![registered("Alex")]);
        let function: DomainFunction<User> =
            DomainFunction::transition(|_state, _command| Err("username already taken".into()));
        let descriptor =
            CommandDescriptor::new("ChangeUsername", function).records("UsernameWasChanged");
        let processor = processor(&store, descriptor);

        let err = processor
            .process(&change_username("u1", "codeliner"))
            .await
            .unwrap_err();

        match err {
            CommandError::Rejected { command, source } => {
                assert_eq!(command, "ChangeUsername");
                assert_eq!(source.to_string(), "username already taken");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stream_version("User-u1").await, 1);
    }

    #[tokio::test]
    async fn command_schema_rejects_malformed_payloads() {
        let store = InMemoryEventStore::new();
        let descriptor = register_descriptor().with_command_schema(
            PayloadSchema::new()
                .field("id", FieldType::String)
                .field("username", FieldType::String),
        );
        let processor = processor(&store, descriptor);
        let command = CommandMessage::new(
            "RegisterUser",
            Payload::from([
                ("id".to_string(), json!("u1")),
                ("username".to_string(), json!(42)),
            ]),
        );

        let err = processor.process(&command).await.unwrap_err();

        assert!(matches!(err, CommandError::Schema { .. }));
        assert_eq!(store.stream_version("User-u1").await, 0);
    }

    #[tokio::test]
    async fn positional_event_schema_guards_the_produced_payload() {
        let store = InMemoryEventStore::new();
        let function: DomainFunction<User> = DomainFunction::create(|_command| {
            // wrong shape on purpose: username must be a string
            Ok(vec![Payload::from([
                ("id".to_string(), json!("u1")),
                ("username".to_string(), json!(42)),
            ])])
        });
        let descriptor = CommandDescriptor::new("RegisterUser", function).records_with_schema(
            "UserWasRegistered",
            PayloadSchema::new()
                .field("id", FieldType::String)
                .field("username", FieldType::String),
        );
        let processor = processor(&store, descriptor);

        let err = processor
            .process(&register_user("u1", "Alex"))
            .await
            .unwrap_err();

        match err {
            CommandError::EventSchema { event, index, .. } => {
                assert_eq!(event, "UserWasRegistered");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stream_version("User-u1").await, 0);
    }

    #[tokio::test]
    async fn yielding_no_events_writes_nothing() {
        let store = InMemoryEventStore::new();
        let function: DomainFunction<User> = DomainFunction::create(|_command| Ok(Vec::new()));
        let descriptor =
            CommandDescriptor::new("RegisterUser", function).records("UserWasRegistered");
        let processor = processor(&store, descriptor);

        processor.process(&register_user("u1", "Alex")).await.unwrap();

        assert_eq!(store.stream_version("User-u1").await, 0);
        assert!(store.recorded_events("User-u1").await.is_empty());
    }
}
