// Copyright 2025 Cowboy AI, LLC.

//! Command routing
//!
//! The [`CommandRouter`] owns an immutable routing table from command name
//! to handler, assembled once at startup through [`CommandRouterBuilder`].
//! Dispatch resolves the handler for a command's name and runs it; a
//! command nobody routes is reported as [`DispatchOutcome::Unrouted`] so
//! the host can fall through to its own handling.
//!
//! Most routes are [`CommandProcessor`]s built from descriptors, but any
//! [`CommandHandler`] implementation can participate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::aggregate::AggregateType;
use crate::infrastructure::event_store::EventStore;
use crate::infrastructure::snapshot_store::SnapshotStore;
use crate::message::{CommandMessage, DefaultMessageFactory, MessageFactory};
use crate::processor::{CommandDescriptor, CommandError, CommandProcessor};

/// A unit the router can dispatch a command to.
///
/// Implemented by [`CommandProcessor`]; hosts may register their own
/// implementations for commands that bypass the aggregate pipeline.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// The single command name this handler answers for.
    fn command_name(&self) -> &str;

    /// Handle one command to completion.
    async fn handle(&self, command: &CommandMessage) -> Result<(), CommandError>;
}

#[async_trait]
impl<A: AggregateType> CommandHandler for CommandProcessor<A> {
    fn command_name(&self) -> &str {
        CommandProcessor::command_name(self)
    }

    async fn handle(&self, command: &CommandMessage) -> Result<(), CommandError> {
        self.process(command).await
    }
}

/// What became of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler was resolved and ran successfully.
    Handled,
    /// No handler is routed for the command's name; nothing happened.
    Unrouted,
}

impl DispatchOutcome {
    /// True when a handler ran.
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }
}

/// Routing table assembly errors, surfaced at startup rather than at
/// dispatch time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two routes claim the same command name.
    #[error("command {command} is routed to more than one handler")]
    DuplicateRoute {
        /// The doubly-routed command name.
        command: String,
    },

    /// A route was registered under an empty command name.
    #[error("a route with an empty command name was registered")]
    UnnamedRoute,
}

type DeferredHandler = Box<
    dyn FnOnce(
        Arc<dyn EventStore>,
        Option<Arc<dyn SnapshotStore>>,
        Arc<dyn MessageFactory>,
    ) -> Arc<dyn CommandHandler>,
>;

/// Collects routes and shared collaborators, then builds the immutable
/// [`CommandRouter`].
///
/// Processor construction is deferred to [`build`](Self::build) so the
/// order of `route` and `with_*` calls does not matter.
pub struct CommandRouterBuilder {
    event_store: Arc<dyn EventStore>,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    factory: Arc<dyn MessageFactory>,
    pending: Vec<DeferredHandler>,
}

impl CommandRouterBuilder {
    /// Start a routing table backed by the given event store.
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            event_store,
            snapshot_store: None,
            factory: Arc::new(DefaultMessageFactory),
            pending: Vec::new(),
        }
    }

    /// Let processors persist and consult aggregate snapshots.
    pub fn with_snapshot_store(mut self, snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(snapshot_store);
        self
    }

    /// Replace the factory used to mint event messages.
    pub fn with_message_factory(mut self, factory: Arc<dyn MessageFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Route a command to a processor described by `descriptor`.
    pub fn route<A: AggregateType>(mut self, descriptor: CommandDescriptor<A>) -> Self {
        self.pending.push(Box::new(move |events, snapshots, factory| {
            Arc::new(CommandProcessor::new(descriptor, events, snapshots, factory))
        }));
        self
    }

    /// Route a command to a pre-built handler.
    pub fn route_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.pending.push(Box::new(move |_, _, _| handler));
        self
    }

    /// Materialize the routing table.
    pub fn build(self) -> Result<CommandRouter, ConfigurationError> {
        let mut routes: HashMap<String, Arc<dyn CommandHandler>> = HashMap::new();

        for constructor in self.pending {
            let handler = constructor(
                self.event_store.clone(),
                self.snapshot_store.clone(),
                self.factory.clone(),
            );
            let command = handler.command_name().to_string();
            if command.is_empty() {
                return Err(ConfigurationError::UnnamedRoute);
            }
            if routes.insert(command.clone(), handler).is_some() {
                return Err(ConfigurationError::DuplicateRoute { command });
            }
        }

        debug!(routes = routes.len(), "command router built");
        Ok(CommandRouter { routes })
    }
}

impl std::fmt::Debug for CommandRouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouterBuilder")
            .field("snapshots", &self.snapshot_store.is_some())
            .field("pending_routes", &self.pending.len())
            .finish()
    }
}

/// Immutable command-name-to-handler routing table.
pub struct CommandRouter {
    routes: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    /// Start assembling a router backed by the given event store.
    pub fn builder(event_store: Arc<dyn EventStore>) -> CommandRouterBuilder {
        CommandRouterBuilder::new(event_store)
    }

    /// Look up the handler for a command name. Unknown names resolve to
    /// `None`; routes with empty names cannot exist, so an empty name
    /// resolves to `None` as well.
    pub fn resolve(&self, command_name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.routes.get(command_name).cloned()
    }

    /// True when a handler is routed for the name.
    pub fn routes_command(&self, command_name: &str) -> bool {
        self.routes.contains_key(command_name)
    }

    /// The routed command names, in no particular order.
    pub fn routed_commands(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Dispatch one command: resolve its handler by name and run it.
    /// Commands nobody routes come back as [`DispatchOutcome::Unrouted`].
    pub async fn dispatch(
        &self,
        command: &CommandMessage,
    ) -> Result<DispatchOutcome, CommandError> {
        match self.resolve(command.name()) {
            Some(handler) => {
                debug!(command = command.name(), uuid = %command.uuid(), "dispatching command");
                handler.handle(command).await?;
                Ok(DispatchOutcome::Handled)
            }
            None => {
                debug!(command = command.name(), "no route for command");
                Ok(DispatchOutcome::Unrouted)
            }
        }
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<&str> = self.routed_commands().collect();
        commands.sort_unstable();
        f.debug_struct("CommandRouter")
            .field("routes", &commands)
            .finish()
    }
}
