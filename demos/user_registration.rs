// Copyright 2025 Cowboy AI, LLC.

//! User Registration Demo
//!
//! Drives the full command pipeline against the in-memory stores: a
//! `RegisterUser` command creates the aggregate, a `ChangeUsername` command
//! transitions it, and an unrouted command falls through to the caller.
//!
//! Key concepts demonstrated:
//! - Describing commands with domain functions and event-recorder maps
//! - Payload schemas guarding the processing boundary
//! - Causation metadata linking every event to its command
//! - Replaying the stream to rebuild aggregate state
//!
//! Run with: `cargo run --example user_registration`

use std::sync::Arc;

use anyhow::Result;
use commandeer::infrastructure::InMemoryEventStore;
use commandeer::{
    AggregateType, CommandDescriptor, CommandMessage, CommandRouter, DomainFunction, FieldType,
    Payload, PayloadSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserState {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "payload")]
enum UserEvent {
    UserWasRegistered { id: String, username: String },
    UsernameWasChanged { username: String },
}

struct User;

impl AggregateType for User {
    const NAME: &'static str = "User";
    const IDENTIFIER: &'static str = "id";
    type State = UserState;
    type Event = UserEvent;

    fn apply(state: Option<UserState>, event: &UserEvent) -> UserState {
        match event {
            UserEvent::UserWasRegistered { id, username } => UserState {
                id: id.clone(),
                username: username.clone(),
            },
            UserEvent::UsernameWasChanged { username } => {
                let mut state = state.expect("user exists before a rename");
                state.username = username.clone();
                state
            }
        }
    }
}

fn register_user() -> CommandDescriptor<User> {
    let function: DomainFunction<User> =
        DomainFunction::create(|command| Ok(vec![command.payload().clone()]));
    CommandDescriptor::new("RegisterUser", function)
        .with_command_schema(
            PayloadSchema::new()
                .field("id", FieldType::String)
                .field("username", FieldType::String),
        )
        .records("UserWasRegistered")
}

fn change_username() -> CommandDescriptor<User> {
    let function: DomainFunction<User> = DomainFunction::transition(|state: &UserState, command| {
        let requested = command.payload()["username"].clone();
        if requested == json!(state.username) {
            return Err(format!("username is already {}", state.username).into());
        }
        Ok(vec![Payload::from([("username".to_string(), requested)])])
    });
    CommandDescriptor::new("ChangeUsername", function).records("UsernameWasChanged")
}

fn user_command(name: &str, username: &str) -> CommandMessage {
    CommandMessage::new(
        name,
        Payload::from([
            ("id".to_string(), json!("u1")),
            ("username".to_string(), json!(username)),
        ]),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = InMemoryEventStore::new();
    let router = CommandRouter::builder(Arc::new(store.clone()))
        .route(register_user())
        .route(change_username())
        .build()?;

    println!("=== User Registration Demo ===\n");

    let register = user_command("RegisterUser", "Alex");
    println!("dispatching RegisterUser (uuid {})", register.uuid());
    router.dispatch(&register).await?;

    let rename = user_command("ChangeUsername", "codeliner");
    println!("dispatching ChangeUsername (uuid {})", rename.uuid());
    router.dispatch(&rename).await?;

    println!("\n--- stream User-u1 ---");
    let stored = store.recorded_events("User-u1").await;
    for stored in &stored {
        println!(
            "  v{} {} payload={} caused_by={}",
            stored.sequence,
            stored.event.name(),
            serde_json::to_string(stored.event.payload())?,
            stored
                .event
                .causation_name()
                .unwrap_or("unknown"),
        );
    }

    // rebuild state by folding the stream, exactly as the repository does
    let mut state: Option<UserState> = None;
    for stored in &stored {
        let event = User::decode_event(stored.event.name(), stored.event.payload())?;
        state = Some(User::apply(state, &event));
    }
    println!("\nreplayed state: {state:?}");

    // a duplicate rename is refused by the domain function
    match router.dispatch(&user_command("ChangeUsername", "codeliner")).await {
        Err(err) => println!("\nrejected as expected: {err}"),
        Ok(_) => println!("\nunexpected success"),
    }

    // nobody routes DeleteUser; the host decides what to do with it
    let outcome = router
        .dispatch(&user_command("DeleteUser", "codeliner"))
        .await?;
    println!("DeleteUser outcome: {outcome:?}");

    Ok(())
}
