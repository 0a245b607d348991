//! Shared unit-test fixture: the User aggregate from the end-to-end
//! registration scenario, plus message helpers for it.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregate::{AggregateType, SnapshotPolicy};
use crate::message::{CommandMessage, EventMessage, Payload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UserState {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub(crate) enum UserEvent {
    UserWasRegistered { id: String, username: String },
    UsernameWasChanged { username: String },
}

fn fold_user(state: Option<UserState>, event: &UserEvent) -> UserState {
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

pub(crate) struct User;

impl AggregateType for User {
    const NAME: &'static str = "User";
    const IDENTIFIER: &'static str = "id";
    type State = UserState;
    type Event = UserEvent;

    fn apply(state: Option<UserState>, event: &UserEvent) -> UserState {
        fold_user(state, event)
    }
}

/// Same aggregate, but snapshotting every second version.
pub(crate) struct SnapshottedUser;

impl AggregateType for SnapshottedUser {
    const NAME: &'static str = "User";
    const IDENTIFIER: &'static str = "id";
    type State = UserState;
    type Event = UserEvent;

    fn apply(state: Option<UserState>, event: &UserEvent) -> UserState {
        fold_user(state, event)
    }

    fn snapshot_policy() -> SnapshotPolicy {
        SnapshotPolicy::every(2)
    }
}

pub(crate) fn registered(username: &str) -> EventMessage {
    EventMessage::new(
        "UserWasRegistered",
        Payload::from([
            ("id".to_string(), json!("u1")),
            ("username".to_string(), json!(username)),
        ]),
    )
}

pub(crate) fn renamed(username: &str) -> EventMessage {
    EventMessage::new(
        "UsernameWasChanged",
        Payload::from([("username".to_string(), json!(username))]),
    )
}

pub(crate) fn register_user(id: &str, username: &str) -> CommandMessage {
    CommandMessage::new(
        "RegisterUser",
        Payload::from([
            ("id".to_string(), json!(id)),
            ("username".to_string(), json!(username)),
        ]),
    )
}

pub(crate) fn change_username(id: &str, username: &str) -> CommandMessage {
    CommandMessage::new(
        "ChangeUsername",
        Payload::from([
            ("id".to_string(), json!(id)),
            ("username".to_string(), json!(username)),
        ]),
    )
}
