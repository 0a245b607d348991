//! Aggregate types and the replayable state machine
//!
//! An aggregate's state is nothing but a fold over its own event history in
//! stream order. [`AggregateType`] describes one aggregate family: its name,
//! where its identifier lives in command payloads, the state produced by the
//! fold, and (as a tagged enum matched exhaustively in [`apply`]) every
//! event that can ever be recorded against it. The enum replaces the classic
//! name-keyed apply map: adding a variant without handling it fails to
//! compile, and an event name with no variant fails loudly at decode time.
//!
//! [`AggregateRoot`] is the runtime instance: identity, version, folded
//! state, and the list of events recorded since the last persistence.
//!
//! [`apply`]: AggregateType::apply

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::message::{EventMessage, Payload};

/// Raised when an event message cannot be folded into an aggregate.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The event name has no variant in the aggregate's event enum, or the
    /// payload does not match the variant's fields. Either way the
    /// configuration that produced the event disagrees with the aggregate
    /// definition, which no retry can fix.
    #[error("aggregate type {aggregate_type} cannot apply event {event}: {source}")]
    EventDecode {
        /// Aggregate type that refused the event.
        aggregate_type: &'static str,
        /// Name of the refused event.
        event: String,
        /// Decode failure naming the unknown variant or bad field.
        #[source]
        source: serde_json::Error,
    },
}

/// When the repository should write a snapshot for an aggregate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Never snapshot; every load replays the full stream.
    Never,
    /// Snapshot whenever the version crosses a multiple of the interval.
    /// A zero interval never fires, same as [`Never`](SnapshotPolicy::Never).
    Every(u64),
}

impl SnapshotPolicy {
    /// Snapshot every `interval` versions. An interval of zero disables
    /// snapshotting entirely.
    pub fn every(interval: u64) -> Self {
        if interval == 0 {
            SnapshotPolicy::Never
        } else {
            SnapshotPolicy::Every(interval)
        }
    }

    /// True when moving from `previous_version` to `current_version` crossed
    /// a snapshot boundary. A single save folding several events at once
    /// still yields at most one snapshot.
    pub fn is_due(&self, previous_version: u64, current_version: u64) -> bool {
        match self {
            SnapshotPolicy::Never => false,
            SnapshotPolicy::Every(interval) => {
                *interval != 0 && current_version / interval > previous_version / interval
            }
        }
    }
}

/// Static description of one aggregate family.
///
/// Implementors are zero-sized markers; all behaviour is associated items.
/// The event enum must use the serde convention
/// `#[serde(tag = "event", content = "payload")]` with struct variants so
/// stream event names line up with variant names and unknown names fail
/// decode with a precise error.
///
/// # Examples
///
/// ```rust
/// use commandeer::AggregateType;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct TallyState {
///     total: i64,
/// }
///
/// #[derive(Debug, Deserialize)]
/// #[serde(tag = "event", content = "payload")]
/// enum TallyEvent {
///     TallyOpened {},
///     AmountAdded { amount: i64 },
/// }
///
/// struct Tally;
///
/// impl AggregateType for Tally {
///     const NAME: &'static str = "Tally";
///     const IDENTIFIER: &'static str = "id";
///     type State = TallyState;
///     type Event = TallyEvent;
///
///     fn apply(state: Option<TallyState>, event: &TallyEvent) -> TallyState {
///         match event {
///             TallyEvent::TallyOpened {} => TallyState { total: 0 },
///             TallyEvent::AmountAdded { amount } => {
///                 let mut state = state.expect("tally must be opened first");
///                 state.total += amount;
///                 state
///             }
///         }
///     }
/// }
///
/// let event = Tally::decode_event("AmountAdded", &commandeer::Payload::from([
///     ("amount".to_string(), serde_json::json!(5)),
/// ])).unwrap();
/// let state = Tally::apply(Some(TallyState { total: 1 }), &event);
/// assert_eq!(state.total, 6);
/// ```
pub trait AggregateType: Send + Sync + 'static {
    /// Aggregate type name; also the prefix of its stream identifiers.
    const NAME: &'static str;

    /// Default command payload field holding the aggregate identifier.
    const IDENTIFIER: &'static str;

    /// State produced by folding events. Serialized as-is into snapshots.
    type State: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static;

    /// Tagged union of every event this aggregate type can record.
    type Event: DeserializeOwned;

    /// Fold one event into the state. `state` is `None` only for the first
    /// event of a freshly created aggregate. Must be pure: no I/O, no
    /// dependence on anything but its arguments. Replay correctness hangs
    /// on this.
    fn apply(state: Option<Self::State>, event: &Self::Event) -> Self::State;

    /// Reconstruct a typed event from a stream event name and payload.
    ///
    /// The default honors the `tag = "event", content = "payload"`
    /// convention. Override only when an aggregate's enum uses a different
    /// representation.
    fn decode_event(name: &str, payload: &Payload) -> Result<Self::Event, ApplyError> {
        let tagged = serde_json::json!({ "event": name, "payload": payload });
        serde_json::from_value(tagged).map_err(|source| ApplyError::EventDecode {
            aggregate_type: Self::NAME,
            event: name.to_string(),
            source,
        })
    }

    /// Snapshot policy for this aggregate type. Defaults to no snapshots.
    fn snapshot_policy() -> SnapshotPolicy {
        SnapshotPolicy::Never
    }
}

/// A named, versioned, replayable fold machine over one aggregate instance.
///
/// Constructed fresh (version 0, no state) for creating commands, or
/// rehydrated from history and/or a snapshot for everything else. Version
/// increases by exactly one per folded event, so after rehydration it equals
/// the stream length the instance has seen.
pub struct AggregateRoot<A: AggregateType> {
    id: String,
    version: u64,
    state: Option<A::State>,
    pending: Vec<EventMessage>,
}

impl<A: AggregateType> AggregateRoot<A> {
    /// Brand-new aggregate: version 0, state undefined until the first
    /// event is recorded.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            state: None,
            pending: Vec::new(),
        }
    }

    /// Rehydrate by folding an ordered event history. The resulting version
    /// equals the number of events folded; nothing lands in the pending
    /// list.
    pub fn from_history(
        id: impl Into<String>,
        events: impl IntoIterator<Item = EventMessage>,
    ) -> Result<Self, ApplyError> {
        let mut root = Self::new(id);
        for event in events {
            root.replay(&event)?;
        }
        Ok(root)
    }

    /// Rehydrate from a snapshot's state and version. Events recorded after
    /// the snapshot are folded in via [`replay`](Self::replay).
    pub fn from_snapshot(id: impl Into<String>, version: u64, state: A::State) -> Self {
        Self {
            id: id.into(),
            version,
            state: Some(state),
            pending: Vec::new(),
        }
    }

    /// Aggregate identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of events folded into this instance so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Aggregate type name.
    pub fn aggregate_type(&self) -> &'static str {
        A::NAME
    }

    /// Current folded state; `None` while a freshly created aggregate is
    /// still awaiting its first event.
    pub fn state(&self) -> Option<&A::State> {
        self.state.as_ref()
    }

    /// Fold a historical event without marking it pending. Used during
    /// rehydration only.
    pub fn replay(&mut self, event: &EventMessage) -> Result<(), ApplyError> {
        self.fold(event)
    }

    /// Record a newly produced event: fold it into state, bump the version,
    /// and queue it for persistence.
    ///
    /// The event name must decode into the aggregate's event enum; anything
    /// else is a configuration fault and leaves the instance untouched.
    pub fn record_that(&mut self, event: EventMessage) -> Result<(), ApplyError> {
        self.fold(&event)?;
        self.pending.push(event);
        Ok(())
    }

    /// Events recorded since the last persistence, in recording order.
    pub fn recorded_events(&self) -> &[EventMessage] {
        &self.pending
    }

    /// True when unpersisted events are queued.
    pub fn has_recorded_events(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the recorded-events list in recording order. The repository
    /// calls this to learn exactly what to append.
    pub fn pop_recorded_events(&mut self) -> Vec<EventMessage> {
        std::mem::take(&mut self.pending)
    }

    fn fold(&mut self, event: &EventMessage) -> Result<(), ApplyError> {
        let decoded = A::decode_event(event.name(), event.payload())?;
        let next = A::apply(self.state.take(), &decoded);
        self.state = Some(next);
        self.version += 1;
        Ok(())
    }
}

impl<A: AggregateType> std::fmt::Debug for AggregateRoot<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("aggregate_type", &A::NAME)
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish()
    }
}
