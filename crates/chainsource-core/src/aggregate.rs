//! The aggregate contract and deterministic replay.

use crate::error::CoreError;
use crate::event::{Event, EventPayload};

/// An event-sourced entity: a pure value materialized by folding its event
/// history in version order.
///
/// `handle` decides — it inspects the current fold and either returns the
/// payloads to emit or a recoverable error, touching nothing. `apply` folds —
/// it must be total, deterministic, and free of side effects, because it runs
/// again on every replay.
pub trait Aggregate: Sized + Clone + Send + Sync + 'static {
    type Command: crate::event::Command;
    type Event: EventPayload + Clone + Send + Sync;
    /// Per-aggregate configuration handed to every `handle` call. Decisions
    /// may read it; `apply` never sees it, so replay stays deterministic.
    type Context: Send + Sync;

    /// Aggregate type name, used as the default aggregate id prefix.
    const TYPE: &'static str;

    /// The state before any event has been applied.
    fn initial() -> Self;

    /// Decide which events a command produces. Must not mutate anything.
    fn handle(&self, ctx: &Self::Context, command: &Self::Command)
        -> Result<Vec<Self::Event>, CoreError>;

    /// Fold one event into the state.
    fn apply(self, event: &Self::Event) -> Self;
}

/// An aggregate fold paired with the version it has reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<A> {
    pub state: A,
    pub version: u64,
}

impl<A: Aggregate> Versioned<A> {
    /// The pre-event fold: initial state at version 0.
    pub fn initial() -> Self {
        Self {
            state: A::initial(),
            version: 0,
        }
    }

    /// Fold a tail of events onto this state, enforcing version contiguity.
    ///
    /// A gap, duplicate, or out-of-order version is [`CoreError::ReplayCorruption`]
    /// — fatal, never silently skipped or reordered.
    pub fn fold(mut self, events: &[Event<A::Event>]) -> Result<Self, CoreError> {
        for event in events {
            if event.version != self.version + 1 {
                return Err(CoreError::ReplayCorruption {
                    aggregate_id: event.aggregate_id.clone(),
                    expected: self.version + 1,
                    got: event.version,
                });
            }
            self.state = self.state.apply(&event.payload);
            self.version = event.version;
        }
        Ok(self)
    }
}

/// Reconstruct an aggregate from its full event history (version 1 onward).
pub fn replay<A: Aggregate>(events: &[Event<A::Event>]) -> Result<Versioned<A>, CoreError> {
    Versioned::initial().fold(events)
}

/// Reconstruct an aggregate from a snapshot state plus its subsequent tail.
///
/// Equivalent to [`replay`] over the full history — the round-trip invariant
/// the snapshot tests pin down.
pub fn replay_from<A: Aggregate>(
    state: A,
    version: u64,
    tail: &[Event<A::Event>],
) -> Result<Versioned<A>, CoreError> {
    Versioned { state, version }.fold(tail)
}
