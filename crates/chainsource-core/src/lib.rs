//! chainsource-core — deterministic event-sourcing substrate.
//!
//! # Architecture
//!
//! ```text
//! Command ──► Aggregate::handle ──► Vec<payload> ──► Event envelopes
//!                   ▲                                      │
//!                   │                                      ▼
//!            Aggregate::apply ◄── replay / replay_from ◄── EventStore
//!                                        │
//!                                  SnapshotManager (every N events)
//! ```
//!
//! State is never mutated in place: a command is decided against the current
//! fold, the resulting events are appended, and the fold advances by applying
//! them. Replaying the log — or a snapshot plus its tail — must reproduce the
//! live state exactly.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod snapshot;
pub mod store;

pub use aggregate::{replay, replay_from, Aggregate, Versioned};
pub use error::CoreError;
pub use event::{Command, Event, EventPayload};
pub use snapshot::{Snapshot, SnapshotManager, SnapshotStore};
pub use store::{EventStore, MemoryEventStore, MemorySnapshotStore};
