//! Event-store and snapshot-store contracts with in-memory backends.
//!
//! The in-memory backends serve tests and ephemeral pipelines. Persistent
//! engines live outside this crate; they must honor these contracts exactly
//! — append-only, optimistic version checking, version-ordered loads.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::CoreError;
use crate::event::Event;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Append-only event log, one stream per aggregate id.
#[async_trait]
pub trait EventStore<P: Send + Sync>: Send + Sync {
    /// Append events atomically.
    ///
    /// `expected_version` is the stream's current last version; a mismatch
    /// means a concurrent writer won and the append is rejected wholesale
    /// with [`CoreError::VersionConflict`].
    async fn append(
        &self,
        aggregate_id: &str,
        expected_version: u64,
        events: Vec<Event<P>>,
    ) -> Result<(), CoreError>;

    /// Load all events for an aggregate with `version > from_version`,
    /// in version order.
    async fn load(&self, aggregate_id: &str, from_version: u64)
        -> Result<Vec<Event<P>>, CoreError>;
}

/// In-memory event store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryEventStore<P> {
    streams: Mutex<HashMap<String, Vec<Event<P>>>>,
}

impl<P> MemoryEventStore<P> {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Number of events stored for an aggregate.
    pub fn stream_len(&self, aggregate_id: &str) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(aggregate_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl<P: Clone + Send + Sync> EventStore<P> for MemoryEventStore<P> {
    async fn append(
        &self,
        aggregate_id: &str,
        expected_version: u64,
        events: Vec<Event<P>>,
    ) -> Result<(), CoreError> {
        let mut streams = self.streams.lock().unwrap();
        let stream = streams.entry(aggregate_id.to_string()).or_default();
        let actual = stream.last().map(|e| e.version).unwrap_or(0);
        if actual != expected_version {
            return Err(CoreError::VersionConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: expected_version,
                actual,
            });
        }
        stream.extend(events);
        Ok(())
    }

    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
    ) -> Result<Vec<Event<P>>, CoreError> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.version > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// In-memory snapshot store.
#[derive(Default)]
pub struct MemorySnapshotStore<S> {
    data: Mutex<HashMap<String, Snapshot<S>>>,
}

impl<S> MemorySnapshotStore<S> {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<S: Clone + Send + Sync> SnapshotStore<S> for MemorySnapshotStore<S> {
    async fn load(&self, aggregate_id: &str) -> Result<Option<Snapshot<S>>, CoreError> {
        Ok(self.data.lock().unwrap().get(aggregate_id).cloned())
    }

    async fn save(&self, snapshot: Snapshot<S>) -> Result<(), CoreError> {
        self.data
            .lock()
            .unwrap()
            .insert(snapshot.aggregate_id.clone(), snapshot);
        Ok(())
    }

    async fn delete(&self, aggregate_id: &str) -> Result<(), CoreError> {
        self.data.lock().unwrap().remove(aggregate_id);
        Ok(())
    }
}
