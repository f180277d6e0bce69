//! Snapshots — persisted folds for fast crash recovery.
//!
//! A snapshot stores an aggregate's state at a version. On restart, replay
//! resumes from the snapshot plus the event tail rather than from version 1.
//! Snapshots are an optimization only: the resulting state must be identical
//! to a full replay.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Versioned};
use crate::error::CoreError;

/// A persisted aggregate fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<S> {
    pub aggregate_id: String,
    pub version: u64,
    pub state: S,
    /// Unix timestamp of when this snapshot was taken.
    pub taken_at: i64,
}

/// Trait for storing and loading snapshots.
#[async_trait]
pub trait SnapshotStore<S: Send + Sync>: Send + Sync {
    /// Load the latest snapshot for an aggregate (`None` if none exists).
    async fn load(&self, aggregate_id: &str) -> Result<Option<Snapshot<S>>, CoreError>;

    /// Save (upsert) a snapshot.
    async fn save(&self, snapshot: Snapshot<S>) -> Result<(), CoreError>;

    /// Delete an aggregate's snapshot (e.g. when resetting it).
    async fn delete(&self, aggregate_id: &str) -> Result<(), CoreError>;
}

/// Manages snapshot reads/writes for one aggregate.
pub struct SnapshotManager<A: Aggregate> {
    store: Box<dyn SnapshotStore<A>>,
    aggregate_id: String,
    /// How often to save (every N events).
    save_interval: u64,
    /// Events applied since the last save.
    counter: u64,
}

impl<A: Aggregate> SnapshotManager<A> {
    pub fn new(
        store: Box<dyn SnapshotStore<A>>,
        aggregate_id: impl Into<String>,
        save_interval: u64,
    ) -> Self {
        Self {
            store,
            aggregate_id: aggregate_id.into(),
            save_interval,
            counter: 0,
        }
    }

    /// Load the saved snapshot (`None` if none exists).
    pub async fn load(&self) -> Result<Option<Snapshot<A>>, CoreError> {
        self.store.load(&self.aggregate_id).await
    }

    /// Conditionally save every `save_interval` applied events.
    ///
    /// Call after each batch of events is successfully applied.
    pub async fn maybe_save(&mut self, fold: &Versioned<A>, applied: u64) -> Result<(), CoreError> {
        self.counter += applied;
        if self.counter >= self.save_interval {
            self.force_save(fold).await?;
            self.counter = 0;
        }
        Ok(())
    }

    /// Immediately save a snapshot (used on shutdown and after reorg recovery).
    pub async fn force_save(&self, fold: &Versioned<A>) -> Result<(), CoreError> {
        tracing::debug!(
            aggregate_id = %self.aggregate_id,
            version = fold.version,
            "Saving snapshot"
        );
        self.store
            .save(Snapshot {
                aggregate_id: self.aggregate_id.clone(),
                version: fold.version,
                state: fold.state.clone(),
                taken_at: chrono::Utc::now().timestamp(),
            })
            .await
    }
}
