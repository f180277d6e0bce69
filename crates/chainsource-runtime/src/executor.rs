//! Per-aggregate command execution with single-writer discipline.

use std::sync::Arc;

use tokio::sync::Mutex;

use chainsource_core::{
    replay, replay_from, Aggregate, Command, CoreError, Event, EventPayload, EventStore,
    SnapshotManager, Versioned,
};

struct Inner<A: Aggregate> {
    /// `None` until the first recovery; replay happens lazily before the
    /// first command touches the aggregate.
    fold: Option<Versioned<A>>,
    snapshots: Option<SnapshotManager<A>>,
    /// Set when a fatal error halted the aggregate; cleared only by
    /// constructing a fresh handle after external intervention.
    halted: Option<String>,
}

/// Owns one aggregate instance: recovery, command execution, event append.
///
/// The internal mutex is the serialization point — at most one command is
/// in flight per aggregate id, while distinct handles run fully
/// concurrently.
pub struct AggregateHandle<A: Aggregate> {
    aggregate_id: String,
    ctx: A::Context,
    store: Arc<dyn EventStore<A::Event>>,
    inner: Mutex<Inner<A>>,
}

impl<A: Aggregate> AggregateHandle<A> {
    pub fn new(
        aggregate_id: impl Into<String>,
        ctx: A::Context,
        store: Arc<dyn EventStore<A::Event>>,
    ) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            ctx,
            store,
            inner: Mutex::new(Inner {
                fold: None,
                snapshots: None,
                halted: None,
            }),
        }
    }

    /// Attach a snapshot manager; recovery will prefer snapshot + tail over
    /// a full replay.
    pub fn with_snapshots(mut self, snapshots: SnapshotManager<A>) -> Self {
        self.inner.get_mut().snapshots = Some(snapshots);
        self
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    /// Execute one command: recover if needed, decide, append, fold.
    ///
    /// Returns the emitted events. Recoverable errors leave the aggregate
    /// in its prior state; fatal errors additionally halt the handle.
    pub async fn execute(&self, command: A::Command) -> Result<Vec<Event<A::Event>>, CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(reason) = &inner.halted {
            return Err(CoreError::Halted {
                aggregate_id: self.aggregate_id.clone(),
                reason: reason.clone(),
            });
        }

        let fold = match inner.fold.take() {
            Some(fold) => fold,
            None => self.recover(&inner.snapshots).await?,
        };

        let payloads = match fold.state.handle(&self.ctx, &command) {
            Ok(payloads) => payloads,
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(
                        aggregate_id = %self.aggregate_id,
                        error = %e,
                        "Fatal error — halting aggregate"
                    );
                    inner.halted = Some(e.to_string());
                } else {
                    inner.fold = Some(fold);
                }
                return Err(e);
            }
        };

        let events = Event::envelope(
            &self.aggregate_id,
            fold.version,
            command.request_id(),
            payloads,
        );
        if events.is_empty() {
            inner.fold = Some(fold);
            return Ok(events);
        }

        // Durability point: the append commits or the command fails whole.
        if let Err(e) = self
            .store
            .append(&self.aggregate_id, fold.version, events.clone())
            .await
        {
            inner.fold = Some(fold);
            return Err(e);
        }

        let applied = events.len() as u64;
        let next = fold.fold(&events)?;
        if let Some(snapshots) = inner.snapshots.as_mut() {
            snapshots.maybe_save(&next, applied).await?;
        }
        for event in &events {
            tracing::debug!(
                aggregate_id = %self.aggregate_id,
                version = event.version,
                kind = event.payload.kind(),
                "Event committed"
            );
        }
        inner.fold = Some(next);
        Ok(events)
    }

    /// Current fold, recovering from the store if this handle is fresh.
    pub async fn state(&self) -> Result<Versioned<A>, CoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fold.is_none() {
            let fold = self.recover(&inner.snapshots).await?;
            inner.fold = Some(fold);
        }
        // Recovered one line above; the clone keeps callers off the lock.
        match &inner.fold {
            Some(fold) => Ok(fold.clone()),
            None => Err(CoreError::Store("recovery produced no state".into())),
        }
    }

    /// Returns `true` once a fatal error has halted this aggregate.
    pub async fn is_halted(&self) -> bool {
        self.inner.lock().await.halted.is_some()
    }

    async fn recover(
        &self,
        snapshots: &Option<SnapshotManager<A>>,
    ) -> Result<Versioned<A>, CoreError> {
        if let Some(manager) = snapshots {
            if let Some(snapshot) = manager.load().await? {
                let tail = self
                    .store
                    .load(&self.aggregate_id, snapshot.version)
                    .await?;
                tracing::info!(
                    aggregate_id = %self.aggregate_id,
                    snapshot_version = snapshot.version,
                    tail = tail.len(),
                    "Recovering from snapshot"
                );
                return replay_from(snapshot.state, snapshot.version, &tail);
            }
        }
        let events = self.store.load(&self.aggregate_id, 0).await?;
        tracing::info!(
            aggregate_id = %self.aggregate_id,
            events = events.len(),
            "Recovering from full replay"
        );
        replay(&events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsource_core::{EventPayload, MemoryEventStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Register {
        entries: Vec<u64>,
    }

    #[derive(Debug)]
    struct Push {
        request_id: String,
        value: u64,
    }

    impl Command for Push {
        fn request_id(&self) -> &str {
            &self.request_id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "payload")]
    enum RegisterEvent {
        Pushed { value: u64 },
    }

    impl EventPayload for RegisterEvent {
        fn kind(&self) -> &'static str {
            "Pushed"
        }
    }

    impl Aggregate for Register {
        type Command = Push;
        type Event = RegisterEvent;
        type Context = ();

        const TYPE: &'static str = "register";

        fn initial() -> Self {
            Self { entries: vec![] }
        }

        fn handle(&self, _ctx: &(), command: &Push) -> Result<Vec<RegisterEvent>, CoreError> {
            Ok(vec![RegisterEvent::Pushed {
                value: command.value,
            }])
        }

        fn apply(mut self, event: &RegisterEvent) -> Self {
            let RegisterEvent::Pushed { value } = event;
            self.entries.push(*value);
            self
        }
    }

    #[tokio::test]
    async fn execute_appends_and_folds() {
        let store = Arc::new(MemoryEventStore::new());
        let handle: AggregateHandle<Register> =
            AggregateHandle::new("register-1", (), store.clone());

        let events = handle
            .execute(Push {
                request_id: "r1".into(),
                value: 42,
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version, 1);
        assert_eq!(store.stream_len("register-1"), 1);

        let fold = handle.state().await.unwrap();
        assert_eq!(fold.version, 1);
        assert_eq!(fold.state.entries, vec![42]);
    }

    #[tokio::test]
    async fn restart_recovers_identical_state() {
        let store = Arc::new(MemoryEventStore::new());
        {
            let handle: AggregateHandle<Register> =
                AggregateHandle::new("register-1", (), store.clone());
            for value in [1u64, 2, 3] {
                handle
                    .execute(Push {
                        request_id: format!("r{value}"),
                        value,
                    })
                    .await
                    .unwrap();
            }
        }

        // New handle over the same log: replay must reproduce the fold.
        let handle: AggregateHandle<Register> =
            AggregateHandle::new("register-1", (), store.clone());
        let fold = handle.state().await.unwrap();
        assert_eq!(fold.version, 3);
        assert_eq!(fold.state.entries, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn concurrent_commands_serialize_per_id() {
        let store = Arc::new(MemoryEventStore::new());
        let handle: Arc<AggregateHandle<Register>> =
            Arc::new(AggregateHandle::new("register-1", (), store.clone()));

        let mut tasks = Vec::new();
        for value in 0..20u64 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .execute(Push {
                        request_id: format!("r{value}"),
                        value,
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Every append landed; versions are contiguous 1..=20.
        let fold = handle.state().await.unwrap();
        assert_eq!(fold.version, 20);
        assert_eq!(fold.state.entries.len(), 20);
    }
}
