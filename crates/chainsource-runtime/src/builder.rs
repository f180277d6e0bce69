//! Fluent builder API for assembling a pipeline.
//!
//! # Example
//!
//! ```rust
//! use chainsource_runtime::RuntimeBuilder;
//! use chainsource_network::ChainKind;
//! use chainsource_mempool::TrustPolicy;
//!
//! let pipeline = RuntimeBuilder::new()
//!     .chain(ChainKind::Utxo)
//!     .max_reorg_depth(64)
//!     .trust_policy(TrustPolicy::Quorum(2))
//!     .snapshot_interval(100)
//!     .build();
//! ```

use std::sync::Arc;

use chainsource_core::{MemoryEventStore, MemorySnapshotStore, SnapshotManager};
use chainsource_mempool::{MempoolAggregate, MempoolConfig, TrustPolicy};
use chainsource_network::{ChainKind, NetworkAggregate, NetworkConfig};

use crate::executor::AggregateHandle;
use crate::pipeline::Pipeline;

/// Configuration for a pipeline instance.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Aggregate id for the network stream.
    pub network_id: String,
    /// Aggregate id for the mempool stream.
    pub mempool_id: String,
    /// Ledger model of the indexed chain.
    pub chain: ChainKind,
    /// Deepest recoverable reorganisation.
    pub max_reorg_depth: u64,
    /// Mempool known-transaction policy.
    pub trust_policy: TrustPolicy,
    /// Snapshot every N events; 0 disables snapshots.
    pub snapshot_interval: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network_id: "network".into(),
            mempool_id: "mempool".into(),
            chain: ChainKind::Utxo,
            max_reorg_depth: 128,
            trust_policy: TrustPolicy::AnyProvider,
            snapshot_interval: 100,
        }
    }
}

/// Fluent builder for [`RuntimeConfig`] and the wired [`Pipeline`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    /// Set the network aggregate id (stream key).
    pub fn network_id(mut self, id: impl Into<String>) -> Self {
        self.config.network_id = id.into();
        self
    }

    /// Set the mempool aggregate id (stream key).
    pub fn mempool_id(mut self, id: impl Into<String>) -> Self {
        self.config.mempool_id = id.into();
        self
    }

    /// Set the indexed chain's ledger model.
    pub fn chain(mut self, chain: ChainKind) -> Self {
        self.config.chain = chain;
        self
    }

    /// Set the deepest recoverable reorganisation.
    pub fn max_reorg_depth(mut self, depth: u64) -> Self {
        self.config.max_reorg_depth = depth;
        self
    }

    /// Set the mempool trust policy.
    pub fn trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.config.trust_policy = policy;
        self
    }

    /// Snapshot every N events (0 disables snapshots).
    pub fn snapshot_interval(mut self, n: u64) -> Self {
        self.config.snapshot_interval = n;
        self
    }

    /// Return the configuration without wiring stores.
    pub fn build_config(self) -> RuntimeConfig {
        self.config
    }

    /// Wire a pipeline over in-memory stores.
    ///
    /// Components assemble in dependency order; persistent deployments
    /// construct the handles themselves with their own store
    /// implementations.
    pub fn build(self) -> Pipeline {
        let config = self.config;

        let network_ctx = NetworkConfig {
            chain: config.chain,
            max_reorg_depth: config.max_reorg_depth,
        };
        let mut network: AggregateHandle<NetworkAggregate> = AggregateHandle::new(
            &config.network_id,
            network_ctx,
            Arc::new(MemoryEventStore::new()),
        );
        if config.snapshot_interval > 0 {
            network = network.with_snapshots(SnapshotManager::new(
                Box::new(MemorySnapshotStore::new()),
                &config.network_id,
                config.snapshot_interval,
            ));
        }

        let mempool_ctx = MempoolConfig {
            trust_policy: config.trust_policy,
        };
        let mut mempool: AggregateHandle<MempoolAggregate> = AggregateHandle::new(
            &config.mempool_id,
            mempool_ctx,
            Arc::new(MemoryEventStore::new()),
        );
        if config.snapshot_interval > 0 {
            mempool = mempool.with_snapshots(SnapshotManager::new(
                Box::new(MemorySnapshotStore::new()),
                &config.mempool_id,
                config.snapshot_interval,
            ));
        }

        Pipeline::new(network, mempool)
    }
}
