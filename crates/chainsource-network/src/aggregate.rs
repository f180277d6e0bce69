//! The network aggregate — an event-sourced chain-head state machine.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized ─InitNetwork─► Initialized ─AddBlocksBatch─► Synchronized
//!       Synchronized | ReorganisationFinished ─► ReorganisationStarted ─► ReorganisationFinished
//!       Synchronized ─► SchemaUpMigrationStarted ─► SchemaUpdated ─► Synchronized
//! ```
//!
//! Batches are all-or-nothing: a single bad height or merkle root rejects
//! the whole command and no event is emitted.

use serde::{Deserialize, Serialize};

use chainsource_core::{Aggregate, Command, CoreError, EventPayload};
use chainsource_merkle::Block;

use crate::batch::verify_batch;
use crate::migration::MigrationLedger;
use crate::status::{ChainKind, NetworkStatus};
use crate::window::{BlockSummary, BlockWindow};

/// Decision-time configuration for the network aggregate.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Ledger model of the indexed chain.
    pub chain: ChainKind,
    /// Deepest reorganisation the aggregate will recover from. Anything
    /// deeper is fatal and requires external resynchronization.
    pub max_reorg_depth: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain: ChainKind::Utxo,
            max_reorg_depth: 128,
        }
    }
}

/// Commands accepted by the network aggregate.
#[derive(Debug, Clone)]
pub enum NetworkCommand {
    InitNetwork {
        request_id: String,
        indexed_height: u64,
    },
    AddBlocksBatch {
        request_id: String,
        blocks: Vec<Block>,
    },
    StartReorganisation {
        request_id: String,
        divergence_height: u64,
    },
    FinishReorganisation {
        request_id: String,
        replacement_blocks: Vec<Block>,
    },
    StartSchemaMigration {
        request_id: String,
        up_queries: Vec<String>,
        down_queries: Vec<String>,
    },
    CompleteSchemaMigration {
        request_id: String,
    },
    FinalizeSchemaMigration {
        request_id: String,
    },
}

impl NetworkCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::InitNetwork { .. } => "InitNetwork",
            Self::AddBlocksBatch { .. } => "AddBlocksBatch",
            Self::StartReorganisation { .. } => "StartReorganisation",
            Self::FinishReorganisation { .. } => "FinishReorganisation",
            Self::StartSchemaMigration { .. } => "StartSchemaMigration",
            Self::CompleteSchemaMigration { .. } => "CompleteSchemaMigration",
            Self::FinalizeSchemaMigration { .. } => "FinalizeSchemaMigration",
        }
    }
}

impl Command for NetworkCommand {
    fn request_id(&self) -> &str {
        match self {
            Self::InitNetwork { request_id, .. }
            | Self::AddBlocksBatch { request_id, .. }
            | Self::StartReorganisation { request_id, .. }
            | Self::FinishReorganisation { request_id, .. }
            | Self::StartSchemaMigration { request_id, .. }
            | Self::CompleteSchemaMigration { request_id }
            | Self::FinalizeSchemaMigration { request_id } => request_id,
        }
    }
}

/// Events emitted by the network aggregate. Serialized field names are part
/// of the external wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum NetworkEvent {
    #[serde(rename_all = "camelCase")]
    NetworkInitialized { indexed_height: u64 },
    #[serde(rename_all = "camelCase")]
    NetworkBlocksAdded {
        blocks: Vec<BlockSummary>,
        status: NetworkStatus,
    },
    #[serde(rename_all = "camelCase")]
    NetworkReorganisationStarted {
        status: NetworkStatus,
        /// The exact set of blocks being discarded, oldest first.
        blocks: Vec<BlockSummary>,
        /// Divergence height: the first stale block.
        height: u64,
    },
    #[serde(rename_all = "camelCase")]
    NetworkReorganisationFinished {
        status: NetworkStatus,
        /// New chain head after accepting the replacement blocks.
        height: u64,
        blocks: Vec<BlockSummary>,
    },
    #[serde(rename_all = "camelCase")]
    SchemaUpMigrationStarted {
        up_queries: Vec<String>,
        down_queries: Vec<String>,
        status: NetworkStatus,
    },
    #[serde(rename_all = "camelCase")]
    SchemaUpdated {
        up_queries: Vec<String>,
        down_queries: Vec<String>,
        status: NetworkStatus,
    },
    #[serde(rename_all = "camelCase")]
    SchemaSynchronised {
        up_queries: Vec<String>,
        down_queries: Vec<String>,
        status: NetworkStatus,
    },
}

impl EventPayload for NetworkEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::NetworkInitialized { .. } => "NetworkInitialized",
            Self::NetworkBlocksAdded { .. } => "NetworkBlocksAdded",
            Self::NetworkReorganisationStarted { .. } => "NetworkReorganisationStarted",
            Self::NetworkReorganisationFinished { .. } => "NetworkReorganisationFinished",
            Self::SchemaUpMigrationStarted { .. } => "SchemaUpMigrationStarted",
            Self::SchemaUpdated { .. } => "SchemaUpdated",
            Self::SchemaSynchronised { .. } => "SchemaSynchronised",
        }
    }
}

/// The materialized chain-head state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAggregate {
    status: NetworkStatus,
    /// Current indexed height. Meaningful once `blocks_indexed > 0` or the
    /// aggregate was initialized at a non-zero height.
    height: u64,
    /// Total blocks accepted over the aggregate's lifetime.
    blocks_indexed: u64,
    window: BlockWindow,
    migrations: MigrationLedger,
    /// Divergence height while a reorganisation is in flight.
    pending_reorg: Option<u64>,
    /// Queries announced by `SchemaUpMigrationStarted`, awaiting completion.
    pending_migration: Option<(Vec<String>, Vec<String>)>,
}

impl NetworkAggregate {
    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn window(&self) -> &BlockWindow {
        &self.window
    }

    pub fn migrations(&self) -> &MigrationLedger {
        &self.migrations
    }

    /// Total blocks accepted over the aggregate's lifetime.
    pub fn blocks_indexed(&self) -> u64 {
        self.blocks_indexed
    }

    /// The height the next accepted block must carry.
    ///
    /// Height 0 (genesis) is expected only by a fresh aggregate initialized
    /// at height 0 that has never accepted a block.
    pub fn expected_next_height(&self) -> u64 {
        if self.blocks_indexed == 0 && self.height == 0 {
            0
        } else {
            self.height + 1
        }
    }

    fn invalid(&self, command: &NetworkCommand) -> CoreError {
        CoreError::InvalidStateTransition {
            from: self.status.to_string(),
            command: command.name().to_string(),
        }
    }

    fn accepts_blocks(&self) -> bool {
        matches!(
            self.status,
            NetworkStatus::Initialized
                | NetworkStatus::Synchronized
                | NetworkStatus::ReorganisationFinished
        )
    }
}

impl Aggregate for NetworkAggregate {
    type Command = NetworkCommand;
    type Event = NetworkEvent;
    type Context = NetworkConfig;

    const TYPE: &'static str = "network";

    fn initial() -> Self {
        Self {
            status: NetworkStatus::Uninitialized,
            height: 0,
            blocks_indexed: 0,
            window: BlockWindow::new(),
            migrations: MigrationLedger::new(),
            pending_reorg: None,
            pending_migration: None,
        }
    }

    fn handle(
        &self,
        ctx: &NetworkConfig,
        command: &NetworkCommand,
    ) -> Result<Vec<NetworkEvent>, CoreError> {
        match command {
            NetworkCommand::InitNetwork { indexed_height, .. } => {
                if self.status != NetworkStatus::Uninitialized {
                    return Err(self.invalid(command));
                }
                tracing::info!(indexed_height, "Network initialized");
                Ok(vec![NetworkEvent::NetworkInitialized {
                    indexed_height: *indexed_height,
                }])
            }

            NetworkCommand::AddBlocksBatch { blocks, .. } => {
                if !self.accepts_blocks() {
                    return Err(self.invalid(command));
                }
                if blocks.is_empty() {
                    return Ok(vec![]);
                }
                verify_batch(blocks, self.expected_next_height(), ctx.chain)?;
                tracing::info!(
                    from = blocks[0].height,
                    to = blocks[blocks.len() - 1].height,
                    count = blocks.len(),
                    "Block batch accepted"
                );
                Ok(vec![NetworkEvent::NetworkBlocksAdded {
                    blocks: blocks.iter().map(BlockSummary::from).collect(),
                    status: NetworkStatus::Synchronized,
                }])
            }

            NetworkCommand::StartReorganisation {
                divergence_height, ..
            } => {
                // A second competing chain can arrive before any batch lands
                // on the replaced head.
                if !matches!(
                    self.status,
                    NetworkStatus::Synchronized | NetworkStatus::ReorganisationFinished
                ) {
                    return Err(self.invalid(command));
                }
                if *divergence_height > self.height {
                    return Err(self.invalid(command));
                }
                let retained_depth = ctx.max_reorg_depth.min(self.window.len() as u64);
                let depth = self.height - divergence_height + 1;
                // Genesis itself can never be replaced; anything deeper than
                // the retained window requires an external resync.
                if *divergence_height == 0
                    || depth > ctx.max_reorg_depth
                    || !self.window.contains(*divergence_height)
                {
                    tracing::error!(
                        divergence_height,
                        depth,
                        retained_depth,
                        "Unrecoverable reorganisation — external resync required"
                    );
                    return Err(CoreError::UnrecoverableReorganisation {
                        divergence_height: *divergence_height,
                        retained_depth,
                    });
                }

                let stale = self.window.from_height(*divergence_height);
                tracing::warn!(
                    divergence_height,
                    depth,
                    stale = stale.len(),
                    "Reorganisation started"
                );

                // Migrations applied on the stale suffix roll back newest
                // first, before the height itself rolls back.
                let mut events: Vec<NetworkEvent> = self
                    .migrations
                    .rollback_set(*divergence_height)
                    .into_iter()
                    .map(|record| NetworkEvent::SchemaUpdated {
                        up_queries: record.up_queries,
                        down_queries: record.down_queries,
                        status: NetworkStatus::ReorganisationStarted,
                    })
                    .collect();
                events.push(NetworkEvent::NetworkReorganisationStarted {
                    status: NetworkStatus::ReorganisationStarted,
                    blocks: stale,
                    height: *divergence_height,
                });
                Ok(events)
            }

            NetworkCommand::FinishReorganisation {
                replacement_blocks, ..
            } => {
                let Some(divergence) = self.pending_reorg else {
                    return Err(self.invalid(command));
                };
                if self.status != NetworkStatus::ReorganisationStarted
                    || replacement_blocks.is_empty()
                {
                    return Err(self.invalid(command));
                }
                verify_batch(replacement_blocks, divergence, ctx.chain)?;
                let new_height = replacement_blocks[replacement_blocks.len() - 1].height;
                tracing::warn!(
                    divergence,
                    new_height,
                    replacement = replacement_blocks.len(),
                    "Reorganisation finished"
                );
                Ok(vec![NetworkEvent::NetworkReorganisationFinished {
                    status: NetworkStatus::ReorganisationFinished,
                    height: new_height,
                    blocks: replacement_blocks.iter().map(BlockSummary::from).collect(),
                }])
            }

            NetworkCommand::StartSchemaMigration {
                up_queries,
                down_queries,
                ..
            } => {
                if !ctx.chain.supports_schema_migrations() {
                    return Err(self.invalid(command));
                }
                if !matches!(
                    self.status,
                    NetworkStatus::Synchronized | NetworkStatus::ReorganisationFinished
                ) {
                    return Err(self.invalid(command));
                }
                Ok(vec![NetworkEvent::SchemaUpMigrationStarted {
                    up_queries: up_queries.clone(),
                    down_queries: down_queries.clone(),
                    status: NetworkStatus::SchemaUpMigrationStarted,
                }])
            }

            NetworkCommand::CompleteSchemaMigration { .. } => {
                if self.status != NetworkStatus::SchemaUpMigrationStarted {
                    return Err(self.invalid(command));
                }
                let Some((up_queries, down_queries)) = self.pending_migration.clone() else {
                    return Err(self.invalid(command));
                };
                Ok(vec![NetworkEvent::SchemaUpdated {
                    up_queries,
                    down_queries,
                    status: NetworkStatus::SchemaUpdated,
                }])
            }

            NetworkCommand::FinalizeSchemaMigration { .. } => {
                if self.status != NetworkStatus::SchemaUpdated {
                    return Err(self.invalid(command));
                }
                let (up_queries, down_queries) = self
                    .migrations
                    .rollback_set(0)
                    .first()
                    .map(|r| (r.up_queries.clone(), r.down_queries.clone()))
                    .unwrap_or_default();
                Ok(vec![NetworkEvent::SchemaSynchronised {
                    up_queries,
                    down_queries,
                    status: NetworkStatus::SchemaSynchronised,
                }])
            }
        }
    }

    fn apply(mut self, event: &NetworkEvent) -> Self {
        match event {
            NetworkEvent::NetworkInitialized { indexed_height } => {
                self.status = NetworkStatus::Initialized;
                self.height = *indexed_height;
            }

            NetworkEvent::NetworkBlocksAdded { blocks, .. } => {
                for summary in blocks {
                    self.height = summary.height;
                    self.window.push(summary.clone());
                }
                self.blocks_indexed += blocks.len() as u64;
                self.status = NetworkStatus::Synchronized;
            }

            NetworkEvent::NetworkReorganisationStarted { height, .. } => {
                self.pending_reorg = Some(*height);
                // The stale suffix is discarded; divergence >= 1 is enforced
                // at decision time.
                self.window.rewind_to(height - 1);
                self.height = height - 1;
                self.status = NetworkStatus::ReorganisationStarted;
            }

            NetworkEvent::NetworkReorganisationFinished { height, blocks, .. } => {
                for summary in blocks {
                    self.window.push(summary.clone());
                }
                self.blocks_indexed += blocks.len() as u64;
                self.height = *height;
                self.pending_reorg = None;
                self.status = NetworkStatus::ReorganisationFinished;
            }

            NetworkEvent::SchemaUpMigrationStarted {
                up_queries,
                down_queries,
                ..
            } => {
                self.pending_migration = Some((up_queries.clone(), down_queries.clone()));
                self.status = NetworkStatus::SchemaUpMigrationStarted;
            }

            NetworkEvent::SchemaUpdated {
                up_queries,
                down_queries,
                status,
            } => {
                if *status == NetworkStatus::ReorganisationStarted {
                    // Rollback step emitted ahead of a reorganisation:
                    // migrations pop newest-first.
                    self.migrations.pop();
                } else {
                    self.migrations
                        .record(self.height, up_queries.clone(), down_queries.clone());
                    self.pending_migration = None;
                    self.status = NetworkStatus::SchemaUpdated;
                }
            }

            NetworkEvent::SchemaSynchronised { .. } => {
                self.status = NetworkStatus::Synchronized;
            }
        }
        self
    }
}
