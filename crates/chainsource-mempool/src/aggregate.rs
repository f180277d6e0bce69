//! The mempool aggregate — reconciles per-provider unconfirmed-transaction
//! views into one mapping and prunes it as blocks confirm.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use chainsource_core::{Aggregate, Command, CoreError, EventPayload};

use crate::policy::TrustPolicy;

/// How many processed batches of confirmed txids are remembered for
/// conflict detection against late provider reports.
const CONFIRMED_BATCHES_RETAINED: usize = 16;

/// Decision-time configuration for the mempool aggregate.
#[derive(Debug, Clone, Default)]
pub struct MempoolConfig {
    pub trust_policy: TrustPolicy,
}

/// A confirmed block reduced to what the mempool needs: its txids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedBlock {
    pub height: u64,
    pub txids: Vec<String>,
}

/// Commands accepted by the mempool aggregate. Provider views arrive as one
/// txid list per provider, indexed by position.
#[derive(Debug, Clone)]
pub enum MempoolCommand {
    InitializeMempool {
        request_id: String,
        provider_txids: Vec<Vec<String>>,
    },
    SyncMempool {
        request_id: String,
        provider_txids: Vec<Vec<String>>,
    },
    ProcessBlocksBatch {
        request_id: String,
        confirmed_blocks: Vec<ConfirmedBlock>,
    },
    ClearMempool {
        request_id: String,
    },
}

impl MempoolCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::InitializeMempool { .. } => "InitializeMempool",
            Self::SyncMempool { .. } => "SyncMempool",
            Self::ProcessBlocksBatch { .. } => "ProcessBlocksBatch",
            Self::ClearMempool { .. } => "ClearMempool",
        }
    }
}

impl Command for MempoolCommand {
    fn request_id(&self) -> &str {
        match self {
            Self::InitializeMempool { request_id, .. }
            | Self::SyncMempool { request_id, .. }
            | Self::ProcessBlocksBatch { request_id, .. }
            | Self::ClearMempool { request_id } => request_id,
        }
    }
}

/// Scalar summary of the mapping, carried inside `MempoolInitialized`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetadata {
    /// Distinct txids across all providers.
    pub txid_count: usize,
    /// Number of providers that contributed a view.
    pub provider_count: usize,
    /// Txids meeting the configured trust policy.
    pub trusted_txid_count: usize,
}

/// Events emitted by the mempool aggregate. Serialized field names are part
/// of the external wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum MempoolEvent {
    #[serde(rename_all = "camelCase")]
    MempoolInitialized {
        /// Txids accepted under the trust policy, in mapping order.
        all_txids_from_node: Vec<String>,
        is_synchronized: bool,
        provider_txid_mapping: BTreeMap<String, BTreeSet<usize>>,
        aggregated_metadata: AggregatedMetadata,
    },
    #[serde(rename_all = "camelCase")]
    MempoolSynchronized { is_synchronized: bool },
    #[serde(rename_all = "camelCase")]
    MempoolBlockBatchProcessed { txids_to_remove: Vec<String> },
    MempoolCleared {},
}

impl EventPayload for MempoolEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::MempoolInitialized { .. } => "MempoolInitialized",
            Self::MempoolSynchronized { .. } => "MempoolSynchronized",
            Self::MempoolBlockBatchProcessed { .. } => "MempoolBlockBatchProcessed",
            Self::MempoolCleared {} => "MempoolCleared",
        }
    }
}

/// Recently confirmed txids, batch-bucketed so retention is bounded and
/// deterministic under replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ConfirmedWindow {
    batches: VecDeque<BTreeSet<String>>,
}

impl ConfirmedWindow {
    fn push(&mut self, txids: BTreeSet<String>) {
        if self.batches.len() >= CONFIRMED_BATCHES_RETAINED {
            self.batches.pop_front();
        }
        self.batches.push_back(txids);
    }

    fn contains(&self, txid: &str) -> bool {
        self.batches.iter().any(|batch| batch.contains(txid))
    }

    fn clear(&mut self) {
        self.batches.clear();
    }
}

/// The materialized mempool state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolAggregate {
    provider_txid_mapping: BTreeMap<String, BTreeSet<usize>>,
    is_synchronized: bool,
    initialized: bool,
    confirmed: ConfirmedWindow,
}

impl MempoolAggregate {
    pub fn is_synchronized(&self) -> bool {
        self.is_synchronized
    }

    pub fn mapping(&self) -> &BTreeMap<String, BTreeSet<usize>> {
        &self.provider_txid_mapping
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.provider_txid_mapping.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.provider_txid_mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provider_txid_mapping.is_empty()
    }

    /// Txids meeting the trust policy, in mapping (lexicographic) order.
    pub fn trusted_txids(&self, policy: TrustPolicy, provider_count: usize) -> Vec<String> {
        self.provider_txid_mapping
            .iter()
            .filter(|(_, providers)| policy.accepts(providers.len(), provider_count))
            .map(|(txid, _)| txid.clone())
            .collect()
    }

    fn invalid(&self, command: &MempoolCommand) -> CoreError {
        let from = if self.initialized {
            "initialized"
        } else {
            "uninitialized"
        };
        CoreError::InvalidStateTransition {
            from: from.to_string(),
            command: command.name().to_string(),
        }
    }

    /// Union per-provider views into a mapping.
    fn build_mapping(provider_txids: &[Vec<String>]) -> BTreeMap<String, BTreeSet<usize>> {
        let mut mapping: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (provider, txids) in provider_txids.iter().enumerate() {
            for txid in txids {
                mapping.entry(txid.clone()).or_default().insert(provider);
            }
        }
        mapping
    }

    fn initialized_event(
        mapping: BTreeMap<String, BTreeSet<usize>>,
        provider_count: usize,
        policy: TrustPolicy,
        is_synchronized: bool,
    ) -> MempoolEvent {
        let trusted: Vec<String> = mapping
            .iter()
            .filter(|(_, providers)| policy.accepts(providers.len(), provider_count))
            .map(|(txid, _)| txid.clone())
            .collect();
        let metadata = AggregatedMetadata {
            txid_count: mapping.len(),
            provider_count,
            trusted_txid_count: trusted.len(),
        };
        MempoolEvent::MempoolInitialized {
            all_txids_from_node: trusted,
            is_synchronized,
            provider_txid_mapping: mapping,
            aggregated_metadata: metadata,
        }
    }
}

impl Aggregate for MempoolAggregate {
    type Command = MempoolCommand;
    type Event = MempoolEvent;
    type Context = MempoolConfig;

    const TYPE: &'static str = "mempool";

    fn initial() -> Self {
        Self::default()
    }

    fn handle(
        &self,
        ctx: &MempoolConfig,
        command: &MempoolCommand,
    ) -> Result<Vec<MempoolEvent>, CoreError> {
        match command {
            MempoolCommand::InitializeMempool { provider_txids, .. } => {
                if self.initialized {
                    return Err(self.invalid(command));
                }
                let mapping = Self::build_mapping(provider_txids);
                tracing::info!(
                    providers = provider_txids.len(),
                    txids = mapping.len(),
                    "Mempool initialized"
                );
                Ok(vec![Self::initialized_event(
                    mapping,
                    provider_txids.len(),
                    ctx.trust_policy,
                    false,
                )])
            }

            MempoolCommand::SyncMempool { provider_txids, .. } => {
                if !self.initialized {
                    return Err(self.invalid(command));
                }
                let mapping = Self::build_mapping(provider_txids);

                // A provider re-reporting a txid we saw confirmed is a
                // contradiction, not a late view.
                for (txid, providers) in &mapping {
                    if self.confirmed.contains(txid) {
                        let provider = providers.iter().next().copied().unwrap_or(0);
                        tracing::warn!(%txid, provider, "Provider re-reported a confirmed txid");
                        return Err(CoreError::ProviderMappingConflict {
                            txid: txid.clone(),
                            provider,
                        });
                    }
                }

                if mapping == self.provider_txid_mapping {
                    // Full polling cycle with no pending divergence.
                    Ok(vec![MempoolEvent::MempoolSynchronized {
                        is_synchronized: true,
                    }])
                } else {
                    tracing::debug!(
                        before = self.provider_txid_mapping.len(),
                        after = mapping.len(),
                        "Mempool divergence reconciled"
                    );
                    // Only `MempoolInitialized` carries the full mapping; the
                    // trailing `MempoolSynchronized{false}` marks this as a
                    // resync rather than a first initialization.
                    Ok(vec![
                        Self::initialized_event(
                            mapping,
                            provider_txids.len(),
                            ctx.trust_policy,
                            false,
                        ),
                        MempoolEvent::MempoolSynchronized {
                            is_synchronized: false,
                        },
                    ])
                }
            }

            MempoolCommand::ProcessBlocksBatch {
                confirmed_blocks, ..
            } => {
                if !self.initialized {
                    return Err(self.invalid(command));
                }
                let mut txids_to_remove = Vec::new();
                for block in confirmed_blocks {
                    for txid in &block.txids {
                        if self.contains(txid) && !txids_to_remove.contains(txid) {
                            txids_to_remove.push(txid.clone());
                        }
                    }
                }
                tracing::info!(
                    blocks = confirmed_blocks.len(),
                    pruned = txids_to_remove.len(),
                    "Confirmed block batch processed"
                );
                Ok(vec![MempoolEvent::MempoolBlockBatchProcessed {
                    txids_to_remove,
                }])
            }

            MempoolCommand::ClearMempool { .. } => {
                tracing::info!(dropped = self.len(), "Mempool cleared");
                Ok(vec![MempoolEvent::MempoolCleared {}])
            }
        }
    }

    fn apply(mut self, event: &MempoolEvent) -> Self {
        match event {
            MempoolEvent::MempoolInitialized {
                is_synchronized,
                provider_txid_mapping,
                ..
            } => {
                self.provider_txid_mapping = provider_txid_mapping.clone();
                self.is_synchronized = *is_synchronized;
                self.initialized = true;
            }
            MempoolEvent::MempoolSynchronized { is_synchronized } => {
                self.is_synchronized = *is_synchronized;
            }
            MempoolEvent::MempoolBlockBatchProcessed { txids_to_remove } => {
                for txid in txids_to_remove {
                    self.provider_txid_mapping.remove(txid);
                }
                self.confirmed
                    .push(txids_to_remove.iter().cloned().collect());
            }
            MempoolEvent::MempoolCleared {} => {
                self.provider_txid_mapping.clear();
                self.confirmed.clear();
                self.is_synchronized = false;
                self.initialized = false;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(tag: u8) -> String {
        format!("{tag:02x}").repeat(32)
    }

    fn run(
        state: MempoolAggregate,
        ctx: &MempoolConfig,
        command: MempoolCommand,
    ) -> Result<(MempoolAggregate, Vec<MempoolEvent>), CoreError> {
        let events = state.handle(ctx, &command)?;
        let mut next = state;
        for event in &events {
            next = next.apply(event);
        }
        Ok((next, events))
    }

    fn initialized(ctx: &MempoolConfig, views: Vec<Vec<String>>) -> MempoolAggregate {
        let (state, _) = run(
            MempoolAggregate::initial(),
            ctx,
            MempoolCommand::InitializeMempool {
                request_id: "init".into(),
                provider_txids: views,
            },
        )
        .unwrap();
        state
    }

    #[test]
    fn initialize_unions_provider_views() {
        let ctx = MempoolConfig::default();
        let state = initialized(
            &ctx,
            vec![vec![txid(1), txid(2)], vec![txid(2), txid(3)]],
        );
        assert_eq!(state.len(), 3);
        assert_eq!(
            state.mapping()[&txid(2)],
            BTreeSet::from([0usize, 1usize])
        );
        assert!(!state.is_synchronized());
    }

    #[test]
    fn double_initialize_is_rejected() {
        let ctx = MempoolConfig::default();
        let state = initialized(&ctx, vec![vec![txid(1)]]);
        let err = state
            .handle(
                &ctx,
                &MempoolCommand::InitializeMempool {
                    request_id: "again".into(),
                    provider_txids: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn quorum_policy_filters_trusted_txids() {
        let ctx = MempoolConfig {
            trust_policy: TrustPolicy::Quorum(2),
        };
        let state = initialized(
            &ctx,
            vec![vec![txid(1), txid(2)], vec![txid(2)]],
        );
        // Mapping keeps every report; the policy gates what counts as known.
        assert_eq!(state.len(), 2);
        assert_eq!(state.trusted_txids(TrustPolicy::Quorum(2), 2), vec![txid(2)]);
    }

    #[test]
    fn sync_without_divergence_synchronizes() {
        let ctx = MempoolConfig::default();
        let views = vec![vec![txid(1)], vec![txid(2)]];
        let state = initialized(&ctx, views.clone());
        let (state, events) = run(
            state,
            &ctx,
            MempoolCommand::SyncMempool {
                request_id: "sync".into(),
                provider_txids: views,
            },
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            MempoolEvent::MempoolSynchronized {
                is_synchronized: true
            }
        ));
        assert!(state.is_synchronized());
    }

    #[test]
    fn sync_with_divergence_reconciles_mapping() {
        let ctx = MempoolConfig::default();
        let state = initialized(&ctx, vec![vec![txid(1)]]);
        let (state, events) = run(
            state,
            &ctx,
            MempoolCommand::SyncMempool {
                request_id: "sync".into(),
                provider_txids: vec![vec![txid(1), txid(4)]],
            },
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MempoolEvent::MempoolInitialized { .. }));
        assert!(matches!(
            events[1],
            MempoolEvent::MempoolSynchronized {
                is_synchronized: false
            }
        ));
        assert_eq!(state.len(), 2);
        assert!(!state.is_synchronized());
    }

    #[test]
    fn process_batch_prunes_only_confirmed() {
        let ctx = MempoolConfig::default();
        let state = initialized(&ctx, vec![vec![txid(1), txid(2), txid(3)]]);
        let (state, events) = run(
            state,
            &ctx,
            MempoolCommand::ProcessBlocksBatch {
                request_id: "blocks".into(),
                confirmed_blocks: vec![ConfirmedBlock {
                    height: 100,
                    // txid(9) was never in the mempool; it must not appear
                    // in the removal set.
                    txids: vec![txid(2), txid(9)],
                }],
            },
        )
        .unwrap();
        let MempoolEvent::MempoolBlockBatchProcessed { txids_to_remove } = &events[0] else {
            panic!("expected MempoolBlockBatchProcessed");
        };
        assert_eq!(txids_to_remove, &vec![txid(2)]);
        assert!(!state.contains(&txid(2)));
        assert!(state.contains(&txid(1)));
        assert!(state.contains(&txid(3)));
    }

    #[test]
    fn confirmed_txid_re_report_is_a_conflict() {
        let ctx = MempoolConfig::default();
        let state = initialized(&ctx, vec![vec![txid(1), txid(2)]]);
        let (state, _) = run(
            state,
            &ctx,
            MempoolCommand::ProcessBlocksBatch {
                request_id: "blocks".into(),
                confirmed_blocks: vec![ConfirmedBlock {
                    height: 5,
                    txids: vec![txid(2)],
                }],
            },
        )
        .unwrap();

        let err = state
            .handle(
                &ctx,
                &MempoolCommand::SyncMempool {
                    request_id: "late".into(),
                    provider_txids: vec![vec![txid(1), txid(2)]],
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ProviderMappingConflict { .. }
        ));
        assert!(!err.is_fatal());
        // Prior state is intact.
        assert!(state.contains(&txid(1)));
    }

    #[test]
    fn clear_empties_unconditionally() {
        let ctx = MempoolConfig::default();
        let state = initialized(&ctx, vec![vec![txid(1), txid(2)]]);
        let (state, events) = run(
            state,
            &ctx,
            MempoolCommand::ClearMempool {
                request_id: "clear".into(),
            },
        )
        .unwrap();
        assert!(matches!(events[0], MempoolEvent::MempoolCleared {}));
        assert!(state.is_empty());
        assert!(!state.is_synchronized());
    }

    #[test]
    fn initialized_wire_shape() {
        let ctx = MempoolConfig::default();
        let state = MempoolAggregate::initial();
        let events = state
            .handle(
                &ctx,
                &MempoolCommand::InitializeMempool {
                    request_id: "init".into(),
                    provider_txids: vec![vec![txid(7)]],
                },
            )
            .unwrap();
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "MempoolInitialized");
        let payload = &json["payload"];
        assert_eq!(payload["allTxidsFromNode"][0], txid(7));
        assert_eq!(payload["isSynchronized"], false);
        assert!(payload["providerTxidMapping"].is_object());
        assert_eq!(payload["aggregatedMetadata"]["txidCount"], 1);
        assert_eq!(payload["aggregatedMetadata"]["providerCount"], 1);
    }
}
