//! Cross-aggregate sequencing: network commits before mempool prunes.

use chainsource_core::CoreError;
use chainsource_merkle::Block;
use chainsource_mempool::{ConfirmedBlock, MempoolAggregate, MempoolCommand};
use chainsource_network::{NetworkAggregate, NetworkCommand};

use crate::executor::AggregateHandle;

/// Drives the two aggregates in the one order that keeps them consistent:
/// the network commit for a block batch is durable before the mempool prune
/// for the same blocks runs. A crash between the two leaves the mempool
/// stale (still holding confirmed txids) but never incorrect.
pub struct Pipeline {
    network: AggregateHandle<NetworkAggregate>,
    mempool: AggregateHandle<MempoolAggregate>,
}

impl Pipeline {
    pub fn new(
        network: AggregateHandle<NetworkAggregate>,
        mempool: AggregateHandle<MempoolAggregate>,
    ) -> Self {
        Self { network, mempool }
    }

    pub fn network(&self) -> &AggregateHandle<NetworkAggregate> {
        &self.network
    }

    pub fn mempool(&self) -> &AggregateHandle<MempoolAggregate> {
        &self.mempool
    }

    /// Initialize both aggregates.
    pub async fn init(
        &self,
        request_id: &str,
        indexed_height: u64,
        provider_txids: Vec<Vec<String>>,
    ) -> Result<(), CoreError> {
        self.network
            .execute(NetworkCommand::InitNetwork {
                request_id: request_id.to_string(),
                indexed_height,
            })
            .await?;
        self.mempool
            .execute(MempoolCommand::InitializeMempool {
                request_id: request_id.to_string(),
                provider_txids,
            })
            .await?;
        Ok(())
    }

    /// Accept a verified block batch, then prune the newly confirmed txids
    /// from the mempool.
    pub async fn ingest_batch(&self, request_id: &str, blocks: Vec<Block>) -> Result<(), CoreError> {
        let confirmed = confirmed_view(&blocks);
        self.network
            .execute(NetworkCommand::AddBlocksBatch {
                request_id: request_id.to_string(),
                blocks,
            })
            .await?;
        // Network commit is durable from here; the prune may lag but the
        // mempool can only be stale, not wrong.
        self.mempool
            .execute(MempoolCommand::ProcessBlocksBatch {
                request_id: request_id.to_string(),
                confirmed_blocks: confirmed,
            })
            .await?;
        Ok(())
    }

    /// Run a reorganisation end to end: record the stale suffix, verify and
    /// accept the replacement blocks, prune their txids from the mempool.
    ///
    /// An unrecoverable divergence clears the mempool (a full resync will
    /// rebuild it) and surfaces the fatal error to the caller.
    pub async fn reorganize(
        &self,
        request_id: &str,
        divergence_height: u64,
        replacement_blocks: Vec<Block>,
    ) -> Result<(), CoreError> {
        let confirmed = confirmed_view(&replacement_blocks);

        let started = self
            .network
            .execute(NetworkCommand::StartReorganisation {
                request_id: request_id.to_string(),
                divergence_height,
            })
            .await;
        if let Err(e) = started {
            if e.is_fatal() {
                tracing::error!(
                    divergence_height,
                    error = %e,
                    "Unrecoverable reorganisation — clearing mempool for resync"
                );
                self.mempool
                    .execute(MempoolCommand::ClearMempool {
                        request_id: request_id.to_string(),
                    })
                    .await?;
            }
            return Err(e);
        }

        self.network
            .execute(NetworkCommand::FinishReorganisation {
                request_id: request_id.to_string(),
                replacement_blocks,
            })
            .await?;
        self.mempool
            .execute(MempoolCommand::ProcessBlocksBatch {
                request_id: request_id.to_string(),
                confirmed_blocks: confirmed,
            })
            .await?;
        Ok(())
    }

    /// Reconcile the mempool against fresh provider views.
    pub async fn sync_mempool(
        &self,
        request_id: &str,
        provider_txids: Vec<Vec<String>>,
    ) -> Result<bool, CoreError> {
        self.mempool
            .execute(MempoolCommand::SyncMempool {
                request_id: request_id.to_string(),
                provider_txids,
            })
            .await?;
        Ok(self.mempool.state().await?.state.is_synchronized())
    }
}

/// Reduce full blocks to the mempool's view: heights and txids.
fn confirmed_view(blocks: &[Block]) -> Vec<ConfirmedBlock> {
    blocks
        .iter()
        .map(|block| ConfirmedBlock {
            height: block.height,
            txids: block.tx.iter().map(|tx| tx.txid.clone()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RuntimeBuilder;
    use chainsource_core::CoreError;
    use chainsource_merkle::Transaction;
    use chainsource_network::NetworkStatus;

    fn block(height: u64, tag: u8) -> Block {
        let txid = format!("{tag:02x}").repeat(32);
        Block {
            height,
            hash: format!("{height:060x}{tag:04x}"),
            merkleroot: txid.clone(),
            tx: vec![Transaction {
                txid,
                ..Default::default()
            }],
        }
    }

    fn txid(tag: u8) -> String {
        format!("{tag:02x}").repeat(32)
    }

    #[tokio::test]
    async fn batch_confirmations_prune_the_mempool() {
        let pipeline = RuntimeBuilder::new().max_reorg_depth(8).build();
        pipeline
            .init("init", 0, vec![vec![txid(0), txid(1), txid(9)]])
            .await
            .unwrap();

        pipeline
            .ingest_batch("batch", vec![block(0, 0), block(1, 1)])
            .await
            .unwrap();

        let network = pipeline.network().state().await.unwrap();
        assert_eq!(network.state.height(), 1);
        assert_eq!(network.state.status(), NetworkStatus::Synchronized);

        let mempool = pipeline.mempool().state().await.unwrap();
        assert!(!mempool.state.contains(&txid(0)));
        assert!(!mempool.state.contains(&txid(1)));
        assert!(mempool.state.contains(&txid(9))); // still unconfirmed
    }

    #[tokio::test]
    async fn rejected_batch_leaves_mempool_untouched() {
        let pipeline = RuntimeBuilder::new().build();
        pipeline
            .init("init", 0, vec![vec![txid(3)]])
            .await
            .unwrap();
        pipeline.ingest_batch("b0", vec![block(0, 0)]).await.unwrap();

        // Gap: height jumps 1 → 3.
        let err = pipeline
            .ingest_batch("gap", vec![block(3, 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NonContiguousHeight { .. }));

        let mempool = pipeline.mempool().state().await.unwrap();
        assert!(mempool.state.contains(&txid(3)));
    }

    #[tokio::test]
    async fn reorganisation_replaces_suffix_and_prunes() {
        let pipeline = RuntimeBuilder::new().max_reorg_depth(8).build();
        pipeline
            .init("init", 0, vec![vec![txid(0x44)]])
            .await
            .unwrap();
        pipeline
            .ingest_batch("b", vec![block(0, 0), block(1, 1), block(2, 2)])
            .await
            .unwrap();

        pipeline
            .reorganize("reorg", 2, vec![block(2, 0x44), block(3, 0x55)])
            .await
            .unwrap();

        let network = pipeline.network().state().await.unwrap();
        assert_eq!(network.state.height(), 3);
        let mempool = pipeline.mempool().state().await.unwrap();
        assert!(!mempool.state.contains(&txid(0x44))); // confirmed by replacement
    }

    #[tokio::test]
    async fn unrecoverable_reorg_halts_network_and_clears_mempool() {
        let pipeline = RuntimeBuilder::new().max_reorg_depth(2).build();
        pipeline
            .init("init", 0, vec![vec![txid(7)]])
            .await
            .unwrap();
        let blocks: Vec<Block> = (0..6).map(|h| block(h, h as u8)).collect();
        pipeline.ingest_batch("b", blocks).await.unwrap();

        let err = pipeline
            .reorganize("deep", 1, vec![block(1, 0x11)])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(pipeline.network().is_halted().await);

        let mempool = pipeline.mempool().state().await.unwrap();
        assert!(mempool.state.is_empty());

        // Further network commands are refused until external intervention.
        let refused = pipeline.ingest_batch("more", vec![block(6, 6)]).await;
        assert!(matches!(refused, Err(CoreError::Halted { .. })));
    }
}
