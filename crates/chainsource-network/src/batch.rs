//! Whole-batch block verification: height contiguity plus merkle and
//! witness checks. A batch is accepted or rejected as a unit.

use chainsource_core::CoreError;
use chainsource_merkle::{
    verify_block_merkle_root, verify_genesis_merkle_root, verify_witness_commitment, Block,
};

use crate::status::ChainKind;

/// Verify a block batch against the expected starting height.
///
/// Checks, in order:
/// 1. Heights are strictly `expected_start, expected_start + 1, …` —
///    a gap or duplicate anywhere fails the whole batch with
///    [`CoreError::NonContiguousHeight`].
/// 2. Every block's merkle root; the genesis rule additionally at height 0;
///    the witness commitment for witness-capable chains when the block
///    carries witness data. Any failure is
///    [`CoreError::MerkleVerificationFailed`] for the whole batch.
pub fn verify_batch(
    blocks: &[Block],
    expected_start: u64,
    chain: ChainKind,
) -> Result<(), CoreError> {
    let mut expected = expected_start;
    for block in blocks {
        if block.height != expected {
            return Err(CoreError::NonContiguousHeight {
                expected,
                got: block.height,
            });
        }
        expected += 1;
    }

    for block in blocks {
        if block.height == 0 && !verify_genesis_merkle_root(block) {
            return Err(verification_failure(block, "genesis merkle rule violated"));
        }
        match verify_block_merkle_root(block) {
            Ok(true) => {}
            Ok(false) => {
                return Err(verification_failure(block, "merkle root mismatch"));
            }
            Err(e) => {
                return Err(verification_failure(block, &e.to_string()));
            }
        }
        if chain.verifies_witness()
            && block.has_witness_data()
            && !verify_witness_commitment(block)
        {
            return Err(verification_failure(block, "witness commitment mismatch"));
        }
    }
    Ok(())
}

fn verification_failure(block: &Block, reason: &str) -> CoreError {
    tracing::warn!(
        height = block.height,
        hash = %block.hash,
        reason,
        "Block verification failed — rejecting batch"
    );
    CoreError::MerkleVerificationFailed {
        height: block.height,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsource_merkle::Transaction;

    const ID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn single_tx_block(height: u64) -> Block {
        // One transaction: the merkle root is the txid itself.
        Block {
            height,
            hash: format!("{height:064x}"),
            merkleroot: ID.to_string(),
            tx: vec![Transaction {
                txid: ID.to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn contiguous_valid_batch_passes() {
        let blocks = vec![single_tx_block(5), single_tx_block(6), single_tx_block(7)];
        assert!(verify_batch(&blocks, 5, ChainKind::Utxo).is_ok());
    }

    #[test]
    fn height_gap_rejects_whole_batch() {
        let blocks = vec![single_tx_block(5), single_tx_block(7)];
        let err = verify_batch(&blocks, 5, ChainKind::Utxo).unwrap_err();
        assert!(matches!(
            err,
            CoreError::NonContiguousHeight {
                expected: 6,
                got: 7
            }
        ));
    }

    #[test]
    fn duplicate_height_rejects_whole_batch() {
        let blocks = vec![single_tx_block(5), single_tx_block(5)];
        assert!(verify_batch(&blocks, 5, ChainKind::Utxo).is_err());
    }

    #[test]
    fn one_bad_root_rejects_whole_batch() {
        let mut bad = single_tx_block(6);
        bad.merkleroot = "bb".repeat(32);
        let blocks = vec![single_tx_block(5), bad, single_tx_block(7)];
        let err = verify_batch(&blocks, 5, ChainKind::Utxo).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MerkleVerificationFailed { height: 6, .. }
        ));
    }

    #[test]
    fn genesis_rule_enforced_at_height_zero() {
        let mut genesis = single_tx_block(0);
        genesis.tx.push(Transaction {
            txid: "bb".repeat(32),
            ..Default::default()
        });
        // Two transactions at height 0 violate the genesis rule regardless
        // of what the tree computes.
        let err = verify_batch(&[genesis], 0, ChainKind::Utxo).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MerkleVerificationFailed { height: 0, .. }
        ));
    }

    #[test]
    fn valid_genesis_passes() {
        let blocks = vec![single_tx_block(0)];
        assert!(verify_batch(&blocks, 0, ChainKind::Utxo).is_ok());
    }
}
