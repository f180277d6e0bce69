//! Merkle root computation and block-level root verification.

use crate::block::Block;
use crate::error::MerkleError;
use crate::hash::{combine_nodes, id_to_le_bytes, le_bytes_to_id, ZERO_HASH_HEX};

/// Compute the merkle root of an ordered identifier sequence.
///
/// Identifiers are big-endian hex; the result is big-endian hex.
/// An empty sequence yields the all-zero root; a single identifier is its
/// own root, unchanged.
pub fn compute_merkle_root<S: AsRef<str>>(ids: &[S]) -> Result<String, MerkleError> {
    if ids.is_empty() {
        return Ok(ZERO_HASH_HEX.to_string());
    }
    let leaves = ids
        .iter()
        .map(|id| id_to_le_bytes(id.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(le_bytes_to_id(&fold_tree(leaves)))
}

/// Fold little-endian leaves up to a single root node.
///
/// A level with an odd count duplicates its last element.
pub(crate) fn fold_tree(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                combine_nodes(left, right)
            })
            .collect();
    }
    level[0]
}

/// Recompute the root of `ids` and compare against `claimed` (hex,
/// case-insensitive). The empty-set / all-zero pair verifies as `true`.
pub fn verify_merkle_root<S: AsRef<str>>(ids: &[S], claimed: &str) -> Result<bool, MerkleError> {
    let computed = compute_merkle_root(ids)?;
    Ok(computed.eq_ignore_ascii_case(claimed))
}

/// Verify a block's declared merkle root against its transaction ids.
pub fn verify_block_merkle_root(block: &Block) -> Result<bool, MerkleError> {
    verify_merkle_root(&block.txids(), &block.merkleroot)
}

/// Verify the genesis rule: height 0 with exactly one transaction whose id
/// equals the declared merkle root.
pub fn verify_genesis_merkle_root(block: &Block) -> bool {
    block.height == 0
        && block.tx.len() == 1
        && block.tx[0].txid.eq_ignore_ascii_case(&block.merkleroot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Transaction;
    use proptest::prelude::*;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const C: &str = "cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";

    #[test]
    fn empty_set_is_zero_root() {
        assert_eq!(compute_merkle_root::<&str>(&[]).unwrap(), ZERO_HASH_HEX);
        assert!(verify_merkle_root::<&str>(&[], ZERO_HASH_HEX).unwrap());
    }

    #[test]
    fn single_id_is_its_own_root() {
        assert_eq!(compute_merkle_root(&[A]).unwrap(), A);
    }

    #[test]
    fn two_leaf_fixture() {
        // Hand-computed: dsha256(LE(A) || LE(B)), re-reversed.
        assert_eq!(
            compute_merkle_root(&[A, B]).unwrap(),
            "fb76b78e0fae95e9804262321cd913f27a1f41b799f3b0b7b93f37393b0d9d49"
        );
    }

    #[test]
    fn odd_level_duplicates_last_leaf() {
        // Hand-computed three-leaf tree; duplicating C makes it explicit.
        let three = compute_merkle_root(&[A, B, C]).unwrap();
        let four = compute_merkle_root(&[A, B, C, C]).unwrap();
        assert_eq!(
            three,
            "1946e9d4a203723d7d7464f5d158c3f411c7ba5c82014d97342e447f8326f2d6"
        );
        assert_eq!(three, four);
    }

    #[test]
    fn mainnet_block_100000() {
        // Bitcoin block 100000: four transactions, well-known root.
        let ids = [
            "8c14f0db3df150123e6f3dbbf30f8b955a8249b62ac1d1ff16284aefa3d06d87",
            "fff2525b8931402dd09222c50775608f75787bd2b87e56995a7bdd30f79702c4",
            "6359f0868171b1d194cbee1af2f16ea598ae8fad666d9b012c8ed2b79a236ec4",
            "e9a66845e05d5abc0ad04ec80f774a7e585c6e8db975962d069a522137b80c1d",
        ];
        let root = "f3e94742aca4b5ef85488dc37c06c3282295ffec960994b2c0d5ac2a25a95766";
        assert_eq!(compute_merkle_root(&ids).unwrap(), root);
        assert!(verify_merkle_root(&ids, &root.to_uppercase()).unwrap());
    }

    #[test]
    fn malformed_id_is_an_error() {
        assert!(compute_merkle_root(&["nothex"]).is_err());
    }

    fn genesis_block(txids: &[&str], merkleroot: &str, height: u64) -> Block {
        Block {
            height,
            hash: "00".repeat(32),
            merkleroot: merkleroot.to_string(),
            tx: txids
                .iter()
                .map(|id| Transaction {
                    txid: id.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn genesis_single_tx_matches_root() {
        let block = genesis_block(&[A], A, 0);
        assert!(verify_genesis_merkle_root(&block));
        assert!(verify_block_merkle_root(&block).unwrap());
    }

    #[test]
    fn genesis_rejects_two_txs() {
        let block = genesis_block(&[A, B], A, 0);
        assert!(!verify_genesis_merkle_root(&block));
    }

    #[test]
    fn genesis_rejects_nonzero_height() {
        let block = genesis_block(&[A], A, 1);
        assert!(!verify_genesis_merkle_root(&block));
    }

    proptest! {
        #[test]
        fn roundtrip_property(raw in prop::collection::vec(prop::array::uniform32(any::<u8>()), 1..32)) {
            let ids: Vec<String> = raw.iter().map(hex::encode).collect();
            let root = compute_merkle_root(&ids).unwrap();
            prop_assert!(verify_merkle_root(&ids, &root).unwrap());
        }

        #[test]
        fn root_is_order_sensitive(a in prop::array::uniform32(any::<u8>()), b in prop::array::uniform32(any::<u8>())) {
            prop_assume!(a != b);
            let ab = compute_merkle_root(&[hex::encode(a), hex::encode(b)]).unwrap();
            let ba = compute_merkle_root(&[hex::encode(b), hex::encode(a)]).unwrap();
            prop_assert_ne!(ab, ba);
        }
    }
}
