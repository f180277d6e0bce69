//! Witness merkle root and coinbase witness-commitment verification.

use crate::block::Block;
use crate::error::MerkleError;
use crate::hash::{double_sha256, id_to_le_bytes, le_bytes_to_id, ZERO_HASH, ZERO_HASH_HEX};
use crate::root::fold_tree;

/// Script prefix of a witness-commitment output:
/// `OP_RETURN` (0x6a), push-36 (0x24), commitment header `0xaa21a9ed`.
const COMMITMENT_SCRIPT_PREFIX: &str = "6a24aa21a9ed";

/// Compute the witness merkle root over an ordered wtxid sequence.
///
/// Same tree as [`crate::compute_merkle_root`], except the first element —
/// the coinbase, whose wtxid is defined as zero — is always replaced with
/// the all-zero hash regardless of its actual value.
pub fn compute_witness_merkle_root<S: AsRef<str>>(wtxids: &[S]) -> Result<String, MerkleError> {
    if wtxids.is_empty() {
        return Ok(ZERO_HASH_HEX.to_string());
    }
    let mut leaves = Vec::with_capacity(wtxids.len());
    leaves.push(ZERO_HASH);
    for id in &wtxids[1..] {
        leaves.push(id_to_le_bytes(id.as_ref())?);
    }
    Ok(le_bytes_to_id(&fold_tree(leaves)))
}

/// Verify the coinbase witness commitment of `block`.
///
/// Locates the commitment output (`OP_RETURN 0xaa21a9ed <32 bytes>`) in the
/// coinbase, takes the last witness-stack item of the coinbase's final input
/// as the reserved value, and checks
/// `doubleSHA256(LE(witnessRoot) || reserved) == commitment`.
///
/// Returns `false` — never an error — when the pattern is absent or any
/// field is malformed.
pub fn verify_witness_commitment(block: &Block) -> bool {
    check_witness_commitment(block).unwrap_or(false)
}

fn check_witness_commitment(block: &Block) -> Option<bool> {
    let coinbase = block.coinbase()?;

    // The last matching output wins when several carry the prefix.
    let commitment_hex = coinbase
        .vout
        .iter()
        .rev()
        .map(|out| out.script_pubkey.to_ascii_lowercase())
        .find(|script| script.starts_with(COMMITMENT_SCRIPT_PREFIX) && script.len() >= 76)?;
    let commitment = hex::decode(&commitment_hex[12..76]).ok()?;

    let reserved_hex = coinbase.vin.last()?.txinwitness.last()?;
    let reserved = hex::decode(reserved_hex).ok()?;
    if reserved.len() != 32 {
        return Some(false);
    }

    let witness_root = compute_witness_merkle_root(&block.witness_ids()).ok()?;
    let root_le = id_to_le_bytes(&witness_root).ok()?;

    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&root_le);
    preimage[32..].copy_from_slice(&reserved);
    let recomputed = double_sha256(&preimage);

    Some(recomputed[..] == commitment[..])
}
