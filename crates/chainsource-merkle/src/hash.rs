//! Double-SHA-256 and byte-order conversion helpers.
//!
//! Chain identifiers (txid, wtxid, merkle root) are displayed as big-endian
//! hex but hashed in little-endian byte order. Both conversions live here so
//! the tree code never touches raw byte order directly.

use sha2::{Digest, Sha256};

use crate::error::MerkleError;

/// The defined root of an empty transaction set: 32 zero bytes.
pub const ZERO_HASH_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// The all-zero 32-byte hash in internal (byte-order-free) form.
pub const ZERO_HASH: [u8; 32] = [0u8; 32];

/// SHA-256 applied twice, the chain's standard node-combining hash.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Decode a big-endian hex identifier into little-endian bytes.
pub fn id_to_le_bytes(id: &str) -> Result<[u8; 32], MerkleError> {
    let raw = hex::decode(id).map_err(|e| MerkleError::malformed(id, e.to_string()))?;
    if raw.len() != 32 {
        return Err(MerkleError::malformed(
            id,
            format!("expected 32 bytes, got {}", raw.len()),
        ));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&raw);
    out.reverse();
    Ok(out)
}

/// Encode little-endian bytes back to a big-endian hex identifier.
pub fn le_bytes_to_id(bytes: &[u8; 32]) -> String {
    let mut be = *bytes;
    be.reverse();
    hex::encode(be)
}

/// Combine two little-endian tree nodes into their parent.
pub fn combine_nodes(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    double_sha256(&buf)
}
