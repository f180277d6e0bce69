//! chainsource-merkle — stateless cryptographic verification of transaction
//! sets against a claimed merkle root or witness commitment.
//!
//! # Architecture
//!
//! ```text
//! Block (JSON-shaped, hex identifiers in display order)
//!    ├── root::verify_block_merkle_root     (txid tree vs. header root)
//!    ├── root::verify_genesis_merkle_root   (height-0 single-tx rule)
//!    └── witness::verify_witness_commitment (wtxid tree vs. coinbase output)
//! ```
//!
//! All identifiers cross the API as big-endian hex strings — the chain's
//! canonical display order. Every function converts to little-endian bytes
//! internally and re-reverses on the way out; a missed reversal produces a
//! plausible-looking but wrong 32-byte hash, which is why the conversion
//! helpers live in one place ([`hash`]).

pub mod block;
pub mod error;
pub mod hash;
pub mod root;
pub mod witness;

pub use block::{Block, Transaction, TxInput, TxOutput};
pub use error::MerkleError;
pub use hash::{double_sha256, ZERO_HASH_HEX};
pub use root::{
    compute_merkle_root, verify_block_merkle_root, verify_genesis_merkle_root, verify_merkle_root,
};
pub use witness::{compute_witness_merkle_root, verify_witness_commitment};
