//! Block and transaction types — the verification input model.
//!
//! Field names follow the node RPC wire shape (`txid`, `wtxid`, `vin`,
//! `vout`, `txinwitness`, `scriptPubKey`), so a block fetched as JSON
//! deserializes directly into [`Block`].

use serde::{Deserialize, Serialize};

/// A transaction input. Only the witness stack matters for verification;
/// everything else is opaque to this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Witness stack items as hex strings (empty for non-segwit inputs).
    #[serde(default)]
    pub txinwitness: Vec<String>,
}

/// A transaction output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// The locking script as a hex string.
    #[serde(rename = "scriptPubKey", default)]
    pub script_pubkey: String,
}

/// A transaction as it appears inside a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier (big-endian hex).
    pub txid: String,
    /// Witness-inclusive identifier; `None` when the chain or the
    /// serialization predates witnesses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wtxid: Option<String>,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// The identifier used in the witness tree: wtxid when present,
    /// otherwise the txid (non-segwit transactions hash identically).
    pub fn witness_id(&self) -> &str {
        self.wtxid.as_deref().unwrap_or(&self.txid)
    }
}

/// A block as handed to the verification engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    pub height: u64,
    /// Block hash (big-endian hex).
    pub hash: String,
    /// Declared merkle root from the block header (big-endian hex).
    pub merkleroot: String,
    /// Ordered transaction list; index 0 is the coinbase.
    #[serde(default)]
    pub tx: Vec<Transaction>,
}

impl Block {
    /// All transaction ids in block order.
    pub fn txids(&self) -> Vec<&str> {
        self.tx.iter().map(|t| t.txid.as_str()).collect()
    }

    /// All witness ids in block order (txid fallback for non-segwit txs).
    pub fn witness_ids(&self) -> Vec<&str> {
        self.tx.iter().map(|t| t.witness_id()).collect()
    }

    /// The coinbase transaction, if the block has any transactions.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.tx.first()
    }

    /// Returns `true` if any transaction carries a distinct wtxid,
    /// i.e. the block commits to witness data.
    pub fn has_witness_data(&self) -> bool {
        self.tx.iter().any(|t| t.wtxid.is_some())
    }
}
