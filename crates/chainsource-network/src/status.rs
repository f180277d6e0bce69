//! Network status and chain-kind enums.

use serde::{Deserialize, Serialize};

/// The lifecycle status of the network aggregate.
///
/// Serialized into every network event's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkStatus {
    /// No `NetworkInitialized` event has been applied yet.
    Uninitialized,
    /// Initialized at a height; no block batch accepted yet.
    Initialized,
    /// Tracking the canonical chain head.
    Synchronized,
    /// A competing chain was reported; stale blocks recorded.
    ReorganisationStarted,
    /// Replacement blocks accepted; head moved to the new chain.
    ReorganisationFinished,
    /// A schema migration batch has been announced.
    SchemaUpMigrationStarted,
    /// Migration queries recorded against the current height.
    SchemaUpdated,
    /// Migration finalized; equivalent to synchronized.
    SchemaSynchronised,
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Synchronized => write!(f, "synchronized"),
            Self::ReorganisationStarted => write!(f, "reorganisation-started"),
            Self::ReorganisationFinished => write!(f, "reorganisation-finished"),
            Self::SchemaUpMigrationStarted => write!(f, "schema-up-migration-started"),
            Self::SchemaUpdated => write!(f, "schema-updated"),
            Self::SchemaSynchronised => write!(f, "schema-synchronised"),
        }
    }
}

/// The ledger model of the indexed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainKind {
    /// UTXO-style chain: witness commitments verified when present.
    Utxo,
    /// Account-style chain: schema migrations tied to indexed height.
    Account,
}

impl ChainKind {
    /// Whether blocks of this chain carry a coinbase witness commitment.
    pub fn verifies_witness(&self) -> bool {
        matches!(self, Self::Utxo)
    }

    /// Whether this chain requires height-coupled schema migrations.
    pub fn supports_schema_migrations(&self) -> bool {
        matches!(self, Self::Account)
    }
}
