//! Error taxonomy shared by every aggregate.

use thiserror::Error;

/// Errors surfaced by command handling, replay, and the store contracts.
///
/// Recoverable errors leave the aggregate in its prior, valid state; fatal
/// ones halt the aggregate until external intervention (resync from a
/// checkpoint, log repair).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid state transition: {command} not accepted from state '{from}'")]
    InvalidStateTransition { from: String, command: String },

    #[error("Non-contiguous block height: expected {expected}, got {got}")]
    NonContiguousHeight { expected: u64, got: u64 },

    #[error("Merkle verification failed at height {height}: {reason}")]
    MerkleVerificationFailed { height: u64, reason: String },

    #[error(
        "Unrecoverable reorganisation: divergence at height {divergence_height} \
         exceeds the retained window of {retained_depth} blocks"
    )]
    UnrecoverableReorganisation {
        divergence_height: u64,
        retained_depth: u64,
    },

    #[error("Provider {provider} reported txid {txid} contradicting confirmed state")]
    ProviderMappingConflict { txid: String, provider: usize },

    #[error("Replay corruption in '{aggregate_id}': expected version {expected}, got {got}")]
    ReplayCorruption {
        aggregate_id: String,
        expected: u64,
        got: u64,
    },

    #[error("Append conflict on '{aggregate_id}': expected version {expected}, store at {actual}")]
    VersionConflict {
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Aggregate '{aggregate_id}' is halted: {reason}")]
    Halted { aggregate_id: String, reason: String },
}

impl CoreError {
    /// Returns `true` if the error halts the aggregate (no further commands
    /// accepted without external intervention).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnrecoverableReorganisation { .. } | Self::ReplayCorruption { .. }
        )
    }
}
