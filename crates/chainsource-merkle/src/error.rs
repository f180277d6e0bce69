//! Error types for merkle verification.

use thiserror::Error;

/// Errors produced while decoding hash identifiers.
#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("Malformed hash identifier '{id}': {reason}")]
    MalformedId { id: String, reason: String },
}

impl MerkleError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedId {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
