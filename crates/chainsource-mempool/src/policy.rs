//! Provider trust policy — when is a reported transaction "known"?

use serde::{Deserialize, Serialize};

/// Rule for how many independent providers must report a txid before it is
/// trusted as a known mempool transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustPolicy {
    /// A single provider's report is enough (the default).
    AnyProvider,
    /// At least `n` providers must agree; clamped to the provider count, so
    /// `Quorum(3)` with two configured providers means both must agree.
    Quorum(usize),
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::AnyProvider
    }
}

impl TrustPolicy {
    /// Whether `reports` provider reports out of `provider_count` satisfy
    /// the policy.
    pub fn accepts(&self, reports: usize, provider_count: usize) -> bool {
        let required = match self {
            Self::AnyProvider => 1,
            Self::Quorum(n) => (*n).clamp(1, provider_count.max(1)),
        };
        reports >= required
    }
}
