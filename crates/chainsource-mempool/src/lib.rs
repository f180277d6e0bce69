//! chainsource-mempool — multi-provider unconfirmed-transaction
//! reconciliation.
//!
//! # Architecture
//!
//! ```text
//! provider poll results ──► MempoolCommand ──► MempoolAggregate::handle
//!                                                    ├── TrustPolicy (any / quorum)
//!                                                    └── confirmed-txid window
//!                           MempoolEvent ──► MempoolAggregate::apply
//! ```
//!
//! The mempool never decides what is confirmed on its own: confirmation
//! arrives as `ProcessBlocksBatch` commands sequenced by the caller after the
//! network aggregate's commit for the same blocks is durable. A crash between
//! the two leaves the mempool stale, never incorrect.
//!
//! `MempoolInitialized` is the only event kind that carries the full
//! `providerTxidMapping`, so a diverged sync re-emits it with the reconciled
//! mapping. Wire consumers distinguish the two cases by the event that
//! follows: a first initialization stands alone, a resync is always followed
//! by `MempoolSynchronized{isSynchronized: false}` under the same request id.

pub mod aggregate;
pub mod policy;

pub use aggregate::{
    AggregatedMetadata, ConfirmedBlock, MempoolAggregate, MempoolCommand, MempoolConfig,
    MempoolEvent,
};
pub use policy::TrustPolicy;
