//! chainsource-runtime — command execution and cross-aggregate sequencing.
//!
//! # Architecture
//!
//! ```text
//! RuntimeBuilder → Pipeline
//!                     ├── AggregateHandle<NetworkAggregate>  (single writer)
//!                     └── AggregateHandle<MempoolAggregate>  (single writer)
//! ```
//!
//! Each handle serializes commands for its aggregate id and replays the
//! event log before the first command after a restart. The pipeline enforces
//! the one cross-aggregate ordering rule: the network commit for a block
//! batch is durable before the mempool prune for the same blocks runs.

pub mod builder;
pub mod executor;
pub mod pipeline;

pub use builder::{RuntimeBuilder, RuntimeConfig};
pub use executor::AggregateHandle;
pub use pipeline::Pipeline;
