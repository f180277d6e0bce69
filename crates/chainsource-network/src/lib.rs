//! chainsource-network — the chain-head state machine.
//!
//! # Architecture
//!
//! ```text
//! NetworkCommand ──► NetworkAggregate::handle
//!                        ├── batch::verify_batch   (contiguity + merkle/witness)
//!                        ├── BlockWindow           (retained history, reorg depth)
//!                        └── MigrationLedger       (schema up/down coupling)
//!                    NetworkEvent ──► NetworkAggregate::apply
//! ```
//!
//! Height only increases, except across an explicit reorganisation pair
//! (`NetworkReorganisationStarted` / `NetworkReorganisationFinished`), and
//! every accepted block has passed merkle verification first.

pub mod aggregate;
pub mod batch;
pub mod migration;
pub mod status;
pub mod window;

pub use aggregate::{NetworkAggregate, NetworkCommand, NetworkConfig, NetworkEvent};
pub use batch::verify_batch;
pub use migration::{MigrationLedger, MigrationRecord};
pub use status::{ChainKind, NetworkStatus};
pub use window::{BlockSummary, BlockWindow};
