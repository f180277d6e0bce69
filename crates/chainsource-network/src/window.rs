//! Block window — retained history of accepted block summaries.
//!
//! The window bounds how deep a reorganisation can be recovered from: a
//! divergence below the oldest retained block cannot be rolled back and is
//! fatal for the aggregate.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use chainsource_merkle::Block;

/// Hard cap on retained summaries, independent of configuration, so that
/// `apply` stays deterministic across replays.
pub const MAX_RETAINED_BLOCKS: usize = 2048;

/// A minimal summary of an accepted block — enough for reorg accounting
/// and the event wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block height.
    pub height: u64,
    /// Block hash (big-endian hex).
    pub hash: String,
    /// Declared merkle root.
    pub merkleroot: String,
    /// Number of transactions in the block.
    pub tx_count: u32,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        Self {
            height: block.height,
            hash: block.hash.clone(),
            merkleroot: block.merkleroot.clone(),
            tx_count: block.tx.len() as u32,
        }
    }
}

/// Sliding window of recently accepted blocks (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    blocks: VecDeque<BlockSummary>,
}

impl BlockWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an accepted block, evicting the oldest past the hard cap.
    pub fn push(&mut self, summary: BlockSummary) {
        if self.blocks.len() >= MAX_RETAINED_BLOCKS {
            self.blocks.pop_front();
        }
        self.blocks.push_back(summary);
    }

    /// The most recently accepted block.
    pub fn head(&self) -> Option<&BlockSummary> {
        self.blocks.back()
    }

    /// The oldest retained block.
    pub fn oldest(&self) -> Option<&BlockSummary> {
        self.blocks.front()
    }

    /// Returns `true` if a block at `height` is retained.
    pub fn contains(&self, height: u64) -> bool {
        self.blocks.iter().any(|b| b.height == height)
    }

    /// All retained blocks with `height >= from`, oldest first.
    pub fn from_height(&self, from: u64) -> Vec<BlockSummary> {
        self.blocks
            .iter()
            .filter(|b| b.height >= from)
            .cloned()
            .collect()
    }

    /// Discard every retained block above `height`.
    pub fn rewind_to(&mut self, height: u64) {
        while let Some(back) = self.blocks.back() {
            if back.height > height {
                self.blocks.pop_back();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
