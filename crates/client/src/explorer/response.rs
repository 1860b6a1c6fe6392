//! Block explorer response types and normalization.

use blockcache_core::BlockSummary;
use serde::Deserialize;

/// Raw response from the `latestblock` endpoint.
#[derive(Debug, Deserialize)]
pub struct LatestBlock {
    pub height: u64,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
}

/// Raw response from the `block-height/{h}` endpoint.
///
/// More than one block can share a height while a fork is unresolved.
#[derive(Debug, Deserialize)]
pub struct BlockHeightResponse {
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

/// A full block as returned by the explorer.
#[derive(Debug, Deserialize)]
pub struct RawBlock {
    #[serde(default)]
    pub hash: Option<String>,
    pub height: u64,
    pub time: i64,
    #[serde(default)]
    pub main_chain: Option<bool>,
    #[serde(default)]
    pub tx: Vec<RawTransaction>,
}

/// A transaction inside a [`RawBlock`].
#[derive(Debug, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub out: Vec<RawOutput>,
}

/// A transaction output. Only counted, never inspected.
#[derive(Debug, Deserialize)]
pub struct RawOutput {
    #[serde(default)]
    pub value: Option<u64>,
}

impl BlockHeightResponse {
    /// Pick the block at `height`, preferring the one on the main chain.
    pub fn into_block(self, height: u64) -> Option<RawBlock> {
        let mut candidates: Vec<RawBlock> = self.blocks.into_iter().filter(|b| b.height == height).collect();
        let main = candidates.iter().position(|b| b.main_chain == Some(true)).unwrap_or(0);
        if candidates.is_empty() { None } else { Some(candidates.swap_remove(main)) }
    }
}

impl RawBlock {
    /// Reduce the block to the fields that get cached.
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            t: self.time,
            n_tx: self.tx.len() as u64,
            n_outs: self.tx.iter().map(|tx| tx.out.len() as u64).sum(),
        }
    }
}
