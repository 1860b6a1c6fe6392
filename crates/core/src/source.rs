//! The remote authority that records are fetched from.

use async_trait::async_trait;

use crate::index::resolve_against_tip;
use crate::record::BlockSummary;
use crate::Error;

/// A remote, append-only sequence of blocks addressed by height.
///
/// Implementations carry their own request timeout and must report timeouts
/// and connection problems as [`Error::UpstreamUnavailable`] and missing
/// heights as [`Error::NotFound`].
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Height of the most recently appended block.
    async fn tip_height(&self) -> Result<u64, Error>;

    /// Fetch and summarize the block at an absolute height.
    async fn fetch_block(&self, height: u64) -> Result<BlockSummary, Error>;

    /// Resolve a possibly negative index to an absolute height.
    ///
    /// Non-negative indices are returned unchanged without contacting the
    /// remote. Negative indices count back from the tip, `-1` being the tip.
    async fn resolve(&self, index: i64) -> Result<u64, Error> {
        if index >= 0 {
            return Ok(index as u64);
        }
        let tip = self.tip_height().await?;
        resolve_against_tip(index, tip)
    }
}
