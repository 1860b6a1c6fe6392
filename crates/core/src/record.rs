//! Cached block summaries.
//!
//! A record is the reduced view of a block that is worth keeping: when it was
//! mined, how many transactions it carries and how many outputs those
//! transactions create in total. Records are immutable once cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Summary of a single block, keyed externally by its absolute height.
///
/// Serialized with short field tags (`t`, `n_tx`, `n_outs`) so entries stay
/// compatible with caches populated by other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block timestamp, seconds since the Unix epoch.
    pub t: i64,
    /// Number of transactions in the block.
    pub n_tx: u64,
    /// Total number of outputs across all transactions.
    pub n_outs: u64,
}

impl BlockSummary {
    /// Encode as compact JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode bytes previously produced by [`BlockSummary::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Block timestamp as a UTC datetime, if it is representable.
    pub fn arrived_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.t, 0)
    }

    /// One-line human readable summary for the block at `height`.
    pub fn describe(&self, height: u64) -> String {
        let arrived = self
            .arrived_at()
            .map(|dt| dt.format("%a %b %e %H:%M:%S %Y").to_string())
            .unwrap_or_else(|| format!("t={}", self.t));
        format!(
            "Block with height {height} arrived at {arrived} with {} transactions and a total of {} outputs.",
            self.n_tx, self.n_outs
        )
    }
}
