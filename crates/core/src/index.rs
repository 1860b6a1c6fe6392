//! Absolute and relative block indices.
//!
//! Non-negative indices are absolute heights. Negative indices are offsets
//! from the current tip: `-1` is the tip itself, `-2` the
//! block before it, and so on. The tip moves as blocks are appended, so a
//! relative index only has meaning together with the tip it was resolved
//! against.

use std::ops::RangeInclusive;

use crate::Error;
use crate::source::RecordSource;

/// Resolve `index` against a known tip height.
pub fn resolve_against_tip(index: i64, tip: u64) -> Result<u64, Error> {
    if index >= 0 {
        return Ok(index as u64);
    }
    let back = index.unsigned_abs() - 1;
    tip.checked_sub(back).ok_or_else(|| {
        Error::InvalidRange(format!("index {index} reaches before height 0 (tip is {tip})"))
    })
}

/// A non-empty, closed range of absolute heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
}

impl ResolvedRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: u64, end: u64) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidRange(format!("start {start} is after end {end}")));
        }
        Ok(Self { start, end })
    }

    /// Number of heights in the range, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// Always false; a resolved range holds at least one height.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Heights in ascending order.
    pub fn heights(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

/// Resolve both endpoints of a requested range.
///
/// The tip is queried at most once, and only when an endpoint is negative, so
/// both endpoints are derived from the same snapshot of the chain.
pub async fn resolve_range<R>(source: &R, start: i64, end: i64) -> Result<ResolvedRange, Error>
where
    R: RecordSource + ?Sized,
{
    let tip = if start < 0 || end < 0 { Some(source.tip_height().await?) } else { None };

    let (start_abs, end_abs) = match tip {
        Some(tip) => {
            tracing::debug!(tip, start, end, "resolving relative range");
            (resolve_against_tip(start, tip)?, resolve_against_tip(end, tip)?)
        }
        None => (start as u64, end as u64),
    };

    ResolvedRange::new(start_abs, end_abs)
}
