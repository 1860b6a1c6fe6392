//! Cache-backed block fetcher.
//!
//! For each height of a requested range the fetcher checks the store first and
//! only goes to the remote source on a miss. Heights are processed in
//! ascending order and the first failure aborts the rest of the range; heights
//! cached before the failure stay cached and are skipped on the next attempt.
//!
//! ### Per-key critical section
//!
//! Existence checks are plain reads and run without coordination. The
//! fetch-and-write path for a height runs under that height's lock from
//! [`KeyLocks`] and re-checks the store once the lock is held, so overlapping
//! `ensure_range` calls on a shared fetcher fetch each height at most once.
//! Different heights never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::{BlobStore, cache_key, cached_heights};
use crate::index::{ResolvedRange, resolve_range};
use crate::record::BlockSummary;
use crate::source::RecordSource;
use crate::Error;

/// How a height was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Read from the store, no remote fetch.
    Hit,
    /// Fetched from the source and written to the store.
    Fetched,
}

/// Result for a single height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    pub height: u64,
    pub outcome: CacheOutcome,
    pub summary: BlockSummary,
}

/// Result of a fully successful [`CachedFetcher::ensure_range`] call.
#[derive(Debug, Clone)]
pub struct RangeReport {
    /// The absolute range the request resolved to.
    pub range: ResolvedRange,
    /// One entry per height, ascending.
    pub entries: Vec<RangeEntry>,
}

impl RangeReport {
    /// Number of heights served from the store.
    pub fn hits(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome == CacheOutcome::Hit).count()
    }

    /// Number of heights fetched from the source.
    pub fn fetched(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome == CacheOutcome::Fetched).count()
    }
}

/// Per-height async locks.
///
/// Entries exist only while some task holds or waits on them.
#[derive(Debug, Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<u64, LockEntry>>,
}

#[derive(Debug, Default)]
struct LockEntry {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus queued waiters.
    users: usize,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `height`.
    ///
    /// Cancel safe: dropping the returned future while it is queued releases
    /// its claim on the entry.
    pub async fn lock(&self, height: u64) -> KeyGuard<'_> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = map.entry(height).or_default();
            entry.users += 1;
            Arc::clone(&entry.mutex)
        };
        // Registered before the await so cancellation runs the release path.
        let mut guard = KeyGuard { locks: self, height, guard: None };
        guard.guard = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of heights with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one height; released on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    height: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = map.get_mut(&self.height) {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                map.remove(&self.height);
            }
        }
    }
}

/// Ensures ranges of blocks are present in a durable store.
pub struct CachedFetcher<S, R> {
    store: S,
    source: R,
    namespace: String,
    locks: KeyLocks,
}

impl<S, R> CachedFetcher<S, R>
where
    S: BlobStore,
    R: RecordSource,
{
    /// Create a fetcher writing under `namespace`.
    pub fn new(store: S, source: R, namespace: impl Into<String>) -> Result<Self, Error> {
        let namespace = namespace.into();
        if namespace.is_empty() || namespace.ends_with('/') {
            return Err(Error::InvalidInput(format!(
                "namespace must be non-empty and must not end with '/': {namespace:?}"
            )));
        }
        Ok(Self { store, source, namespace, locks: KeyLocks::new() })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Make sure every block in `[start, end]` is cached.
    ///
    /// Negative endpoints count back from the tip; both are resolved against a
    /// single tip query. Fails with [`Error::InvalidRange`] before touching the
    /// store if the resolved start is after the resolved end.
    pub async fn ensure_range(&self, start: i64, end: i64) -> Result<RangeReport, Error> {
        let range = resolve_range(&self.source, start, end).await?;
        tracing::info!(start, end, from = range.start, to = range.end, "ensuring block range");

        let mut entries = Vec::new();
        for height in range.heights() {
            match self.ensure_height(height).await {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(height, error = %err, cached = entries.len(), "aborting range");
                    return Err(err);
                }
            }
        }

        let report = RangeReport { range, entries };
        tracing::info!(hits = report.hits(), fetched = report.fetched(), "range complete");
        Ok(report)
    }

    /// Make sure a single absolute height is cached.
    pub async fn ensure_height(&self, height: u64) -> Result<RangeEntry, Error> {
        let key = cache_key(&self.namespace, height);

        if self.store.exists(&key).await? {
            return self.read_cached(height, &key).await;
        }

        let _guard = self.locks.lock(height).await;
        if self.store.exists(&key).await? {
            tracing::debug!(height, "populated by a concurrent writer");
            return self.read_cached(height, &key).await;
        }

        tracing::info!(height, "downloading block");
        let summary = self.source.fetch_block(height).await?;
        self.store.put(&key, &summary.to_bytes()?).await?;
        tracing::info!(height, "{}", summary.describe(height));

        Ok(RangeEntry { height, outcome: CacheOutcome::Fetched, summary })
    }

    /// Heights currently cached under the namespace, ascending.
    pub async fn cached_heights(&self) -> Result<Vec<u64>, Error> {
        cached_heights(&self.store, &self.namespace).await
    }

    async fn read_cached(&self, height: u64, key: &str) -> Result<RangeEntry, Error> {
        let bytes = self.store.get(key).await?;
        let summary = BlockSummary::from_bytes(&bytes)?;
        tracing::debug!(height, "cache hit");
        tracing::info!(height, "{}", summary.describe(height));
        Ok(RangeEntry { height, outcome: CacheOutcome::Hit, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    const NS: &str = "test/btc";

    /// In-memory chain with call accounting and injectable failures.
    #[derive(Default)]
    struct ScriptedSource {
        tip: AtomicU64,
        fetches: Mutex<Vec<u64>>,
        fail_at: Mutex<HashSet<u64>>,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn with_tip(tip: u64) -> Self {
            Self { tip: AtomicU64::new(tip), ..Default::default() }
        }

        fn failing_at(self, height: u64) -> Self {
            self.fail_at.lock().unwrap().insert(height);
            self
        }

        fn fetches(&self) -> Vec<u64> {
            self.fetches.lock().unwrap().clone()
        }

        fn summary_for(height: u64) -> BlockSummary {
            BlockSummary { t: 1_600_000_000 + height as i64 * 600, n_tx: height + 1, n_outs: 2 * height + 3 }
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn tip_height(&self) -> Result<u64, Error> {
            Ok(self.tip.load(Ordering::SeqCst))
        }

        async fn fetch_block(&self, height: u64) -> Result<BlockSummary, Error> {
            self.fetches.lock().unwrap().push(height);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_at.lock().unwrap().contains(&height) {
                return Err(Error::UpstreamUnavailable(format!("timed out fetching {height}")));
            }
            if height > self.tip.load(Ordering::SeqCst) {
                return Err(Error::NotFound(format!("block {height}")));
            }
            Ok(Self::summary_for(height))
        }
    }

    async fn fetcher(source: ScriptedSource) -> CachedFetcher<CacheDb, ScriptedSource> {
        let db = CacheDb::open_in_memory().await.unwrap();
        CachedFetcher::new(db, source, NS).unwrap()
    }

    #[tokio::test]
    async fn test_relative_range_scenario() {
        let fetcher = fetcher(ScriptedSource::with_tip(100)).await;

        let report = fetcher.ensure_range(-3, -1).await.unwrap();
        assert_eq!(report.range, ResolvedRange { start: 98, end: 100 });
        assert_eq!(report.fetched(), 3);
        assert_eq!(fetcher.source().fetches(), vec![98, 99, 100]);
        assert_eq!(fetcher.cached_heights().await.unwrap(), vec![98, 99, 100]);

        let again = fetcher.ensure_range(-3, -1).await.unwrap();
        assert_eq!(again.hits(), 3);
        assert_eq!(again.fetched(), 0);
        assert_eq!(fetcher.source().fetches().len(), 3);
    }

    #[tokio::test]
    async fn test_hit_surfaces_cached_summary() {
        let fetcher = fetcher(ScriptedSource::with_tip(50)).await;
        let first = fetcher.ensure_range(7, 7).await.unwrap();
        let second = fetcher.ensure_range(7, 7).await.unwrap();

        assert_eq!(first.entries[0].outcome, CacheOutcome::Fetched);
        assert_eq!(second.entries[0].outcome, CacheOutcome::Hit);
        assert_eq!(second.entries[0].summary, ScriptedSource::summary_for(7));
    }

    #[tokio::test]
    async fn test_overlapping_ranges_fetch_once() {
        let fetcher = fetcher(ScriptedSource::with_tip(100)).await;
        fetcher.ensure_range(10, 14).await.unwrap();
        let report = fetcher.ensure_range(12, 17).await.unwrap();

        assert_eq!(report.hits(), 3);
        assert_eq!(report.fetched(), 3);
        assert_eq!(fetcher.source().fetches(), (10..=17).collect::<Vec<_>>());
        assert_eq!(fetcher.store().list("test/btc/").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_inverted_range_writes_nothing() {
        let fetcher = fetcher(ScriptedSource::with_tip(100)).await;

        let result = fetcher.ensure_range(20, 10).await;
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        let result = fetcher.ensure_range(-1, -5).await;
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        assert!(fetcher.source().fetches().is_empty());
        assert!(fetcher.cached_heights().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_keeps_partial_progress() {
        let fetcher = fetcher(ScriptedSource::with_tip(100).failing_at(3)).await;

        let result = fetcher.ensure_range(1, 5).await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable(_))));
        assert_eq!(fetcher.source().fetches(), vec![1, 2, 3]);
        assert_eq!(fetcher.cached_heights().await.unwrap(), vec![1, 2]);

        fetcher.source().fail_at.lock().unwrap().clear();
        let retry = fetcher.ensure_range(1, 5).await.unwrap();
        assert_eq!(retry.hits(), 2);
        assert_eq!(retry.fetched(), 3);
        assert_eq!(fetcher.source().fetches(), vec![1, 2, 3, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_missing_upstream_block() {
        let fetcher = fetcher(ScriptedSource::with_tip(10)).await;
        let result = fetcher.ensure_range(9, 12).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(fetcher.cached_heights().await.unwrap(), vec![9, 10]);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_surfaced() {
        let fetcher = fetcher(ScriptedSource::with_tip(10)).await;
        fetcher.store().put(&cache_key(NS, 4), b"garbage").await.unwrap();

        let result = fetcher.ensure_range(4, 4).await;
        assert!(matches!(result, Err(Error::Decode(_))));
        assert!(fetcher.source().fetches().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_calls_fetch_each_height_once() {
        let source = ScriptedSource { delay: Some(Duration::from_millis(5)), ..ScriptedSource::with_tip(100) };
        let fetcher = fetcher(source).await;

        let (a, b) = tokio::join!(fetcher.ensure_range(0, 6), fetcher.ensure_range(3, 9));
        a.unwrap();
        b.unwrap();

        let mut fetches = fetcher.source().fetches();
        fetches.sort_unstable();
        assert_eq!(fetches, (0..=9).collect::<Vec<_>>());
        assert!(fetcher.locks.is_empty());
    }

    #[tokio::test]
    async fn test_key_locks_serialize_same_height() {
        let locks = KeyLocks::new();
        let first = locks.lock(1).await;
        let other = locks.lock(2).await;
        assert_eq!(locks.len(), 2);

        let waiter = locks.lock(1);
        tokio::pin!(waiter);
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut waiter).await.is_err());

        drop(first);
        let second = waiter.await;
        drop(second);
        drop(other);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_key_locks_cancelled_waiter_releases_entry() {
        let locks = KeyLocks::new();
        let holder = locks.lock(7).await;
        {
            let waiter = locks.lock(7);
            tokio::pin!(waiter);
            assert!(tokio::time::timeout(Duration::from_millis(10), &mut waiter).await.is_err());
            drop(holder);
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());

        let reacquired = locks.lock(7).await;
        assert_eq!(locks.len(), 1);
        drop(reacquired);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_range_leaves_no_lock_entries() {
        let source = ScriptedSource { delay: Some(Duration::from_millis(50)), ..ScriptedSource::with_tip(100) };
        let fetcher = fetcher(source).await;

        let (slow, cancelled) = tokio::join!(
            fetcher.ensure_range(5, 5),
            tokio::time::timeout(Duration::from_millis(10), fetcher.ensure_range(5, 5)),
        );
        slow.unwrap();
        assert!(cancelled.is_err());
        assert!(fetcher.locks.is_empty());
        assert_eq!(fetcher.cached_heights().await.unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_rejects_bad_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(CachedFetcher::new(db.clone(), ScriptedSource::default(), "").is_err());
        assert!(CachedFetcher::new(db, ScriptedSource::default(), "ns/").is_err());
    }
}
