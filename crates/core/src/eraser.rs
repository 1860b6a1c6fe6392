//! Namespace-wide cache erasure.

use crate::Error;
use crate::cache::BlobStore;

/// Outcome of a [`clear`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Keys that were deleted.
    pub removed: Vec<String>,
    /// Keys that could not be deleted, with the reason.
    pub failed: Vec<(String, String)>,
}

impl ClearReport {
    /// True when every listed key was deleted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every key under `prefix`.
///
/// Deletions are independent: a failed deletion is recorded in the report and
/// the remaining keys are still attempted. Nothing is rolled back. Only a
/// failure to list the keys fails the call.
pub async fn clear<S>(store: &S, prefix: &str) -> Result<ClearReport, Error>
where
    S: BlobStore + ?Sized,
{
    let keys = store.list(prefix).await?;
    tracing::info!(prefix, count = keys.len(), "clearing cache entries");

    let mut report = ClearReport::default();
    for key in keys {
        match store.delete(&key).await {
            Ok(()) => {
                tracing::info!(%key, "deleted");
                report.removed.push(key);
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "delete failed");
                report.failed.push((key, err.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDb, cache_key, namespace_prefix};
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Delegates to a real store but refuses to delete some keys.
    struct StickyStore {
        inner: CacheDb,
        sticky: HashSet<String>,
        fail_listing: bool,
    }

    #[async_trait]
    impl BlobStore for StickyStore {
        async fn exists(&self, key: &str) -> Result<bool, Error> {
            self.inner.exists(key).await
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: &[u8]) -> Result<(), Error> {
            self.inner.put(key, value).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
            if self.fail_listing {
                return Err(Error::Store("store offline".into()));
            }
            self.inner.list(prefix).await
        }

        async fn delete(&self, key: &str) -> Result<(), Error> {
            if self.sticky.contains(key) {
                return Err(Error::Store(format!("{key} is locked")));
            }
            self.inner.delete(key).await
        }
    }

    async fn seeded(namespace: &str, heights: &[u64]) -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        for height in heights {
            db.put(&cache_key(namespace, *height), b"{}").await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_clear_removes_everything_under_prefix() {
        let db = seeded("btc", &[1, 2, 3]).await;
        db.put(&cache_key("other", 1), b"{}").await.unwrap();

        let report = clear(&db, &namespace_prefix("btc")).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.removed.len(), 3);

        assert!(db.list(&namespace_prefix("btc")).await.unwrap().is_empty());
        assert_eq!(db.list(&namespace_prefix("other")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empty_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let report = clear(&db, "nothing/").await.unwrap();
        assert_eq!(report, ClearReport::default());
    }

    #[tokio::test]
    async fn test_clear_continues_past_failures() {
        let inner = seeded("btc", &[1, 2, 3]).await;
        let sticky = HashSet::from([cache_key("btc", 2)]);
        let store = StickyStore { inner, sticky, fail_listing: false };

        let report = clear(&store, &namespace_prefix("btc")).await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "btc/height=2");
        assert!(report.failed[0].1.starts_with("STORE_FAILURE"));

        assert_eq!(store.list(&namespace_prefix("btc")).await.unwrap(), vec!["btc/height=2".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_fails_when_listing_fails() {
        let inner = seeded("btc", &[1]).await;
        let store = StickyStore { inner, sticky: HashSet::new(), fail_listing: true };

        let result = clear(&store, &namespace_prefix("btc")).await;
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(store.inner.exists(&cache_key("btc", 1)).await.unwrap());
    }
}
