//! The durable, path-addressed blob store contract.

use async_trait::async_trait;

use super::key::{namespace_prefix, parse_height};
use crate::Error;

/// Key/value store with per-key atomic operations and prefix listing.
///
/// No multi-key transactions are assumed. A key that is visible through
/// [`BlobStore::exists`] must also be fully readable through
/// [`BlobStore::get`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether an entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool, Error>;

    /// Read the bytes stored under `key`. Fails with [`Error::NotFound`] if absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error>;

    /// Store `value` under `key`.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), Error>;

    /// All keys starting with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error>;

    /// Remove `key`. Fails with [`Error::NotFound`] if absent.
    async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// Heights cached under `namespace`, ascending. Foreign keys are skipped.
pub async fn cached_heights<S>(store: &S, namespace: &str) -> Result<Vec<u64>, Error>
where
    S: BlobStore + ?Sized,
{
    let keys = store.list(&namespace_prefix(namespace)).await?;
    let mut heights: Vec<u64> = keys.iter().filter_map(|key| parse_height(key)).collect();
    heights.sort_unstable();
    Ok(heights)
}
