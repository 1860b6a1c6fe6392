//! SQLite-backed durable store for cached records.
//!
//! Entries are opaque blobs addressed by path-like keys. The store provides:
//!
//! - Insert-once writes (an existing entry is never overwritten)
//! - Prefix listing for namespace-wide operations
//! - Automatic schema migrations
//! - WAL mode for concurrent readers

pub mod blobs;
pub mod connection;
pub mod key;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use key::{cache_key, namespace_prefix, parse_height};
pub use store::{BlobStore, cached_heights};
