//! Core types and shared functionality for blockcache.
//!
//! This crate provides:
//! - Block summaries and relative index resolution
//! - Durable blob store with SQLite backend
//! - Cache-backed fetcher and namespace eraser
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod eraser;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod record;
pub mod source;

pub use cache::{BlobStore, CacheDb};
pub use config::{AppConfig, ConfigError};
pub use eraser::{ClearReport, clear};
pub use error::Error;
pub use fetcher::{CacheOutcome, CachedFetcher, RangeEntry, RangeReport};
pub use index::{ResolvedRange, resolve_against_tip, resolve_range};
pub use record::BlockSummary;
pub use source::RecordSource;
