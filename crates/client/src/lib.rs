//! Client code for blockcache.
//!
//! This crate provides the HTTP record source that talks to a block explorer
//! and feeds the cache-backed fetcher in `blockcache-core`.

pub mod explorer;

pub use explorer::{ExplorerClient, ExplorerConfig, ExplorerError};
