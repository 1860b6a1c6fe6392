//! Unified error types for blockcache.
//!
//! The `Display` prefixes are stable and meant to be matched by scripts that
//! drive the CLI.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the store, the fetcher and record sources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote authority timed out, refused the connection or answered
    /// with something other than a record.
    #[error("UPSTREAM_UNAVAILABLE: {0}")]
    UpstreamUnavailable(String),

    /// No record exists for the requested key, upstream or in the store.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The resolved range is empty or an index points before height 0.
    #[error("INVALID_RANGE: {0}")]
    InvalidRange(String),

    /// A store backend failed to read, write, list or delete.
    #[error("STORE_FAILURE: {0}")]
    Store(String),

    /// Database operation failed.
    #[error("STORE_FAILURE: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_FAILURE: migration failed: {0}")]
    MigrationFailed(String),

    /// A cached entry could not be decoded as a record.
    #[error("DECODE_FAILED: {0}")]
    Decode(String),

    /// Invalid input parameters (e.g., an empty namespace).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_))
    }

    /// Whether the error originated in the durable store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Database(_) | Error::MigrationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
