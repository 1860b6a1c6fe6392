//! Block explorer client error types.

use std::sync::Arc;

use blockcache_core::Error;

/// Errors from the block explorer client.
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    /// The configured base URL cannot be used.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// The explorer has no block at the requested height.
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status other than 404.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ExplorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ExplorerError::Timeout } else { ExplorerError::Network(Arc::new(err)) }
    }
}

impl From<ExplorerError> for Error {
    fn from(err: ExplorerError) -> Self {
        match err {
            ExplorerError::NotFound(what) => Error::NotFound(what),
            ExplorerError::InvalidBaseUrl(msg) => Error::InvalidInput(msg),
            other => Error::UpstreamUnavailable(other.to_string()),
        }
    }
}
