//! Configuration validation rules.
//!
//! Validation runs after `AppConfig` has been loaded from environment,
//! files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `namespace` is empty or ends with `/`
    /// - `explorer_url` is not an http(s) URL
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.namespace.is_empty() {
            return Err(ConfigError::Invalid { field: "namespace".into(), reason: "must not be empty".into() });
        }
        if self.namespace.ends_with('/') {
            return Err(ConfigError::Invalid { field: "namespace".into(), reason: "must not end with '/'".into() });
        }

        match url::Url::parse(&self.explorer_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    field: "explorer_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "explorer_url".into(), reason: e.to_string() });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.explorer_url.starts_with("http://") {
            tracing::warn!(url = %self.explorer_url, "explorer_url uses plain http");
        }

        Ok(())
    }
}
