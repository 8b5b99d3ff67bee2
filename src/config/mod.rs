//! # Connector Configuration
//!
//! Typed configuration for a stream consumer. Values come from an optional
//! configuration file layered under `CONNECTOR_`-prefixed environment variables
//! (see [`loader`]), and are validated before any shard loop starts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stream_connectors::config::ConnectorConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectorConfig::load(Some("config/connector.toml".as_ref()))?;
//! println!("batch size: {}", config.buffer_size);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};

/// Records per batch when not configured
pub const DEFAULT_BUFFER_SIZE: usize = 500;
/// Sink-side flush interval when not configured
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1_000;
/// Batched checkpoint persistence interval when not configured
pub const DEFAULT_CHECKPOINT_FLUSH_INTERVAL_MS: u64 = 60_000;
/// Upper bound on records requested per poll
pub const DEFAULT_POLL_BATCH_LIMIT: usize = 10_000;

/// Root consumer configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Application name, also the checkpoint namespace
    pub app_name: String,

    /// Stream to consume
    pub stream_name: String,

    /// Region hosting the stream
    pub stream_region: String,

    /// Interval for time-based buffer flushing
    pub flush_interval_ms: u64,

    /// Records per batch; 0 disables count-based flushing
    pub buffer_size: usize,

    /// Persistence interval for the batched checkpoint store
    pub checkpoint_flush_interval_ms: u64,

    /// Optional prefix prepended to every emitted key
    pub key_prefix: Option<String>,

    /// Maximum records requested per poll
    pub poll_batch_limit: usize,

    /// Wait after an empty page before polling again
    pub idle_poll_interval_ms: u64,

    /// Wait after a poll error before re-deriving the iterator
    pub error_backoff_ms: u64,

    /// Throttling retry policy for checkpoint reads and writes
    pub checkpoint_retry: RetryConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            stream_name: String::new(),
            stream_region: String::new(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            checkpoint_flush_interval_ms: DEFAULT_CHECKPOINT_FLUSH_INTERVAL_MS,
            key_prefix: None,
            poll_batch_limit: DEFAULT_POLL_BATCH_LIMIT,
            idle_poll_interval_ms: 1_000,
            error_backoff_ms: 1_000,
            checkpoint_retry: RetryConfig::default(),
        }
    }
}

impl ConnectorConfig {
    /// Build a configuration with the three required fields and defaults elsewhere
    pub fn new(
        app_name: impl Into<String>,
        stream_name: impl Into<String>,
        stream_region: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            stream_name: stream_name.into(),
            stream_region: stream_region.into(),
            ..Self::default()
        }
    }

    /// Validate required fields and value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("app_name", &self.app_name),
            ("stream_name", &self.stream_name),
            ("stream_region", &self.stream_region),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "connector configuration",
                ));
            }
        }

        if self.checkpoint_flush_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "checkpoint_flush_interval_ms",
                self.checkpoint_flush_interval_ms,
                "must be greater than zero",
            ));
        }

        if self.poll_batch_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "poll_batch_limit",
                self.poll_batch_limit,
                "must be greater than zero",
            ));
        }

        self.checkpoint_retry.validate()
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn checkpoint_flush_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_flush_interval_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// Backoff settings for throttled checkpoint operations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempt cap; `None` retries until the backing store accepts the write
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_backoff_ms: 50,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backoff_multiplier <= 0.0 || !self.backoff_multiplier.is_finite() {
            return Err(ConfigurationError::invalid_value(
                "checkpoint_retry.backoff_multiplier",
                self.backoff_multiplier,
                "must be a positive number",
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "checkpoint_retry.max_attempts",
                0,
                "must allow at least one attempt",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::new("app", "orders", "us-west-1");
        assert_eq!(config.buffer_size, 500);
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
        assert_eq!(config.checkpoint_flush_interval(), Duration::from_secs(60));
        assert_eq!(config.key_prefix, None);
        assert_eq!(config.checkpoint_retry.max_attempts, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_fields() {
        let mut config = ConnectorConfig::new("app", "orders", "us-west-1");
        config.stream_region = String::new();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingRequiredField { ref field, .. } if field == "stream_region"
        ));

        let err = ConnectorConfig::default().validate().unwrap_err();
        assert!(format!("{err}").contains("app_name"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ConnectorConfig::new("app", "orders", "us-west-1");
        config.checkpoint_flush_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));

        let mut config = ConnectorConfig::new("app", "orders", "us-west-1");
        config.checkpoint_retry.backoff_multiplier = 0.0;
        assert!(config.validate().is_err());

        let mut config = ConnectorConfig::new("app", "orders", "us-west-1");
        config.checkpoint_retry.max_attempts = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_buffer_size_is_valid() {
        let mut config = ConnectorConfig::new("app", "orders", "us-west-1");
        config.buffer_size = 0;
        assert!(config.validate().is_ok());
    }
}
