//! # Connector Error Types
//!
//! Crate-level error type. Each subsystem owns a focused `thiserror` enum
//! (checkpoint, provider, emitter, configuration) and `ConnectorError` wraps
//! them so the dispatcher can report shard outcomes through a single type.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigurationError;
use crate::emitter::EmitError;
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Stream provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Emit error: {0}")]
    Emit(#[from] EmitError),

    /// The shard cannot make progress without a cursor
    #[error("Unable to obtain iterator for shard {shard_id}: {source}")]
    ShardIterator {
        shard_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Shard task {shard_id} terminated abnormally: {message}")]
    TaskJoin { shard_id: String, message: String },
}

impl ConnectorError {
    /// Create a shard iterator error
    pub fn shard_iterator(shard_id: impl Into<String>, source: ProviderError) -> Self {
        Self::ShardIterator {
            shard_id: shard_id.into(),
            source,
        }
    }

    /// Create a task join error
    pub fn task_join(shard_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskJoin {
            shard_id: shard_id.into(),
            message: message.into(),
        }
    }

    /// Whether this error stops the owning shard permanently
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::ShardIterator { .. }
                | Self::Checkpoint(_)
                | Self::TaskJoin { .. }
        )
    }
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectorError::shard_iterator(
            "shard-0",
            ProviderError::shard_not_found("orders", "shard-0"),
        );
        let display = format!("{err}");
        assert!(display.contains("Unable to obtain iterator"));
        assert!(display.contains("shard-0"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_conversions() {
        let err: ConnectorError = CheckpointError::empty_marker("orders", "shard-0").into();
        assert!(matches!(err, ConnectorError::Checkpoint(_)));

        let err: ConnectorError = EmitError::sink("bucket unavailable").into();
        assert!(matches!(err, ConnectorError::Emit(_)));
        assert!(!err.is_fatal());
    }
}
