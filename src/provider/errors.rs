//! Stream provider error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Stream not found: {stream_name}")]
    StreamNotFound { stream_name: String },

    #[error("Shard not found: {stream_name}/{shard_id}")]
    ShardNotFound {
        stream_name: String,
        shard_id: String,
    },

    /// Expired or unknown iterator handle
    #[error("Invalid shard iterator: {message}")]
    InvalidIterator { message: String },

    #[error("Provider throttled during {operation}: {message}")]
    Throttled { operation: String, message: String },

    #[error("Provider transport error during {operation}: {message}")]
    Transport { operation: String, message: String },
}

impl ProviderError {
    /// Create a stream not found error
    pub fn stream_not_found(stream_name: impl Into<String>) -> Self {
        Self::StreamNotFound {
            stream_name: stream_name.into(),
        }
    }

    /// Create a shard not found error
    pub fn shard_not_found(stream_name: impl Into<String>, shard_id: impl Into<String>) -> Self {
        Self::ShardNotFound {
            stream_name: stream_name.into(),
            shard_id: shard_id.into(),
        }
    }

    /// Create an invalid iterator error
    pub fn invalid_iterator(message: impl Into<String>) -> Self {
        Self::InvalidIterator {
            message: message.into(),
        }
    }

    /// Create a throttling error
    pub fn throttled(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Throttled {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidIterator { .. } | Self::Throttled { .. } | Self::Transport { .. }
        )
    }
}

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
