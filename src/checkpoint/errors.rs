//! # Checkpoint Error Types
//!
//! Errors raised by checkpoint stores and their backing stores. Backends map
//! their rate-limit signals onto [`CheckpointError::Throttled`] so the retry
//! policy can classify failures without knowing the backend.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckpointError {
    /// Caller-contract violation, never retried
    #[error("Sequence number should not be empty: stream {stream_name}, shard {shard_id}")]
    EmptyMarker {
        stream_name: String,
        shard_id: String,
    },

    #[error("Checkpoint store throttled during {operation}: {message}")]
    Throttled { operation: String, message: String },

    #[error("Checkpoint backend error during {operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("Checkpoint {operation} gave up after {attempts} throttled attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl CheckpointError {
    /// Create an empty marker error
    pub fn empty_marker(stream_name: impl Into<String>, shard_id: impl Into<String>) -> Self {
        Self::EmptyMarker {
            stream_name: stream_name.into(),
            shard_id: shard_id.into(),
        }
    }

    /// Create a throttling error
    pub fn throttled(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Throttled {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Backing store signalled a request-rate quota breach
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Result type alias for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CheckpointError::throttled("put_item", "slow down").is_throttled());
        assert!(!CheckpointError::backend("put_item", "table missing").is_throttled());
        assert!(!CheckpointError::empty_marker("orders", "shard-0").is_throttled());
    }

    #[test]
    fn test_error_display() {
        let err = CheckpointError::empty_marker("orders", "shard-0");
        let display = format!("{err}");
        assert!(display.contains("should not be empty"));
        assert!(display.contains("orders"));
        assert!(display.contains("shard-0"));
    }
}
