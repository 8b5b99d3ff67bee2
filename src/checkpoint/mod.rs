//! # Checkpoint Module
//!
//! Durable per-shard progress. A checkpoint maps `(stream, shard)` to the
//! sequence number of the last record handed successfully to the emitter; shard
//! loops resume strictly after that marker, or from the start of the shard
//! when [`Checkpoint::get`] returns `None`.
//!
//! ## Implementations
//!
//! - [`WriteThroughCheckpoint`]: every `set` is written to a [`KeyValueStore`]
//!   before returning
//! - [`BatchedCheckpoint`]: `set` updates memory only; a background task
//!   persists to a [`CheckpointTable`] on an interval and on shutdown; the
//!   `checkpoint-dynamodb` feature adds a DynamoDB-backed table
//! - [`NoopCheckpoint`]: remembers nothing, so every restart reads from the
//!   start of each shard

pub mod batched;
#[cfg(feature = "checkpoint-dynamodb")]
pub mod dynamodb;
pub mod errors;
pub mod kv;
#[cfg(feature = "checkpoint-redis")]
pub mod redis;
pub mod retry;
pub mod table;
pub mod write_through;

use async_trait::async_trait;

pub use batched::BatchedCheckpoint;
pub use errors::{CheckpointError, CheckpointResult};
pub use kv::{InMemoryKeyValueStore, KeyValueStore};
pub use retry::RetryPolicy;
pub use table::{CheckpointItem, CheckpointTable, InMemoryCheckpointTable};
pub use write_through::WriteThroughCheckpoint;

#[async_trait]
pub trait Checkpoint: Send + Sync {
    /// Last marker recorded for the shard; `None` means "start of shard"
    async fn get(&self, stream_name: &str, shard_id: &str) -> CheckpointResult<Option<String>>;

    /// Record progress; an empty sequence number is rejected
    async fn set(
        &self,
        stream_name: &str,
        shard_id: &str,
        sequence_number: &str,
    ) -> CheckpointResult<()>;

    /// Persist anything buffered and release background resources
    async fn shutdown(&self) -> CheckpointResult<()> {
        Ok(())
    }

    fn store_name(&self) -> &'static str;
}

/// Reject empty markers before they reach any store
pub(crate) fn ensure_marker(
    stream_name: &str,
    shard_id: &str,
    sequence_number: &str,
) -> CheckpointResult<()> {
    if sequence_number.is_empty() {
        return Err(CheckpointError::empty_marker(stream_name, shard_id));
    }
    Ok(())
}

/// Checkpoint that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCheckpoint;

#[async_trait]
impl Checkpoint for NoopCheckpoint {
    async fn get(&self, _stream_name: &str, _shard_id: &str) -> CheckpointResult<Option<String>> {
        Ok(None)
    }

    async fn set(
        &self,
        _stream_name: &str,
        _shard_id: &str,
        _sequence_number: &str,
    ) -> CheckpointResult<()> {
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_checkpoint() {
        let checkpoint = NoopCheckpoint;
        checkpoint.set("s", "0", "42").await.unwrap();
        assert_eq!(checkpoint.get("s", "0").await.unwrap(), None);
        checkpoint.shutdown().await.unwrap();
    }

    #[test]
    fn test_ensure_marker() {
        assert!(ensure_marker("s", "0", "1").is_ok());
        assert_eq!(
            ensure_marker("s", "0", ""),
            Err(CheckpointError::empty_marker("s", "0"))
        );
    }
}
