//! # Write-Through Checkpoint
//!
//! Every `set` is written to the backing key-value store before returning,
//! under the key `<app>:checkpoint:<stream>:<shard>`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::errors::CheckpointResult;
use super::kv::KeyValueStore;
use super::retry::RetryPolicy;
use super::{ensure_marker, Checkpoint};

pub struct WriteThroughCheckpoint {
    app_name: String,
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for WriteThroughCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteThroughCheckpoint")
            .field("app_name", &self.app_name)
            .field("store", &self.store.store_name())
            .finish()
    }
}

impl WriteThroughCheckpoint {
    pub fn new(app_name: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            app_name: app_name.into(),
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a checkpoint after verifying the store is reachable
    pub async fn connect(
        app_name: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> CheckpointResult<Self> {
        store.ping().await?;
        Ok(Self::new(app_name, store))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Storage key for a (stream, shard) pair
    pub fn key(&self, stream_name: &str, shard_id: &str) -> String {
        format!("{}:checkpoint:{}:{}", self.app_name, stream_name, shard_id)
    }
}

#[async_trait]
impl Checkpoint for WriteThroughCheckpoint {
    async fn get(&self, stream_name: &str, shard_id: &str) -> CheckpointResult<Option<String>> {
        let key = self.key(stream_name, shard_id);
        let value = self.retry.run("get", || self.store.get(&key)).await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    async fn set(
        &self,
        stream_name: &str,
        shard_id: &str,
        sequence_number: &str,
    ) -> CheckpointResult<()> {
        ensure_marker(stream_name, shard_id, sequence_number)?;

        let key = self.key(stream_name, shard_id);
        self.store.set(&key, sequence_number).await?;
        debug!(key = %key, sequence_number = %sequence_number, "Checkpoint written");
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "write_through"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::kv::InMemoryKeyValueStore;
    use crate::checkpoint::CheckpointError;
    use std::time::Duration;

    fn checkpoint() -> (WriteThroughCheckpoint, Arc<InMemoryKeyValueStore>) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let checkpoint = WriteThroughCheckpoint::new("app", store.clone()).with_retry_policy(
            RetryPolicy::new(None, Duration::from_millis(1), Duration::from_millis(2), 2.0),
        );
        (checkpoint, store)
    }

    #[test]
    fn test_key() {
        let (checkpoint, _) = checkpoint();
        assert_eq!(checkpoint.key("stream", "shard"), "app:checkpoint:stream:shard");
    }

    #[tokio::test]
    async fn test_checkpoint_lifecycle() {
        let (checkpoint, store) = checkpoint();

        checkpoint
            .set("streamName", "shardID", "testSeqNum")
            .await
            .unwrap();

        let value = checkpoint.get("streamName", "shardID").await.unwrap();
        assert_eq!(value.as_deref(), Some("testSeqNum"));
        assert_eq!(
            store.value("app:checkpoint:streamName:shardID").as_deref(),
            Some("testSeqNum")
        );
    }

    #[tokio::test]
    async fn test_get_without_checkpoint() {
        let (checkpoint, _) = checkpoint();
        assert_eq!(checkpoint.get("s", "0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_empty_sequence_number() {
        let (checkpoint, store) = checkpoint();
        checkpoint.set("s", "0", "42").await.unwrap();

        let err = checkpoint.set("s", "0", "").await.unwrap_err();
        assert!(matches!(err, CheckpointError::EmptyMarker { .. }));
        assert_eq!(checkpoint.get("s", "0").await.unwrap().as_deref(), Some("42"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_retries_throttling() {
        let (checkpoint, store) = checkpoint();
        checkpoint.set("s", "0", "42").await.unwrap();
        store.fail_next_gets([CheckpointError::throttled("get", "busy")]);

        assert_eq!(checkpoint.get("s", "0").await.unwrap().as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_set_propagates_backend_errors() {
        let (checkpoint, store) = checkpoint();
        store.fail_next_sets([CheckpointError::backend("set", "connection reset")]);

        let err = checkpoint.set("s", "0", "42").await.unwrap_err();
        assert!(matches!(err, CheckpointError::Backend { .. }));
        assert_eq!(checkpoint.get("s", "0").await.unwrap(), None);
    }
}
