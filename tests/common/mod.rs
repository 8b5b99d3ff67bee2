#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use stream_connectors::{ConnectorConfig, InMemoryEmitter, InMemoryStreamProvider};

pub use strategies::*;

pub const STREAM: &str = "orders";

/// Config tuned for fast test loops
pub fn test_config(buffer_size: usize) -> ConnectorConfig {
    let mut config = ConnectorConfig::new("test-app", STREAM, "local");
    config.buffer_size = buffer_size;
    config.idle_poll_interval_ms = 5;
    config.error_backoff_ms = 5;
    config.checkpoint_flush_interval_ms = 60_000;
    config
}

pub fn provider_with_shards(shard_count: usize) -> (Arc<InMemoryStreamProvider>, Vec<String>) {
    let provider = Arc::new(InMemoryStreamProvider::new());
    let shards = provider.create_stream(STREAM, shard_count);
    (provider, shards)
}

/// Poll `condition` every few milliseconds, failing the test after five seconds
pub async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {description}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn payloads(emitter: &InMemoryEmitter) -> Vec<Vec<u8>> {
    emitter.batches().into_iter().map(|b| b.payload).collect()
}
