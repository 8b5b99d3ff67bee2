//! # Consumer Dispatcher
//!
//! Discovers the shards of a stream and runs one [`ShardConsumer`] per shard on
//! its own tokio task. All shards share a single shutdown watch channel, the
//! checkpoint store and the emitter. A shard that fails ends on its own; its
//! siblings keep running and the error is reported when outcomes are collected.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stream_connectors::{
//!     ConnectorConfig, Consumer, InMemoryEmitter, InMemoryStreamProvider, NoopCheckpoint,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectorConfig::load(None)?;
//! let consumer = Consumer::new(
//!     config,
//!     Arc::new(InMemoryStreamProvider::new()),
//!     Arc::new(NoopCheckpoint),
//!     Arc::new(InMemoryEmitter::new()),
//! )?;
//!
//! let handle = consumer.start().await?;
//! tokio::signal::ctrl_c().await?;
//! for outcome in handle.shutdown().await? {
//!     println!("{}: {:?}", outcome.shard_id, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```

pub mod shard;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::checkpoint::Checkpoint;
use crate::config::ConnectorConfig;
use crate::emitter::Emitter;
use crate::error::{ConnectorError, ConnectorResult};
use crate::provider::StreamProvider;

pub use shard::{ShardConsumer, ShardState, ShardStats};

/// How one shard loop ended
#[derive(Debug)]
pub struct ShardOutcome {
    pub shard_id: String,
    pub result: ConnectorResult<ShardStats>,
}

impl ShardOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Consumer {
    consumer_id: Uuid,
    config: Arc<ConnectorConfig>,
    provider: Arc<dyn StreamProvider>,
    checkpoint: Arc<dyn Checkpoint>,
    emitter: Arc<dyn Emitter>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("consumer_id", &self.consumer_id)
            .field("stream_name", &self.config.stream_name)
            .field("provider", &self.provider.provider_name())
            .field("checkpoint", &self.checkpoint.store_name())
            .field("emitter", &self.emitter.emitter_name())
            .finish()
    }
}

impl Consumer {
    /// Validate `config` and wire the collaborators together
    pub fn new(
        config: ConnectorConfig,
        provider: Arc<dyn StreamProvider>,
        checkpoint: Arc<dyn Checkpoint>,
        emitter: Arc<dyn Emitter>,
    ) -> ConnectorResult<Self> {
        config.validate()?;
        Ok(Self {
            consumer_id: Uuid::new_v4(),
            config: Arc::new(config),
            provider,
            checkpoint,
            emitter,
        })
    }

    pub fn consumer_id(&self) -> Uuid {
        self.consumer_id
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// List the stream's shards and spawn one consumer loop for each
    ///
    /// Failing to list the shards is returned here; nothing is spawned.
    #[instrument(
        skip(self),
        fields(consumer_id = %self.consumer_id, stream_name = %self.config.stream_name)
    )]
    pub async fn start(&self) -> ConnectorResult<ConsumerHandle> {
        let shard_ids = self
            .provider
            .describe_shards(&self.config.stream_name)
            .await
            .map_err(|err| {
                error!(error = %err, "Unable to list shards");
                ConnectorError::from(err)
            })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(shard_ids.len());
        for shard_id in &shard_ids {
            let shard = ShardConsumer::new(
                shard_id.clone(),
                self.config.clone(),
                self.provider.clone(),
                self.checkpoint.clone(),
                self.emitter.clone(),
            );
            let span = info_span!(
                "shard",
                consumer_id = %self.consumer_id,
                shard_id = %shard_id
            );
            let task = tokio::spawn(shard.run(shutdown_rx.clone()).instrument(span));
            tasks.push((shard_id.clone(), task));
        }

        info!(
            shard_count = shard_ids.len(),
            provider = self.provider.provider_name(),
            checkpoint = self.checkpoint.store_name(),
            emitter = self.emitter.emitter_name(),
            "✅ Consumer started"
        );

        Ok(ConsumerHandle {
            consumer_id: self.consumer_id,
            shard_ids,
            shutdown_tx,
            tasks,
            checkpoint: self.checkpoint.clone(),
        })
    }
}

/// Running shard loops started by [`Consumer::start`]
///
/// Dropping the handle signals shutdown; the loops still drain their buffers
/// but nobody waits for them.
pub struct ConsumerHandle {
    consumer_id: Uuid,
    shard_ids: Vec<String>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<ConnectorResult<ShardStats>>)>,
    checkpoint: Arc<dyn Checkpoint>,
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("consumer_id", &self.consumer_id)
            .field("shard_ids", &self.shard_ids)
            .finish()
    }
}

impl ConsumerHandle {
    pub fn shard_ids(&self) -> &[String] {
        &self.shard_ids
    }

    /// Shards whose loop has already returned
    pub fn finished_shards(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.is_finished())
            .map(|(shard_id, _)| shard_id.clone())
            .collect()
    }

    /// Signal every shard to stop without waiting
    pub fn request_shutdown(&self) {
        // Err only means every receiver is already gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop all shards, collect their outcomes, then shut the checkpoint store down
    ///
    /// Shard failures are reported in the outcomes; the returned error is
    /// reserved for the final checkpoint flush.
    pub async fn shutdown(self) -> ConnectorResult<Vec<ShardOutcome>> {
        info!(consumer_id = %self.consumer_id, "🛑 Shutting down consumer");
        self.request_shutdown();

        let checkpoint = self.checkpoint.clone();
        let outcomes = self.join().await;

        checkpoint.shutdown().await?;
        info!(
            shard_count = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
            "Consumer stopped"
        );
        Ok(outcomes)
    }

    /// Wait for every shard loop to end on its own
    pub async fn join(mut self) -> Vec<ShardOutcome> {
        let tasks = std::mem::take(&mut self.tasks);
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (shard_id, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(ConnectorError::task_join(
                    shard_id.clone(),
                    join_err.to_string(),
                )),
            };
            match &result {
                Err(err) if err.is_fatal() => {
                    error!(shard_id = %shard_id, error = %err, "Shard stopped permanently");
                }
                Err(err) => warn!(shard_id = %shard_id, error = %err, "Shard ended with error"),
                Ok(_) => {}
            }
            outcomes.push(ShardOutcome { shard_id, result });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::NoopCheckpoint;
    use crate::emitter::InMemoryEmitter;
    use crate::provider::{InMemoryStreamProvider, ProviderError};
    use std::time::Duration;

    fn config() -> ConnectorConfig {
        let mut config = ConnectorConfig::new("app", "orders", "local");
        config.buffer_size = 1;
        config.idle_poll_interval_ms = 5;
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut invalid = config();
        invalid.poll_batch_limit = 0;
        let err = Consumer::new(
            invalid,
            Arc::new(InMemoryStreamProvider::new()),
            Arc::new(NoopCheckpoint),
            Arc::new(InMemoryEmitter::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConnectorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_start_fails_when_shards_cannot_be_listed() {
        let provider = Arc::new(InMemoryStreamProvider::new());
        provider.create_stream("orders", 2);
        provider.fail_next_describe(ProviderError::transport("describe", "timeout"));

        let consumer = Consumer::new(
            config(),
            provider,
            Arc::new(NoopCheckpoint),
            Arc::new(InMemoryEmitter::new()),
        )
        .unwrap();
        let err = consumer.start().await.unwrap_err();
        assert!(matches!(err, ConnectorError::Provider(_)));
    }

    #[tokio::test]
    async fn test_one_loop_per_shard() {
        let provider = Arc::new(InMemoryStreamProvider::new());
        let shards = provider.create_stream("orders", 3);
        for shard in &shards {
            provider.put_record("orders", shard, shard.as_bytes()).unwrap();
        }
        let emitter = Arc::new(InMemoryEmitter::new());

        let consumer = Consumer::new(
            config(),
            provider,
            Arc::new(NoopCheckpoint),
            emitter.clone(),
        )
        .unwrap();
        let handle = consumer.start().await.unwrap();
        assert_eq!(handle.shard_ids(), shards.as_slice());

        while emitter.batch_count() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let outcomes = handle.shutdown().await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(ShardOutcome::is_ok));

        let mut payloads: Vec<_> = emitter.batches().into_iter().map(|b| b.payload).collect();
        payloads.sort();
        let expected: Vec<_> = shards.iter().map(|s| s.as_bytes().to_vec()).collect();
        assert_eq!(payloads, expected);
    }
}
