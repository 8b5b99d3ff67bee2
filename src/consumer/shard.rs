//! # Shard Consumer Loop
//!
//! One loop per shard, cycling through three states:
//!
//! - **Iterating**: derive an iterator after the resume marker (buffered
//!   progress first, then the checkpoint), or from the start of the shard
//! - **Polling**: fetch a page and append each record to the buffer
//! - **Flushing**: entered mid-page when the buffer is full; emit the batch,
//!   checkpoint its last sequence number, reset the buffer
//!
//! A missing or unchanged next-iterator sends the loop back to Iterating. Poll
//! errors are logged and followed by a fresh iterator. Failing to obtain the
//! first iterator ends the shard with an error; later renewals retry provider
//! errors that are retryable and give up on the rest. Shutdown interrupts
//! polling and idle waits, and a non-empty buffer is flushed before the loop
//! returns.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::buffer::Buffer;
use crate::checkpoint::Checkpoint;
use crate::config::ConnectorConfig;
use crate::emitter::{self, Emitter};
use crate::error::{ConnectorError, ConnectorResult};
use crate::logging::log_shard_operation;
use crate::provider::{IteratorHandle, IteratorPosition, StreamProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardState {
    Iterating,
    Polling,
    Flushing,
}

/// Counters reported when a shard loop ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub records_received: u64,
    pub batches_emitted: u64,
    pub emit_failures: u64,
    pub checkpoint_failures: u64,
    pub poll_errors: u64,
    pub iterators_obtained: u64,
    pub iterator_retries: u64,
}

pub struct ShardConsumer {
    shard_id: String,
    config: Arc<ConnectorConfig>,
    provider: Arc<dyn StreamProvider>,
    checkpoint: Arc<dyn Checkpoint>,
    emitter: Arc<dyn Emitter>,
    buffer: Buffer,
    state: ShardState,
    stats: ShardStats,
    last_flush: Instant,
}

impl std::fmt::Debug for ShardConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardConsumer")
            .field("shard_id", &self.shard_id)
            .field("stream_name", &self.config.stream_name)
            .field("state", &self.state)
            .field("buffered", &self.buffer.record_count())
            .finish()
    }
}

impl ShardConsumer {
    pub fn new(
        shard_id: impl Into<String>,
        config: Arc<ConnectorConfig>,
        provider: Arc<dyn StreamProvider>,
        checkpoint: Arc<dyn Checkpoint>,
        emitter: Arc<dyn Emitter>,
    ) -> Self {
        let shard_id = shard_id.into();
        let buffer = Buffer::new(shard_id.clone(), config.buffer_size);
        Self {
            shard_id,
            config,
            provider,
            checkpoint,
            emitter,
            buffer,
            state: ShardState::Iterating,
            stats: ShardStats::default(),
            last_flush: Instant::now(),
        }
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn state(&self) -> ShardState {
        self.state
    }

    /// Drive the shard until `shutdown` fires or an iterator cannot be obtained
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConnectorResult<ShardStats> {
        info!(
            stream_name = %self.config.stream_name,
            shard_id = %self.shard_id,
            buffer_size = self.config.buffer_size,
            "🚀 Processing shard"
        );

        let mut iterator = match self.renew_iterator().await {
            Ok(iterator) => iterator,
            Err(err) => {
                error!(shard_id = %self.shard_id, error = %err, "Unable to start shard");
                return Err(err);
            }
        };

        while !is_shutdown(&shutdown) {
            self.state = ShardState::Polling;
            let polled = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                page = self.provider.poll(&iterator, self.config.poll_batch_limit) => page,
            };

            let page = match polled {
                Ok(page) => page,
                Err(err) => {
                    self.stats.poll_errors += 1;
                    warn!(
                        shard_id = %self.shard_id,
                        error = %err,
                        "Poll failed; re-deriving iterator"
                    );
                    if sleep_or_shutdown(self.config.error_backoff(), &mut shutdown).await {
                        break;
                    }
                    iterator = match self.resume_iterator(&mut shutdown).await? {
                        Some(iterator) => iterator,
                        None => break,
                    };
                    continue;
                }
            };

            let idle = page.records.is_empty();
            for record in page.records {
                self.stats.records_received += 1;
                self.buffer.add_record(record);
                if self.buffer.should_flush() {
                    self.flush().await;
                }
            }
            self.flush_if_interval_elapsed().await;

            iterator = match page.next_iterator {
                Some(next) if next != iterator => next,
                _ => {
                    debug!(shard_id = %self.shard_id, "Iterator exhausted; renewing");
                    match self.resume_iterator(&mut shutdown).await? {
                        Some(iterator) => iterator,
                        None => break,
                    }
                }
            };

            if idle && sleep_or_shutdown(self.config.idle_poll_interval(), &mut shutdown).await {
                break;
            }
        }

        if !self.buffer.is_empty() {
            self.flush().await;
        }

        info!(
            shard_id = %self.shard_id,
            records_received = self.stats.records_received,
            batches_emitted = self.stats.batches_emitted,
            "🛑 Shard consumer stopped"
        );
        Ok(self.stats)
    }

    /// Obtain an iterator positioned after the latest known progress
    async fn renew_iterator(&mut self) -> ConnectorResult<IteratorHandle> {
        self.state = ShardState::Iterating;

        // Unflushed records are already in the buffer; never read them twice
        let marker = match self.buffer.last_seq() {
            Some(last_seq) => Some(last_seq.to_string()),
            None => {
                self.checkpoint
                    .get(&self.config.stream_name, &self.shard_id)
                    .await?
            }
        };
        let position = IteratorPosition::resume_from(marker);

        let iterator = self
            .provider
            .get_iterator(&self.config.stream_name, &self.shard_id, position.clone())
            .await
            .map_err(|err| ConnectorError::shard_iterator(self.shard_id.clone(), err))?;

        self.stats.iterators_obtained += 1;
        debug!(
            shard_id = %self.shard_id,
            position = position.name(),
            "Shard iterator obtained"
        );
        Ok(iterator)
    }

    /// Renew the iterator of a running shard
    ///
    /// Retryable provider errors are retried after `error_backoff`; `None`
    /// means shutdown was requested while waiting.
    async fn resume_iterator(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectorResult<Option<IteratorHandle>> {
        loop {
            match self.renew_iterator().await {
                Ok(iterator) => return Ok(Some(iterator)),
                Err(ConnectorError::ShardIterator { source, .. }) if source.is_retryable() => {
                    self.stats.iterator_retries += 1;
                    warn!(
                        shard_id = %self.shard_id,
                        error = %source,
                        "Iterator renewal failed; retrying"
                    );
                    if sleep_or_shutdown(self.config.error_backoff(), shutdown).await {
                        return Ok(None);
                    }
                }
                Err(err) => {
                    error!(
                        shard_id = %self.shard_id,
                        error = %err,
                        "Unable to renew shard iterator"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Emit the buffer, checkpoint its last sequence number, then reset it
    ///
    /// Returns false when the emitter failed; the batch then stays buffered
    /// and the checkpoint does not move.
    async fn flush(&mut self) -> bool {
        let (first_seq, last_seq) = match (self.buffer.first_seq(), self.buffer.last_seq()) {
            (Some(first), Some(last)) => (first.to_string(), last.to_string()),
            _ => return true,
        };
        self.state = ShardState::Flushing;

        let prefix = self.config.key_prefix.as_deref().unwrap_or("");
        let key = emitter::key(prefix, &first_seq, &last_seq);
        let record_count = self.buffer.record_count();

        if let Err(err) = self.emitter.emit(&key, self.buffer.payload()).await {
            self.stats.emit_failures += 1;
            warn!(
                shard_id = %self.shard_id,
                key = %key,
                record_count = record_count,
                error = %err,
                "Emit failed; batch stays buffered"
            );
            self.state = ShardState::Polling;
            return false;
        }
        self.stats.batches_emitted += 1;

        if let Err(err) = self
            .checkpoint
            .set(&self.config.stream_name, &self.shard_id, &last_seq)
            .await
        {
            self.stats.checkpoint_failures += 1;
            error!(
                shard_id = %self.shard_id,
                sequence_number = %last_seq,
                error = %err,
                "Checkpoint failed after emit; batch will be redelivered on restart"
            );
        }

        log_shard_operation(
            "flush",
            &self.config.stream_name,
            &self.shard_id,
            record_count,
            Some(&first_seq),
            Some(&last_seq),
        );

        self.buffer.flush();
        self.last_flush = Instant::now();
        self.state = ShardState::Polling;
        true
    }

    /// Time-based flushing for buffers without a record-count threshold
    async fn flush_if_interval_elapsed(&mut self) {
        if self.buffer.max_record_count() == 0
            && !self.buffer.is_empty()
            && self.last_flush.elapsed() >= self.config.flush_interval()
        {
            self.flush().await;
        }
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Resolves once shutdown is signalled or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `duration`; true if shutdown was requested first
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
