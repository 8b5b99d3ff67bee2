//! # Batched Checkpoint
//!
//! `set` only records the marker in a concurrent in-memory map. A background
//! task owned by the checkpoint persists changed entries to a
//! [`CheckpointTable`] on a fixed interval, and [`BatchedCheckpoint::shutdown`]
//! stops that task and performs one final synchronous flush.
//!
//! Flush cycles are serialized by an async lock, so the interval task and a
//! shutdown never write concurrently. The map itself is never locked across
//! I/O: a cycle snapshots the dirty entries, writes them, and then clears the
//! dirty flag only on entries whose marker did not move in the meantime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::errors::CheckpointResult;
use super::retry::RetryPolicy;
use super::table::{CheckpointItem, CheckpointTable};
use super::{ensure_marker, Checkpoint};
use crate::config::ConnectorConfig;
use crate::logging::log_checkpoint_operation;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CheckpointKey {
    stream_name: String,
    shard_id: String,
}

impl CheckpointKey {
    fn new(stream_name: &str, shard_id: &str) -> Self {
        Self {
            stream_name: stream_name.to_string(),
            shard_id: shard_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    sequence_number: String,
    dirty: bool,
}

struct BatchedState {
    app_name: String,
    table: Arc<dyn CheckpointTable>,
    pending: DashMap<CheckpointKey, PendingEntry>,
    flush_lock: AsyncMutex<()>,
    retry: RetryPolicy,
}

impl BatchedState {
    fn namespace(&self, stream_name: &str) -> String {
        format!("{}-{}", self.app_name, stream_name)
    }

    /// Persist every dirty entry; returns how many items were written
    async fn flush(&self) -> CheckpointResult<usize> {
        let _guard = self.flush_lock.lock().await;

        let snapshot: Vec<(CheckpointKey, String)> = self
            .pending
            .iter()
            .filter(|entry| entry.dirty)
            .map(|entry| (entry.key().clone(), entry.sequence_number.clone()))
            .collect();

        if snapshot.is_empty() {
            return Ok(0);
        }

        for (key, sequence_number) in &snapshot {
            let item = CheckpointItem::new(
                self.namespace(&key.stream_name),
                key.shard_id.clone(),
                sequence_number.clone(),
            );
            if let Err(err) = self.retry.run("put_item", || self.table.put_item(&item)).await {
                log_checkpoint_operation(
                    "flush",
                    self.table.table_name(),
                    snapshot.len(),
                    "failed",
                    Some(&err.to_string()),
                );
                return Err(err);
            }
        }

        for (key, sequence_number) in &snapshot {
            if let Some(mut entry) = self.pending.get_mut(key) {
                if entry.sequence_number == *sequence_number {
                    entry.dirty = false;
                }
            }
        }

        log_checkpoint_operation(
            "flush",
            self.table.table_name(),
            snapshot.len(),
            "persisted",
            None,
        );
        Ok(snapshot.len())
    }
}

pub struct BatchedCheckpoint {
    state: Arc<BatchedState>,
    shutdown_tx: watch::Sender<bool>,
    flush_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    flush_interval: Duration,
}

impl std::fmt::Debug for BatchedCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedCheckpoint")
            .field("app_name", &self.state.app_name)
            .field("table", &self.state.table.table_name())
            .field("flush_interval", &self.flush_interval)
            .field("pending", &self.state.pending.len())
            .finish()
    }
}

impl BatchedCheckpoint {
    /// Verify the table, then start the interval flush task
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        app_name: impl Into<String>,
        table: Arc<dyn CheckpointTable>,
        flush_interval: Duration,
        retry: RetryPolicy,
    ) -> CheckpointResult<Self> {
        table.describe().await?;

        let state = Arc::new(BatchedState {
            app_name: app_name.into(),
            table,
            pending: DashMap::new(),
            flush_lock: AsyncMutex::new(()),
            retry,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let flush_task = tokio::spawn(run_flush_loop(state.clone(), flush_interval, shutdown_rx));

        info!(
            app_name = %state.app_name,
            table = %state.table.table_name(),
            flush_interval_ms = flush_interval.as_millis() as u64,
            max_attempts = ?state.retry.max_attempts(),
            "✅ Batched checkpoint started"
        );

        Ok(Self {
            state,
            shutdown_tx,
            flush_task: parking_lot::Mutex::new(Some(flush_task)),
            flush_interval,
        })
    }

    /// Start with the interval and retry policy from the connector configuration
    pub async fn from_config(
        config: &ConnectorConfig,
        table: Arc<dyn CheckpointTable>,
    ) -> CheckpointResult<Self> {
        Self::start(
            config.app_name.clone(),
            table,
            config.checkpoint_flush_interval(),
            RetryPolicy::from(&config.checkpoint_retry),
        )
        .await
    }

    /// Persist pending entries now, outside the interval schedule
    pub async fn flush(&self) -> CheckpointResult<usize> {
        self.state.flush().await
    }

    /// Entries set since their last successful persist
    pub fn pending_count(&self) -> usize {
        self.state.pending.iter().filter(|entry| entry.dirty).count()
    }

    /// Stop the interval task and persist everything still pending
    pub async fn shutdown(&self) -> CheckpointResult<()> {
        let flush_task = self.flush_task.lock().take();
        if let Some(handle) = flush_task {
            let _ = self.shutdown_tx.send(true);
            if let Err(err) = handle.await {
                warn!(error = %err, "Checkpoint flush task ended abnormally");
            }
            debug!("Checkpoint flush task stopped");
        }

        let written = self.state.flush().await?;
        info!(entries = written, "Batched checkpoint shut down");
        Ok(())
    }
}

impl Drop for BatchedCheckpoint {
    fn drop(&mut self) {
        if let Some(handle) = self.flush_task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_flush_loop(
    state: Arc<BatchedState>,
    flush_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = state.flush().await {
                    error!(error = %err, "Periodic checkpoint flush failed; entries stay pending");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Checkpoint for BatchedCheckpoint {
    /// Latest marker for the shard, preferring progress not yet persisted
    async fn get(&self, stream_name: &str, shard_id: &str) -> CheckpointResult<Option<String>> {
        let key = CheckpointKey::new(stream_name, shard_id);
        let pending = self
            .state
            .pending
            .get(&key)
            .map(|entry| entry.sequence_number.clone());
        if pending.is_some() {
            return Ok(pending);
        }

        let namespace = self.state.namespace(stream_name);
        let item = self
            .state
            .retry
            .run("get_item", || self.state.table.get_item(&namespace, shard_id))
            .await?;

        Ok(item
            .map(|item| item.sequence_number)
            .filter(|sequence_number| !sequence_number.is_empty()))
    }

    async fn set(
        &self,
        stream_name: &str,
        shard_id: &str,
        sequence_number: &str,
    ) -> CheckpointResult<()> {
        ensure_marker(stream_name, shard_id, sequence_number)?;

        self.state.pending.insert(
            CheckpointKey::new(stream_name, shard_id),
            PendingEntry {
                sequence_number: sequence_number.to_string(),
                dirty: true,
            },
        );
        Ok(())
    }

    async fn shutdown(&self) -> CheckpointResult<()> {
        BatchedCheckpoint::shutdown(self).await
    }

    fn store_name(&self) -> &'static str {
        "batched"
    }
}
