//! Scan-indexed checkpoint table used by the batched checkpoint.
//!
//! Items are addressed by `(namespace, shard_id)` where the namespace is
//! `<app>-<stream>`, matching the table layout of the batched store.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::errors::{CheckpointError, CheckpointResult};

/// One persisted checkpoint row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointItem {
    pub namespace: String,
    pub shard_id: String,
    pub sequence_number: String,
}

impl CheckpointItem {
    pub fn new(
        namespace: impl Into<String>,
        shard_id: impl Into<String>,
        sequence_number: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            shard_id: shard_id.into(),
            sequence_number: sequence_number.into(),
        }
    }
}

#[async_trait]
pub trait CheckpointTable: Send + Sync {
    /// Strongly consistent read of one item
    async fn get_item(
        &self,
        namespace: &str,
        shard_id: &str,
    ) -> CheckpointResult<Option<CheckpointItem>>;

    /// Idempotent overwrite of one item
    async fn put_item(&self, item: &CheckpointItem) -> CheckpointResult<()>;

    /// Verify the table exists and is reachable
    async fn describe(&self) -> CheckpointResult<()> {
        Ok(())
    }

    fn table_name(&self) -> &str;
}

/// In-memory checkpoint table with failure injection for tests
#[derive(Debug)]
pub struct InMemoryCheckpointTable {
    table_name: String,
    items: Mutex<HashMap<(String, String), CheckpointItem>>,
    get_failures: Mutex<VecDeque<CheckpointError>>,
    put_failures: Mutex<VecDeque<CheckpointError>>,
    put_attempts: AtomicUsize,
    puts: AtomicUsize,
}

impl InMemoryCheckpointTable {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            items: Mutex::new(HashMap::new()),
            get_failures: Mutex::new(VecDeque::new()),
            put_failures: Mutex::new(VecDeque::new()),
            put_attempts: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }

    /// Queue errors returned by the next `get_item` calls, in order
    pub fn fail_next_gets(&self, errors: impl IntoIterator<Item = CheckpointError>) {
        self.get_failures.lock().extend(errors);
    }

    /// Queue errors returned by the next `put_item` calls, in order
    pub fn fail_next_puts(&self, errors: impl IntoIterator<Item = CheckpointError>) {
        self.put_failures.lock().extend(errors);
    }

    /// Make the next `count` writes fail with a throttling error
    pub fn throttle_next_puts(&self, count: usize) {
        self.fail_next_puts(
            (0..count).map(|_| CheckpointError::throttled("put_item", "throughput exceeded")),
        );
    }

    pub fn item(&self, namespace: &str, shard_id: &str) -> Option<CheckpointItem> {
        self.items
            .lock()
            .get(&(namespace.to_string(), shard_id.to_string()))
            .cloned()
    }

    pub fn items(&self) -> Vec<CheckpointItem> {
        let mut items: Vec<_> = self.items.lock().values().cloned().collect();
        items.sort_by(|a, b| (&a.namespace, &a.shard_id).cmp(&(&b.namespace, &b.shard_id)));
        items
    }

    /// Writes that reached the table, failed ones included
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }

    /// Writes the table accepted
    pub fn successful_puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointTable for InMemoryCheckpointTable {
    async fn get_item(
        &self,
        namespace: &str,
        shard_id: &str,
    ) -> CheckpointResult<Option<CheckpointItem>> {
        if let Some(err) = self.get_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.item(namespace, shard_id))
    }

    async fn put_item(&self, item: &CheckpointItem) -> CheckpointResult<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.put_failures.lock().pop_front() {
            return Err(err);
        }
        self.items.lock().insert(
            (item.namespace.clone(), item.shard_id.clone()),
            item.clone(),
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}
