//! String key-value backing store used by the write-through checkpoint.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::errors::{CheckpointError, CheckpointResult};

/// Minimal key-value capability a write-through checkpoint needs
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key; `Ok(None)` when the key was never written
    async fn get(&self, key: &str) -> CheckpointResult<Option<String>>;

    /// Overwrite a key
    async fn set(&self, key: &str, value: &str) -> CheckpointResult<()>;

    /// Verify the store is reachable
    async fn ping(&self) -> CheckpointResult<()> {
        Ok(())
    }

    fn store_name(&self) -> &'static str;
}

/// In-memory key-value store with failure injection for tests
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
    get_failures: Mutex<VecDeque<CheckpointError>>,
    set_failures: Mutex<VecDeque<CheckpointError>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue errors returned by the next `get` calls, in order
    pub fn fail_next_gets(&self, errors: impl IntoIterator<Item = CheckpointError>) {
        self.get_failures.lock().extend(errors);
    }

    /// Queue errors returned by the next `set` calls, in order
    pub fn fail_next_sets(&self, errors: impl IntoIterator<Item = CheckpointError>) {
        self.set_failures.lock().extend(errors);
    }

    /// Raw value stored under `key`
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> CheckpointResult<Option<String>> {
        if let Some(err) = self.get_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CheckpointResult<()> {
        if let Some(err) = self.set_failures.lock().pop_front() {
            return Err(err);
        }
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "in_memory"
    }
}
