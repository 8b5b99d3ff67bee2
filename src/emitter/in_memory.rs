//! In-memory emitter that records every batch, with failure injection for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{EmitError, EmitResult, Emitter};

/// A batch as received by the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedBatch {
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct InMemoryEmitter {
    batches: Mutex<Vec<EmittedBatch>>,
    failures: Mutex<VecDeque<EmitError>>,
    failed_attempts: Mutex<usize>,
}

impl InMemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue errors returned by the next `emit` calls, in order
    pub fn fail_next(&self, errors: impl IntoIterator<Item = EmitError>) {
        self.failures.lock().extend(errors);
    }

    pub fn batches(&self) -> Vec<EmittedBatch> {
        self.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn failed_attempts(&self) -> usize {
        *self.failed_attempts.lock()
    }
}

#[async_trait]
impl Emitter for InMemoryEmitter {
    async fn emit(&self, key: &str, payload: Vec<u8>) -> EmitResult<()> {
        if let Some(err) = self.failures.lock().pop_front() {
            *self.failed_attempts.lock() += 1;
            return Err(err);
        }
        self.batches.lock().push(EmittedBatch {
            key: key.to_string(),
            payload,
        });
        Ok(())
    }

    fn emitter_name(&self) -> &'static str {
        "in_memory"
    }
}
