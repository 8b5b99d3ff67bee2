//! # Emitter Module
//!
//! Downstream sinks receive one call per flushed batch: an object key derived
//! from the batch's first and last sequence numbers plus the UTC date, and the
//! concatenated record payloads. Emit failures are not retried by the shard
//! loop; the batch stays buffered and un-checkpointed instead.

pub mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use in_memory::InMemoryEmitter;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmitError {
    #[error("Sink rejected batch: {message}")]
    Sink { message: String },

    #[error("Sink unavailable: {message}")]
    Unavailable { message: String },
}

impl EmitError {
    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Result type alias for emit operations
pub type EmitResult<T> = Result<T, EmitError>;

#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit(&self, key: &str, payload: Vec<u8>) -> EmitResult<()>;

    fn emitter_name(&self) -> &'static str;
}

/// Object key for a batch, dated today (UTC)
///
/// `<prefix>/<YYYY/MM/DD>/<first>-<last>`, or without the prefix segment when
/// the prefix is empty.
pub fn key(prefix: &str, first_seq: &str, last_seq: &str) -> String {
    key_at(Utc::now(), prefix, first_seq, last_seq)
}

/// Object key for a batch dated at `at`
pub fn key_at(at: DateTime<Utc>, prefix: &str, first_seq: &str, last_seq: &str) -> String {
    let date = at.format("%Y/%m/%d");
    if prefix.is_empty() {
        format!("{date}/{first_seq}-{last_seq}")
    } else {
        format!("{prefix}/{date}/{first_seq}-{last_seq}")
    }
}
