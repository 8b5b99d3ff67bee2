//! # Stream Provider
//!
//! The capability set a shard loop needs from the stream service: list the
//! shards of a stream, obtain an iterator at a position, and page through
//! records with that iterator.

pub mod errors;
pub mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::record::Record;

pub use errors::{ProviderError, ProviderResult};
pub use in_memory::InMemoryStreamProvider;

/// Opaque, short-lived cursor into a shard
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IteratorHandle(String);

impl IteratorHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IteratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a new iterator starts reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorPosition {
    /// Oldest record still retained by the shard
    FromStart,
    /// First record strictly after the given sequence number
    AfterMarker(String),
}

impl IteratorPosition {
    /// Position after `marker`, or the start of the shard when there is none
    pub fn resume_from(marker: Option<String>) -> Self {
        match marker {
            Some(marker) if !marker.is_empty() => Self::AfterMarker(marker),
            _ => Self::FromStart,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FromStart => "from_start",
            Self::AfterMarker(_) => "after_marker",
        }
    }
}

/// One poll result
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
    /// `None` once the shard is closed and fully read
    pub next_iterator: Option<IteratorHandle>,
}

#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Shard identifiers of the stream
    async fn describe_shards(&self, stream_name: &str) -> ProviderResult<Vec<String>>;

    async fn get_iterator(
        &self,
        stream_name: &str,
        shard_id: &str,
        position: IteratorPosition,
    ) -> ProviderResult<IteratorHandle>;

    /// Fetch up to `limit` records starting at `iterator`
    async fn poll(&self, iterator: &IteratorHandle, limit: usize) -> ProviderResult<Page>;

    fn provider_name(&self) -> &'static str;
}
