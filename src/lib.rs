#![allow(clippy::doc_markdown)] // Allow technical terms like DynamoDB, Kinesis in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Stream Connectors
//!
//! Consume records from a sharded, ordered stream and deliver them in batches to a
//! downstream sink, with durable per-shard checkpoints.
//!
//! ## Overview
//!
//! One consumer loop runs per shard. Records are pulled page by page into a bounded
//! buffer; when the buffer reaches its threshold the batch is emitted to the sink and
//! the sequence number of its last record is checkpointed. After a restart each shard
//! resumes strictly after its checkpoint, so delivery is at-least-once.
//!
//! ## Module Organization
//!
//! - [`buffer`] - Per-shard bounded record batch
//! - [`checkpoint`] - Checkpoint trait with write-through, batched and no-op stores
//! - [`config`] - Configuration loading and validation
//! - [`consumer`] - Dispatcher and per-shard consumer loop
//! - [`emitter`] - Downstream sink trait and batch key helper
//! - [`error`] - Crate-level error type
//! - [`logging`] - Structured logging setup and helpers
//! - [`provider`] - Stream provider trait (shard listing, iterators, paging)
//! - [`record`] - Stream record type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stream_connectors::{
//!     BatchedCheckpoint, ConnectorConfig, Consumer, InMemoryCheckpointTable, InMemoryEmitter,
//!     InMemoryStreamProvider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! stream_connectors::logging::init_structured_logging();
//!
//! let config = ConnectorConfig::load(Some("config/connector.toml".as_ref()))?;
//! let checkpoint = BatchedCheckpoint::from_config(
//!     &config,
//!     Arc::new(InMemoryCheckpointTable::new("checkpoints")),
//! )
//! .await?;
//!
//! let consumer = Consumer::new(
//!     config,
//!     Arc::new(InMemoryStreamProvider::new()),
//!     Arc::new(checkpoint),
//!     Arc::new(InMemoryEmitter::new()),
//! )?;
//! let handle = consumer.start().await?;
//! // ...
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `checkpoint-redis` - Redis backing store for the write-through checkpoint
//! - `checkpoint-dynamodb` - DynamoDB table for the batched checkpoint
//! - `benchmarks` - criterion benchmarks

pub mod buffer;
pub mod checkpoint;
pub mod config;
pub mod consumer;
pub mod emitter;
pub mod error;
pub mod logging;
pub mod provider;
pub mod record;

pub use buffer::Buffer;
pub use checkpoint::{
    BatchedCheckpoint, Checkpoint, CheckpointError, CheckpointResult, InMemoryCheckpointTable,
    InMemoryKeyValueStore, NoopCheckpoint, WriteThroughCheckpoint,
};
pub use config::{ConfigurationError, ConnectorConfig, RetryConfig};
pub use consumer::{Consumer, ConsumerHandle, ShardConsumer, ShardOutcome, ShardStats};
pub use emitter::{EmitError, Emitter, InMemoryEmitter};
pub use error::{ConnectorError, ConnectorResult};
pub use provider::{InMemoryStreamProvider, ProviderError, StreamProvider};
pub use record::Record;
