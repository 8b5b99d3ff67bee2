//! # In-Memory Stream Provider
//!
//! Stream provider that keeps shards in memory, for tests and local runs.
//! Sequence numbers are zero-padded counters, so lexicographic order matches
//! arrival order. Every poll issues a fresh iterator handle, like a hosted
//! stream service, and handles can be expired to exercise iterator renewal.
//!
//! Failures can be queued for `describe_shards`, `get_iterator` (per shard)
//! and `poll`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::errors::{ProviderError, ProviderResult};
use super::{IteratorHandle, IteratorPosition, Page, StreamProvider};
use crate::record::Record;

#[derive(Debug, Default)]
struct ShardState {
    records: Vec<Record>,
    next_sequence: u64,
    closed: bool,
}

#[derive(Debug, Clone)]
struct IteratorState {
    stream_name: String,
    shard_id: String,
    offset: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryStreamProvider {
    streams: RwLock<HashMap<String, BTreeMap<String, ShardState>>>,
    iterators: Mutex<HashMap<String, IteratorState>>,
    next_iterator_id: AtomicU64,
    repeat_handle_when_idle: bool,
    describe_failures: Mutex<VecDeque<ProviderError>>,
    iterator_failures: Mutex<HashMap<String, VecDeque<ProviderError>>>,
    poll_failures: Mutex<VecDeque<ProviderError>>,
    iterator_requests: Mutex<Vec<(String, IteratorPosition)>>,
    polls: AtomicUsize,
}

impl InMemoryStreamProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the polled handle unchanged when a page comes back empty
    pub fn with_repeated_idle_handles(mut self) -> Self {
        self.repeat_handle_when_idle = true;
        self
    }

    /// Create a stream with `shard_count` shards named `shardId-000000000000`, ...
    pub fn create_stream(&self, stream_name: &str, shard_count: usize) -> Vec<String> {
        let shard_ids: Vec<String> = (0..shard_count)
            .map(|i| format!("shardId-{i:012}"))
            .collect();
        let mut streams = self.streams.write();
        let shards = streams.entry(stream_name.to_string()).or_default();
        for shard_id in &shard_ids {
            shards.entry(shard_id.clone()).or_default();
        }
        shard_ids
    }

    /// Append a record, returning its assigned sequence number
    pub fn put_record(
        &self,
        stream_name: &str,
        shard_id: &str,
        data: impl Into<Vec<u8>>,
    ) -> ProviderResult<String> {
        let mut streams = self.streams.write();
        let shard = streams
            .get_mut(stream_name)
            .ok_or_else(|| ProviderError::stream_not_found(stream_name))?
            .get_mut(shard_id)
            .ok_or_else(|| ProviderError::shard_not_found(stream_name, shard_id))?;

        shard.next_sequence += 1;
        let sequence_number = format!("{:020}", shard.next_sequence);
        shard
            .records
            .push(Record::new(sequence_number.clone(), data).with_partition_key(shard_id));
        Ok(sequence_number)
    }

    /// Append several records in order
    pub fn put_records<I, D>(
        &self,
        stream_name: &str,
        shard_id: &str,
        data: I,
    ) -> ProviderResult<Vec<String>>
    where
        I: IntoIterator<Item = D>,
        D: Into<Vec<u8>>,
    {
        data.into_iter()
            .map(|d| self.put_record(stream_name, shard_id, d))
            .collect()
    }

    /// Mark a shard closed; once drained, polls return no next iterator
    pub fn close_shard(&self, stream_name: &str, shard_id: &str) -> ProviderResult<()> {
        let mut streams = self.streams.write();
        let shard = streams
            .get_mut(stream_name)
            .and_then(|shards| shards.get_mut(shard_id))
            .ok_or_else(|| ProviderError::shard_not_found(stream_name, shard_id))?;
        shard.closed = true;
        Ok(())
    }

    /// Invalidate every outstanding iterator handle
    pub fn expire_iterators(&self) {
        self.iterators.lock().clear();
    }

    pub fn fail_next_describe(&self, error: ProviderError) {
        self.describe_failures.lock().push_back(error);
    }

    /// Queue errors for the next `get_iterator` calls on `shard_id`
    pub fn fail_next_iterators(
        &self,
        shard_id: &str,
        errors: impl IntoIterator<Item = ProviderError>,
    ) {
        self.iterator_failures
            .lock()
            .entry(shard_id.to_string())
            .or_default()
            .extend(errors);
    }

    /// Queue errors for the next `poll` calls, whichever shard makes them
    pub fn fail_next_polls(&self, errors: impl IntoIterator<Item = ProviderError>) {
        self.poll_failures.lock().extend(errors);
    }

    /// Positions requested for `shard_id`, oldest first
    pub fn iterator_requests(&self, shard_id: &str) -> Vec<IteratorPosition> {
        self.iterator_requests
            .lock()
            .iter()
            .filter(|(shard, _)| shard == shard_id)
            .map(|(_, position)| position.clone())
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn issue_handle(&self, state: IteratorState) -> IteratorHandle {
        let id = self.next_iterator_id.fetch_add(1, Ordering::SeqCst);
        let handle = format!("{}/{}/{}/{}", state.stream_name, state.shard_id, state.offset, id);
        self.iterators.lock().insert(handle.clone(), state);
        IteratorHandle::new(handle)
    }
}

#[async_trait]
impl StreamProvider for InMemoryStreamProvider {
    async fn describe_shards(&self, stream_name: &str) -> ProviderResult<Vec<String>> {
        if let Some(err) = self.describe_failures.lock().pop_front() {
            return Err(err);
        }
        self.streams
            .read()
            .get(stream_name)
            .map(|shards| shards.keys().cloned().collect())
            .ok_or_else(|| ProviderError::stream_not_found(stream_name))
    }

    async fn get_iterator(
        &self,
        stream_name: &str,
        shard_id: &str,
        position: IteratorPosition,
    ) -> ProviderResult<IteratorHandle> {
        self.iterator_requests
            .lock()
            .push((shard_id.to_string(), position.clone()));

        let injected = self
            .iterator_failures
            .lock()
            .get_mut(shard_id)
            .and_then(|errors| errors.pop_front());
        if let Some(err) = injected {
            return Err(err);
        }

        let offset = {
            let streams = self.streams.read();
            let shard = streams
                .get(stream_name)
                .ok_or_else(|| ProviderError::stream_not_found(stream_name))?
                .get(shard_id)
                .ok_or_else(|| ProviderError::shard_not_found(stream_name, shard_id))?;

            match &position {
                IteratorPosition::FromStart => 0,
                IteratorPosition::AfterMarker(marker) => shard
                    .records
                    .iter()
                    .position(|r| r.sequence_number.as_str() > marker.as_str())
                    .unwrap_or(shard.records.len()),
            }
        };

        Ok(self.issue_handle(IteratorState {
            stream_name: stream_name.to_string(),
            shard_id: shard_id.to_string(),
            offset,
        }))
    }

    async fn poll(&self, iterator: &IteratorHandle, limit: usize) -> ProviderResult<Page> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.poll_failures.lock().pop_front() {
            return Err(err);
        }

        let state = self
            .iterators
            .lock()
            .remove(iterator.as_str())
            .ok_or_else(|| {
                ProviderError::invalid_iterator(format!("unknown or expired iterator {iterator}"))
            })?;

        let (records, exhausted) = {
            let streams = self.streams.read();
            let shard = streams
                .get(&state.stream_name)
                .and_then(|shards| shards.get(&state.shard_id))
                .ok_or_else(|| {
                    ProviderError::shard_not_found(&state.stream_name, &state.shard_id)
                })?;

            let end = state.offset.saturating_add(limit).min(shard.records.len());
            let records = shard.records[state.offset.min(end)..end].to_vec();
            (records, shard.closed && end >= shard.records.len())
        };

        if exhausted {
            return Ok(Page {
                records,
                next_iterator: None,
            });
        }

        let next_iterator = if records.is_empty() && self.repeat_handle_when_idle {
            self.iterators
                .lock()
                .insert(iterator.as_str().to_string(), state);
            iterator.clone()
        } else {
            self.issue_handle(IteratorState {
                offset: state.offset + records.len(),
                ..state
            })
        };

        Ok(Page {
            records,
            next_iterator: Some(next_iterator),
        })
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
