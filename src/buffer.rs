//! # Record Buffer
//!
//! Ordered accumulation of records for a single shard. The buffer only answers
//! "should we flush" and resets itself on [`Buffer::flush`]; emitting and
//! checkpointing belong to the shard loop, so a failed emit never leaves the
//! buffer half-cleared.

use crate::record::Record;

#[derive(Debug, Clone)]
pub struct Buffer {
    records: Vec<Record>,
    max_record_count: usize,
    shard_id: String,
}

impl Buffer {
    /// Create an empty buffer; a `max_record_count` of 0 never requests a flush
    pub fn new(shard_id: impl Into<String>, max_record_count: usize) -> Self {
        Self {
            records: Vec::new(),
            max_record_count,
            shard_id: shard_id.into(),
        }
    }

    /// Append a record in arrival order
    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// True once the configured batch size has been reached
    pub fn should_flush(&self) -> bool {
        self.max_record_count > 0 && self.records.len() >= self.max_record_count
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence number of the oldest buffered record
    pub fn first_seq(&self) -> Option<&str> {
        self.records.first().map(|r| r.sequence_number.as_str())
    }

    /// Sequence number of the newest buffered record
    pub fn last_seq(&self) -> Option<&str> {
        self.records.last().map(|r| r.sequence_number.as_str())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn max_record_count(&self) -> usize {
        self.max_record_count
    }

    /// Concatenated payload of every buffered record, in order
    pub fn payload(&self) -> Vec<u8> {
        let size = self.records.iter().map(|r| r.data.len()).sum();
        let mut payload = Vec::with_capacity(size);
        for record in &self.records {
            payload.extend_from_slice(&record.data);
        }
        payload
    }

    /// Clear the buffer, returning the records it held
    pub fn flush(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }
}
