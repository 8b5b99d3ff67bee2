//! Stream record as delivered by a [`StreamProvider`](crate::provider::StreamProvider).

use serde::{Deserialize, Serialize};

/// A single record read from a shard
///
/// The sequence number is opaque and provider-assigned; ordering within a
/// shard is defined by arrival order, never by parsing the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sequence_number: String,
    pub partition_key: Option<String>,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(sequence_number: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence_number: sequence_number.into(),
            partition_key: None,
            data: data.into(),
        }
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }
}
