use proptest::prelude::*;
use stream_connectors::Record;

/// Strategy for generating shard identifiers
pub fn shard_id_strategy() -> impl Strategy<Value = String> {
    "shardId-[0-9]{12}"
}

/// Strategy for generating record payloads
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for generating a run of records with increasing sequence numbers
pub fn record_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(payload_strategy(), 1..=max_len).prop_map(|payloads| {
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, data)| Record::new(format!("{:020}", i + 1), data))
            .collect()
    })
}
