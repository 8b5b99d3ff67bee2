mod common;

use common::strategies::*;
use proptest::prelude::*;
use stream_connectors::{Buffer, Record};

proptest! {
    /// Property: FirstSeq is fixed by the first record, LastSeq tracks the latest
    #[test]
    fn buffer_sequence_bounds_track_additions(
        shard_id in shard_id_strategy(),
        records in record_batch_strategy(50),
    ) {
        let mut buffer = Buffer::new(shard_id, 0);
        let first = records[0].sequence_number.clone();
        for record in records {
            let seq = record.sequence_number.clone();
            buffer.add_record(record);
            prop_assert_eq!(buffer.first_seq(), Some(first.as_str()));
            prop_assert_eq!(buffer.last_seq(), Some(seq.as_str()));
        }
    }

    /// Property: ShouldFlush flips exactly when the count reaches the threshold
    #[test]
    fn should_flush_matches_threshold(max in 1usize..40, records in record_batch_strategy(80)) {
        let mut buffer = Buffer::new("shardId-000000000000", max);
        for record in records {
            buffer.add_record(record);
            prop_assert_eq!(buffer.should_flush(), buffer.record_count() >= max);
        }
    }

    /// Property: a buffer without a threshold never asks to flush
    #[test]
    fn zero_threshold_never_flushes(records in record_batch_strategy(80)) {
        let mut buffer = Buffer::new("shardId-000000000000", 0);
        for record in records {
            buffer.add_record(record);
            prop_assert!(!buffer.should_flush());
        }
    }

    /// Property: Flush hands back every record in order and resets the buffer
    #[test]
    fn flush_returns_records_and_resets(records in record_batch_strategy(50)) {
        let mut buffer = Buffer::new("shardId-000000000000", 10);
        for record in records.clone() {
            buffer.add_record(record);
        }
        let expected_payload: Vec<u8> = records.iter().flat_map(|r| r.data.clone()).collect();
        prop_assert_eq!(buffer.payload(), expected_payload);

        let flushed = buffer.flush();
        prop_assert_eq!(flushed, records);
        prop_assert_eq!(buffer.record_count(), 0);
        prop_assert!(buffer.is_empty());
        prop_assert_eq!(buffer.first_seq(), None);
        prop_assert_eq!(buffer.last_seq(), None);
        prop_assert!(!buffer.should_flush());
    }
}

#[cfg(test)]
mod buffer_invariants {
    use super::*;

    #[test]
    fn test_reused_buffer_behaves_as_new() {
        let mut buffer = Buffer::new("shardId-000000000000", 2);
        buffer.add_record(Record::new("1", "a"));
        buffer.add_record(Record::new("2", "b"));
        assert!(buffer.should_flush());
        buffer.flush();

        buffer.add_record(Record::new("3", "c"));
        assert!(!buffer.should_flush());
        assert_eq!(buffer.first_seq(), Some("3"));
        assert_eq!(buffer.last_seq(), Some("3"));
    }
}
