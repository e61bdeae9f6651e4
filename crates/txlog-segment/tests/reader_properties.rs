//! Reader behaviour on interrupted and pre-allocated segments, every format.

use proptest::prelude::*;
use txlog_segment::{
    LogEntry, LogEntryReader, MemorySegmentStore, SEGMENT_HEADER_SIZE, SegmentHeader, SegmentKind,
    SegmentWriter, StopReason, TransactionRecord,
};
use txlog_types::{FormatVersion, LogPosition, StoreIdentity};

fn format() -> impl Strategy<Value = FormatVersion> {
    prop::sample::select(FormatVersion::ALL.to_vec())
}

/// Segment with `count` simple transactions and the offsets right after
/// each of its entries.
fn segment(format: FormatVersion, count: i64) -> (Vec<u8>, Vec<u64>) {
    let mut writer = SegmentWriter::new(SegmentHeader::new(
        format,
        SegmentKind::Transaction,
        0,
        0,
        StoreIdentity::new(1_700_000_000, 7, "record-engine", "standard", 5, 0),
    ))
    .expect("segment writer");
    for tx in 1..=count {
        writer
            .append_transaction(&TransactionRecord::simple(tx))
            .expect("append transaction");
    }
    let bytes = writer.finish();

    let store = MemorySegmentStore::new();
    store.put_segment(0, bytes.clone());
    let mut reader =
        LogEntryReader::open(&store, LogPosition::new(0, SEGMENT_HEADER_SIZE)).expect("reader");
    let mut boundaries = vec![SEGMENT_HEADER_SIZE];
    while reader.next_entry().expect("entry").is_some() {
        boundaries.push(reader.position().byte_offset);
    }
    (bytes, boundaries)
}

fn read_all(bytes: Vec<u8>) -> (Vec<i64>, LogEntryReader) {
    let store = MemorySegmentStore::new();
    store.put_segment(0, bytes);
    let mut reader =
        LogEntryReader::open(&store, LogPosition::new(0, SEGMENT_HEADER_SIZE)).expect("reader");
    let mut commits = Vec::new();
    while let Some(entry) = reader.next_entry().expect("entry") {
        if let LogEntry::Commit(commit) = entry {
            commits.push(commit.tx_id);
        }
    }
    (commits, reader)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_truncation_stops_at_last_complete_entry(
        format in format(),
        count in 1_i64..5,
        cut_seed in any::<prop::sample::Index>(),
    ) {
        let (bytes, boundaries) = segment(format, count);
        let body = bytes.len() - SEGMENT_HEADER_SIZE as usize;
        let cut = SEGMENT_HEADER_SIZE as usize + cut_seed.index(body + 1);
        let (commits, reader) = read_all(bytes[..cut].to_vec());

        let last_boundary = boundaries
            .iter()
            .copied()
            .filter(|b| *b <= cut as u64)
            .max()
            .expect("header boundary");
        prop_assert_eq!(reader.position().byte_offset, last_boundary);
        let expected: Vec<i64> = (1..=count).take(commits.len()).collect();
        prop_assert_eq!(&commits, &expected);
        if last_boundary == cut as u64 {
            prop_assert_eq!(reader.stop_reason(), Some(&StopReason::EndOfSegment));
        } else {
            prop_assert_eq!(reader.stop_reason(), Some(&StopReason::IncompleteEntry));
            prop_assert!(reader.last_read_failed());
        }
    }

    #[test]
    fn prop_zero_padding_ends_reading_at_written_data(
        format in format(),
        count in 0_i64..4,
        padding in 1_usize..512,
    ) {
        let (mut bytes, _) = segment(format, count);
        let written = bytes.len() as u64;
        bytes.resize(bytes.len() + padding, 0);
        let (commits, reader) = read_all(bytes);

        prop_assert_eq!(commits.len() as i64, count);
        prop_assert_eq!(reader.position().byte_offset, written);
        prop_assert_eq!(reader.stop_reason(), Some(&StopReason::ZeroPadding));
        prop_assert!(!reader.fully_consumed());
    }
}
