//! Tail resolution over segment files in a temporary store directory.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use txlog_recovery::{LogTailService, TailScanConfig};
use txlog_segment::{
    CheckpointEntry, FileSegmentStore, LogEntry, SegmentHeader, SegmentKind, SegmentWriter,
    TransactionRecord,
};
use txlog_types::{AppendBatchInfo, FormatVersion, LogPosition, StoreIdentity, TransactionId};

const TRANSACTION_PREFIX: &str = "transaction.log";
const CHECKPOINT_PREFIX: &str = "checkpoint";

fn store_id() -> StoreIdentity {
    StoreIdentity::new(1_700_000_000, 42, "record-engine", "standard", 5, 0)
}

fn writer(kind: SegmentKind, version: u64, last_committed: i64) -> SegmentWriter {
    SegmentWriter::new(SegmentHeader::new(
        FormatVersion::V4,
        kind,
        version,
        last_committed,
        store_id(),
    ))
    .expect("segment writer")
}

fn checkpoint(position: LogPosition, tx_id: i64) -> LogEntry {
    LogEntry::Checkpoint(CheckpointEntry {
        format_version: FormatVersion::V4,
        transaction_log_position: position,
        transaction_id: TransactionId::new(tx_id, tx_id, FormatVersion::V4, 11, 22, 33),
        append_index: tx_id,
        time_written: 1_700_000_000_500,
        store_id: store_id(),
        reason: "scheduled checkpoint".to_owned(),
    })
}

struct StoreDir {
    transactions: Arc<FileSegmentStore>,
    checkpoints: Arc<FileSegmentStore>,
}

impl StoreDir {
    fn new(root: &Path) -> Self {
        Self {
            transactions: Arc::new(FileSegmentStore::new(root.join("tx"), TRANSACTION_PREFIX)),
            checkpoints: Arc::new(FileSegmentStore::new(root.join("tx"), CHECKPOINT_PREFIX)),
        }
    }

    fn service(&self, config: TailScanConfig) -> LogTailService {
        LogTailService::new(self.transactions.clone(), self.checkpoints.clone(), config)
    }
}

/// Two transactions in segment 0, a checkpoint after the first, a third
/// transaction in segment 1. Returns the end of the third transaction.
fn write_history(dir: &StoreDir) -> (LogPosition, LogPosition) {
    let mut first = writer(SegmentKind::Transaction, 0, 0);
    let checkpointed = first
        .append_transaction(&TransactionRecord::simple(1))
        .expect("tx 1")
        .end;
    first
        .append_transaction(&TransactionRecord::simple(2))
        .expect("tx 2");
    let checksum = first.previous_checksum();
    dir.transactions
        .put_segment(0, &first.finish())
        .expect("write segment 0");

    let mut second = writer(SegmentKind::Transaction, 1, 2).with_previous_checksum(checksum);
    let third = second
        .append_transaction(&TransactionRecord::simple(3))
        .expect("tx 3");
    second.preallocate(1024);
    dir.transactions
        .put_segment(1, &second.finish())
        .expect("write segment 1");

    let mut checkpoints = writer(SegmentKind::Checkpoint, 0, 0);
    checkpoints
        .append(&checkpoint(checkpointed, 1))
        .expect("checkpoint");
    dir.checkpoints
        .put_segment(0, &checkpoints.finish())
        .expect("write checkpoint segment");

    (checkpointed, third.end)
}

#[test]
fn restart_after_clean_shutdown() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = StoreDir::new(root.path());
    let (checkpointed, end) = write_history(&dir);

    let tail = dir
        .service(TailScanConfig::default())
        .get_tail_metadata()
        .expect("tail");
    assert_eq!(tail.checkpointed_position(), Some(checkpointed));
    assert!(tail.records_after_checkpoint);
    assert_eq!(tail.last_transaction_id, 2);
    assert_eq!(tail.highest_segment_version, 1);
    assert_eq!(tail.last_batch, AppendBatchInfo::new(3, end));
    assert_eq!(tail.newest_entry_format_version, Some(FormatVersion::V4));
    assert!(!tail.corrupted);
    assert!(!tail.checkpoint_chain_unreadable);
}

#[test]
fn torn_append_on_disk_with_relaxed_config() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = StoreDir::new(root.path());
    let (checkpointed, end) = write_history(&dir);

    // Crash while the commit of tx 3 was being written.
    let file = OpenOptions::new()
        .write(true)
        .open(dir.transactions.segment_path(1))
        .expect("open segment 1");
    file.set_len(end.byte_offset - 3).expect("truncate");

    let config = TailScanConfig::from_toml_str(
        r#"
        fail_on_corrupted_log_files = false
        accepted_format_versions = ["V4"]
        "#,
    )
    .expect("config");
    let service = dir.service(config);
    assert!(!service.config().fail_on_corrupted_log_files);
    assert!(!service.config().accepts(FormatVersion::V3));
    let tail = service.get_tail_metadata().expect("tail");
    assert!(tail.corrupted);
    assert_eq!(tail.checkpointed_position(), Some(checkpointed));
    assert_eq!(tail.last_transaction_id, 2);

    let strict = dir.service(TailScanConfig::default()).get_tail_metadata();
    assert!(strict.is_err());
}

#[test]
fn missing_directory_means_logs_are_missing() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = StoreDir::new(&root.path().join("never-created"));

    let tail = dir
        .service(TailScanConfig::default())
        .get_tail_metadata()
        .expect("tail");
    assert!(tail.logs_missing());
    assert!(tail.log_chain_empty);
    assert_eq!(tail.last_batch, AppendBatchInfo::EMPTY);
}
