//! Log output of tail resolution, captured through a fmt subscriber.

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use txlog_recovery::{LogTailService, TailScanConfig};
use txlog_segment::{
    CheckpointEntry, LogEntry, MemorySegmentStore, SegmentHeader, SegmentKind, SegmentWriter,
    TransactionRecord,
};
use txlog_types::{
    FormatVersion, LogPosition, StoreIdentity, TransactionId, UNKNOWN_CONSENSUS_INDEX,
};

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().expect("log buffer");
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.logs
            .lock()
            .expect("log buffer")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with tracing output captured.
fn with_tracing<T>(f: impl FnOnce() -> T) -> (String, T) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (logs.contents(), result)
}

fn store_id() -> StoreIdentity {
    StoreIdentity::new(1_700_000_000, 42, "record-engine", "standard", 5, 0)
}

fn writer(kind: SegmentKind, version: u64) -> SegmentWriter {
    SegmentWriter::new(SegmentHeader::new(
        FormatVersion::V4,
        kind,
        version,
        0,
        store_id(),
    ))
    .expect("segment writer")
}

fn checkpoint(position: LogPosition) -> LogEntry {
    LogEntry::Checkpoint(CheckpointEntry {
        format_version: FormatVersion::V4,
        transaction_log_position: position,
        transaction_id: TransactionId::new(1, 1, FormatVersion::V4, 0, 0, UNKNOWN_CONSENSUS_INDEX),
        append_index: 1,
        time_written: 1,
        store_id: store_id(),
        reason: "scheduled checkpoint".to_owned(),
    })
}

/// One transaction in segment 0 and checkpoint segments 0..=2, with the
/// checkpoint itself in segment 0.
fn logs_with_checkpoint_at(
    position_of: impl FnOnce(LogPosition) -> LogPosition,
) -> LogTailService {
    let transactions = MemorySegmentStore::new();
    let mut w = writer(SegmentKind::Transaction, 0);
    let end = w
        .append_transaction(&TransactionRecord::simple(1))
        .expect("tx 1")
        .end;
    transactions.put_segment(0, w.finish());

    let checkpoints = MemorySegmentStore::new();
    let mut first = writer(SegmentKind::Checkpoint, 0);
    first.append(&checkpoint(position_of(end))).expect("checkpoint");
    checkpoints.put_segment(0, first.finish());
    for version in 1..=2 {
        checkpoints.put_segment(version, writer(SegmentKind::Checkpoint, version).finish());
    }

    LogTailService::new(
        Arc::new(transactions),
        Arc::new(checkpoints),
        TailScanConfig::default().with_fail_on_corrupted_log_files(false),
    )
}

#[test]
fn every_scanned_checkpoint_segment_is_reported() {
    let service = logs_with_checkpoint_at(|end| end);
    let (logs, tail) = with_tracing(|| service.get_tail_metadata());
    tail.expect("tail");

    for version in 0..=2 {
        let message =
            format!("Scanning checkpoint segment with version {version} for checkpoint entries");
        assert!(logs.contains(&message), "missing {message:?} in:\n{logs}");
    }
    assert!(logs.contains("INFO"), "logs:\n{logs}");
}

#[test]
fn rejected_checkpoint_is_warned_about() {
    let service = logs_with_checkpoint_at(|end| end.with_offset(end.byte_offset + 4096));
    let (logs, tail) = with_tracing(|| service.get_tail_metadata());
    let tail = tail.expect("tail");

    assert!(tail.corrupted);
    assert!(tail.last_checkpoint.is_none());
    assert!(
        logs.contains("latest checkpoint does not point to a valid location"),
        "logs:\n{logs}"
    );
    assert!(logs.contains("WARN"), "logs:\n{logs}");
}

#[test]
fn fatal_errors_are_logged_before_returning() {
    let transactions = MemorySegmentStore::new();
    let mut w = writer(SegmentKind::Transaction, 0);
    w.append_transaction(&TransactionRecord::simple(1))
        .expect("tx 1");
    transactions.put_segment(0, w.finish());
    transactions
        .append_bytes(0, b"junk")
        .expect("append junk");
    let service = LogTailService::new(
        Arc::new(transactions),
        Arc::new(MemorySegmentStore::new()),
        TailScanConfig::default(),
    );

    let (logs, tail) = with_tracing(|| service.get_tail_metadata());
    assert!(tail.is_err());
    assert!(logs.contains("ERROR"), "logs:\n{logs}");
    assert!(logs.contains("data after the last readable entry"), "logs:\n{logs}");
}

#[test]
fn state_transitions_are_traced_at_debug() {
    let service = logs_with_checkpoint_at(|end| end);
    let (logs, tail) = with_tracing(|| service.get_tail_metadata());
    tail.expect("tail");

    assert!(logs.contains("tail resolution step"), "logs:\n{logs}");
    assert!(logs.contains("ValidCheckpoint"), "logs:\n{logs}");
    assert!(logs.contains("log tail resolved"), "logs:\n{logs}");
}
