//! Append-index backfill: where the last complete batch ends.

use tracing::warn;
use txlog_error::Result;
use txlog_segment::{LogEntry, SegmentStore};
use txlog_types::{AppendBatchInfo, FormatVersion, LogPosition};

use crate::chain::ChainReader;

/// Result of scanning forward from a known batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOutcome {
    pub batch: AppendBatchInfo,
    /// Position right after the last readable entry.
    pub scan_end: LogPosition,
    /// Format of the last readable entry.
    pub last_entry_format: Option<FormatVersion>,
    /// The scan stopped on an entry that failed to decode.
    pub partial: bool,
    /// The scan stopped at a segment whose header does not decode.
    pub damaged_header: Option<u64>,
}

/// Scan from `start`, where `append_index` was the last known batch, to the
/// end of the readable chain.
///
/// Starts, chunk starts and rollbacks advance the append index; commits,
/// chunk ends and rollbacks close a batch. A decode failure ends the scan
/// with the last complete pair.
pub fn backfill_append_index(
    store: &dyn SegmentStore,
    start: LogPosition,
    append_index: i64,
) -> Result<BackfillOutcome> {
    let mut chain = ChainReader::open(store, start)?;
    let mut index = append_index;
    let mut closed_at = None;
    let mut last_entry_format = None;
    while let Some(positioned) = chain.next_entry()? {
        last_entry_format = Some(positioned.entry.format_version());
        match &positioned.entry {
            LogEntry::Start(start) => index = start.append_index,
            LogEntry::ChunkStart(chunk) => index = chunk.append_index,
            LogEntry::Rollback(rollback) => {
                index = rollback.append_index;
                closed_at = Some(positioned.position_after);
            }
            LogEntry::Commit(_) | LogEntry::ChunkEnd(_) => {
                closed_at = Some(positioned.position_after);
            }
            _ => {}
        }
    }

    let scan_end = chain.position();
    let partial = chain.last_read_failed();
    if partial {
        warn!(
            %scan_end,
            append_index = index,
            "append index backfill stopped at an unreadable entry"
        );
    }
    Ok(BackfillOutcome {
        batch: AppendBatchInfo::new(index, closed_at.unwrap_or(scan_end)),
        scan_end,
        last_entry_format,
        partial,
        damaged_header: chain.damaged_header(),
    })
}
