//! Reconstructing the transaction behind an oldest-format checkpoint.
//!
//! V1/V2 checkpoints record only a position in the transaction chain. The
//! transaction that ends there is found by decoding the segment forward; if
//! that fails the commit entry is read directly in front of the position.

use tracing::{debug, warn};
use txlog_error::{Result, TxLogError};
use txlog_segment::{
    COMMIT_ENTRY_SIZE_WITH_CHECKSUM, COMMIT_ENTRY_SIZE_WITHOUT_CHECKSUM, EntryType, LogEntry,
    LogEntryReader, SEGMENT_HEADER_SIZE, SegmentStore,
};
use txlog_types::transaction::{BASE_TX_CHECKSUM, BASE_TX_COMMIT_TIMESTAMP};
use txlog_types::{FormatVersion, LogPosition, TransactionId, UNKNOWN_CONSENSUS_INDEX};

/// Transaction that ends exactly at `position`.
pub fn resolve_legacy_transaction(
    store: &dyn SegmentStore,
    position: LogPosition,
) -> Result<TransactionId> {
    let version = position.segment_version;
    let header = match store.extract_header(version) {
        Ok(Some(header)) => header,
        Ok(None) => {
            debug!(%position, "legacy checkpoint target segment is gone");
            return Ok(TransactionId::UNKNOWN);
        }
        Err(err) if err.is_corruption() => {
            warn!(%position, %err, "legacy checkpoint target segment has an unreadable header");
            return Ok(TransactionId::UNKNOWN);
        }
        Err(err) => return Err(err),
    };
    let Some(size) = store.segment_size(version)? else {
        return Ok(TransactionId::UNKNOWN);
    };
    if position.byte_offset > size {
        return Ok(TransactionId::UNKNOWN);
    }

    let start = header.start_position();
    if position.byte_offset <= start.byte_offset {
        // Nothing was committed in this segment yet.
        return Ok(TransactionId {
            id: header.last_committed_tx_id,
            append_index: header.last_committed_tx_id,
            format_version: header.format_version.as_byte(),
            checksum: BASE_TX_CHECKSUM,
            commit_timestamp: BASE_TX_COMMIT_TIMESTAMP,
            consensus_index: UNKNOWN_CONSENSUS_INDEX,
        });
    }

    if let Some(tx) = find_commit_ending_at(store, start, position)? {
        return Ok(tx);
    }
    debug!(%position, "no decodable commit ends at legacy checkpoint, reading raw entry");
    read_raw_commit(store, position)?.ok_or(TxLogError::UnresolvableLegacyTransaction {
        version,
        offset: position.byte_offset,
    })
}

fn find_commit_ending_at(
    store: &dyn SegmentStore,
    start: LogPosition,
    target: LogPosition,
) -> Result<Option<TransactionId>> {
    let mut reader = LogEntryReader::open(store, start)?;
    let mut start_format: Option<FormatVersion> = None;
    while let Some(entry) = reader.next_entry()? {
        let after = reader.position();
        match entry {
            LogEntry::Start(start) => start_format = Some(start.format_version),
            LogEntry::Commit(commit) if after == target => {
                let format = start_format.unwrap_or(commit.format_version);
                return Ok(Some(TransactionId {
                    id: commit.tx_id,
                    append_index: commit.tx_id,
                    format_version: format.as_byte(),
                    checksum: commit.checksum,
                    commit_timestamp: commit.commit_timestamp,
                    consensus_index: UNKNOWN_CONSENSUS_INDEX,
                }));
            }
            _ => {}
        }
        if after >= target {
            break;
        }
    }
    Ok(None)
}

/// Try the commit layouts with and without checksum directly in front of
/// `position`.
fn read_raw_commit(
    store: &dyn SegmentStore,
    position: LogPosition,
) -> Result<Option<TransactionId>> {
    let mut channel = store.open_for_version(position.segment_version)?;
    let mut buf = [0_u8; COMMIT_ENTRY_SIZE_WITH_CHECKSUM];
    for (len, with_checksum) in [
        (COMMIT_ENTRY_SIZE_WITH_CHECKSUM, true),
        (COMMIT_ENTRY_SIZE_WITHOUT_CHECKSUM, false),
    ] {
        let Some(from) = position.byte_offset.checked_sub(len as u64) else {
            continue;
        };
        if from < SEGMENT_HEADER_SIZE {
            continue;
        }
        let n = channel.read_at(from, &mut buf[..len])?;
        if n < len {
            continue;
        }
        if let Some(tx) = decode_raw_commit(&buf[..len], with_checksum) {
            return Ok(Some(tx));
        }
    }
    Ok(None)
}

/// Decode a raw commit entry. Fields are read little endian and reversed when
/// the version byte predates little-endian logs.
fn decode_raw_commit(bytes: &[u8], with_checksum: bool) -> Option<TransactionId> {
    let version = FormatVersion::from_byte(*bytes.first()?)?;
    if *bytes.get(1)? != EntryType::Commit.as_byte()
        || version.has_commit_checksum() != with_checksum
    {
        return None;
    }
    let reverse = !version.is_little_endian();
    let tx_id = reorder_i64(bytes.get(2..10)?.try_into().ok()?, reverse);
    let commit_timestamp = reorder_i64(bytes.get(10..18)?.try_into().ok()?, reverse);
    let checksum = if with_checksum {
        reorder_i32(bytes.get(18..22)?.try_into().ok()?, reverse)
    } else {
        0
    };
    Some(TransactionId {
        id: tx_id,
        append_index: tx_id,
        format_version: version.as_byte(),
        checksum,
        commit_timestamp,
        consensus_index: UNKNOWN_CONSENSUS_INDEX,
    })
}

const fn reorder_i64(raw: [u8; 8], reverse: bool) -> i64 {
    let value = i64::from_le_bytes(raw);
    if reverse { value.swap_bytes() } else { value }
}

const fn reorder_i32(raw: [u8; 4], reverse: bool) -> i32 {
    let value = i32::from_le_bytes(raw);
    if reverse { value.swap_bytes() } else { value }
}
