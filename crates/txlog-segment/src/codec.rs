//! Entry encoding and decoding.
//!
//! Multi-byte fields are big endian for V1/V2 and little endian from V3 on.
//! Decoding distinguishes an entry that is cut short (more bytes may follow)
//! from one whose bytes are present but meaningless.

use txlog_error::{Result, TxLogError};
use txlog_types::format::END_OF_DATA_VERSION_BYTE;
use txlog_types::{FormatVersion, LogPosition, TransactionId, UNKNOWN_CONSENSUS_INDEX};

use crate::bytes::{FieldError, FieldReader, FieldResult, FieldWriter};
use crate::entry::{
    CheckpointEntry, ChunkEndEntry, ChunkStartEntry, CommandEntry, CommitEntry, EntryType,
    LegacyCheckpointEntry, LogEntry, RollbackEntry, StartEntry,
};

/// Size of a commit entry with a checksum (V2 and later).
pub const COMMIT_ENTRY_SIZE_WITH_CHECKSUM: usize = 22;
/// Size of a commit entry without a checksum (V1).
pub const COMMIT_ENTRY_SIZE_WITHOUT_CHECKSUM: usize = 18;

/// Result of decoding the bytes at one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete entry occupying `length` bytes.
    Entry { entry: LogEntry, length: usize },
    /// Zero version byte: pre-allocated padding, nothing more was written.
    EndOfData,
    /// The bytes end inside the entry.
    Incomplete,
    /// The bytes cannot be an entry of any known format.
    Invalid { reason: String },
}

/// Decode the entry at the start of `bytes`.
#[must_use]
pub fn decode_entry(bytes: &[u8]) -> Decoded {
    let Some(&version_byte) = bytes.first() else {
        return Decoded::Incomplete;
    };
    if version_byte == END_OF_DATA_VERSION_BYTE {
        return Decoded::EndOfData;
    }
    let Some(version) = FormatVersion::from_byte(version_byte) else {
        return Decoded::Invalid {
            reason: format!("unknown format version byte {version_byte}"),
        };
    };
    let Some(&type_byte) = bytes.get(1) else {
        return Decoded::Incomplete;
    };
    let Some(entry_type) = EntryType::from_byte(type_byte) else {
        return Decoded::Invalid {
            reason: format!("unknown entry type {type_byte} for format {version}"),
        };
    };
    if !entry_type.allowed_in(version) {
        return Decoded::Invalid {
            reason: format!("entry type {entry_type:?} is not valid in format {version}"),
        };
    }

    let mut reader = FieldReader::new(&bytes[2..], version.is_little_endian());
    match decode_body(entry_type, version, &mut reader) {
        Ok(entry) => Decoded::Entry {
            entry,
            length: 2 + reader.position(),
        },
        Err(FieldError::Short) => Decoded::Incomplete,
        Err(FieldError::Malformed(reason)) => Decoded::Invalid { reason },
    }
}

fn decode_body(
    entry_type: EntryType,
    version: FormatVersion,
    r: &mut FieldReader<'_>,
) -> FieldResult<LogEntry> {
    let entry = match entry_type {
        EntryType::Start => {
            let time_written = r.i64()?;
            let append_index = if version.has_append_index() {
                r.i64()?
            } else {
                r.i64()?.saturating_add(1)
            };
            let previous_checksum = if version.has_commit_checksum() {
                r.i32()?
            } else {
                0
            };
            let additional_header = if version.has_additional_header() {
                let len = usize::from(r.u16()?);
                r.bytes(len)?.to_vec()
            } else {
                Vec::new()
            };
            LogEntry::Start(StartEntry {
                format_version: version,
                time_written,
                append_index,
                previous_checksum,
                additional_header,
            })
        }
        EntryType::Command => {
            let len = r.u32()? as usize;
            LogEntry::Command(CommandEntry {
                format_version: version,
                payload: r.bytes(len)?.to_vec(),
            })
        }
        EntryType::LegacyCheckpoint => {
            let segment_version = r.u64()?;
            let byte_offset = r.u64()?;
            LogEntry::LegacyCheckpoint(LegacyCheckpointEntry {
                format_version: version,
                transaction_log_position: LogPosition::new(segment_version, byte_offset),
            })
        }
        EntryType::Checkpoint => {
            let segment_version = r.u64()?;
            let byte_offset = r.u64()?;
            let tx_id = r.i64()?;
            let append_index = if version.has_append_index() {
                r.i64()?
            } else {
                tx_id
            };
            let tx_format = r.u8()?;
            let checksum = r.i32()?;
            let commit_timestamp = r.i64()?;
            let consensus_index = if version.checkpoint_carries_consensus_index() {
                r.i64()?
            } else {
                UNKNOWN_CONSENSUS_INDEX
            };
            let time_written = r.i64()?;
            let store_id = r.store_identity()?;
            let reason = r.string()?;
            LogEntry::Checkpoint(CheckpointEntry {
                format_version: version,
                transaction_log_position: LogPosition::new(segment_version, byte_offset),
                transaction_id: TransactionId {
                    id: tx_id,
                    append_index,
                    format_version: tx_format,
                    checksum,
                    commit_timestamp,
                    consensus_index,
                },
                append_index,
                time_written,
                store_id,
                reason,
            })
        }
        EntryType::Commit => {
            let tx_id = r.i64()?;
            let commit_timestamp = r.i64()?;
            let checksum = if version.has_commit_checksum() {
                r.i32()?
            } else {
                0
            };
            LogEntry::Commit(CommitEntry {
                format_version: version,
                tx_id,
                commit_timestamp,
                checksum,
            })
        }
        EntryType::ChunkStart => LogEntry::ChunkStart(ChunkStartEntry {
            format_version: version,
            time_written: r.i64()?,
            chunk_id: r.i64()?,
            append_index: r.i64()?,
        }),
        EntryType::ChunkEnd => LogEntry::ChunkEnd(ChunkEndEntry {
            format_version: version,
            tx_id: r.i64()?,
            chunk_id: r.i64()?,
            checksum: r.i32()?,
        }),
        EntryType::Rollback => LogEntry::Rollback(RollbackEntry {
            format_version: version,
            tx_id: r.i64()?,
            append_index: r.i64()?,
            timestamp: r.i64()?,
            checksum: r.i32()?,
        }),
    };
    Ok(entry)
}

/// Append the encoding of `entry` to `out`.
pub fn encode_entry(entry: &LogEntry, out: &mut Vec<u8>) -> Result<()> {
    let version = entry.format_version();
    let entry_type = entry.entry_type();
    if !entry_type.allowed_in(version) {
        return Err(TxLogError::unsupported_format(
            version.as_byte(),
            format!("{entry_type:?} entries cannot be written in this format"),
        ));
    }

    let mut w = FieldWriter::new(out, version.is_little_endian());
    w.u8(version.as_byte());
    w.u8(entry_type.as_byte());
    match entry {
        LogEntry::Start(e) => {
            w.i64(e.time_written);
            if version.has_append_index() {
                w.i64(e.append_index);
            } else {
                w.i64(e.append_index.saturating_sub(1));
            }
            if version.has_commit_checksum() {
                w.i32(e.previous_checksum);
            }
            if version.has_additional_header() {
                let len = u16::try_from(e.additional_header.len()).map_err(|_| {
                    TxLogError::internal("start entry additional header exceeds 64 KiB")
                })?;
                w.u16(len);
                w.bytes(&e.additional_header);
            }
        }
        LogEntry::Command(e) => {
            let len = u32::try_from(e.payload.len())
                .map_err(|_| TxLogError::internal("command payload exceeds 4 GiB"))?;
            w.u32(len);
            w.bytes(&e.payload);
        }
        LogEntry::LegacyCheckpoint(e) => {
            w.u64(e.transaction_log_position.segment_version);
            w.u64(e.transaction_log_position.byte_offset);
        }
        LogEntry::Checkpoint(e) => {
            w.u64(e.transaction_log_position.segment_version);
            w.u64(e.transaction_log_position.byte_offset);
            w.i64(e.transaction_id.id);
            if version.has_append_index() {
                w.i64(e.append_index);
            }
            w.u8(e.transaction_id.format_version);
            w.i32(e.transaction_id.checksum);
            w.i64(e.transaction_id.commit_timestamp);
            if version.checkpoint_carries_consensus_index() {
                w.i64(e.transaction_id.consensus_index);
            }
            w.i64(e.time_written);
            if !w.store_identity(&e.store_id) || !w.string(&e.reason) {
                return Err(TxLogError::internal(
                    "checkpoint string field exceeds 64 KiB",
                ));
            }
        }
        LogEntry::Commit(e) => {
            w.i64(e.tx_id);
            w.i64(e.commit_timestamp);
            if version.has_commit_checksum() {
                w.i32(e.checksum);
            }
        }
        LogEntry::ChunkStart(e) => {
            w.i64(e.time_written);
            w.i64(e.chunk_id);
            w.i64(e.append_index);
        }
        LogEntry::ChunkEnd(e) => {
            w.i64(e.tx_id);
            w.i64(e.chunk_id);
            w.i32(e.checksum);
        }
        LogEntry::Rollback(e) => {
            w.i64(e.tx_id);
            w.i64(e.append_index);
            w.i64(e.timestamp);
            w.i32(e.checksum);
        }
    }
    Ok(())
}
