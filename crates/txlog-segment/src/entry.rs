//! Typed log entries.
//!
//! Every entry is framed as `[format version u8][entry type u8][body]`. The
//! body layout depends on the format version; see [`crate::codec`].

use serde::Serialize;
use txlog_types::{FormatVersion, LogPosition, StoreIdentity, TransactionId};

/// Wire tag of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryType {
    Start,
    Command,
    LegacyCheckpoint,
    Checkpoint,
    Commit,
    ChunkStart,
    ChunkEnd,
    Rollback,
}

impl EntryType {
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Start => 1,
            Self::Command => 2,
            Self::LegacyCheckpoint => 3,
            Self::Checkpoint => 4,
            Self::Commit => 5,
            Self::ChunkStart => 6,
            Self::ChunkEnd => 7,
            Self::Rollback => 8,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Start),
            2 => Some(Self::Command),
            3 => Some(Self::LegacyCheckpoint),
            4 => Some(Self::Checkpoint),
            5 => Some(Self::Commit),
            6 => Some(Self::ChunkStart),
            7 => Some(Self::ChunkEnd),
            8 => Some(Self::Rollback),
            _ => None,
        }
    }

    /// Whether `version` can carry this entry type.
    #[must_use]
    pub const fn allowed_in(self, version: FormatVersion) -> bool {
        match self {
            Self::Start | Self::Command | Self::Commit => true,
            Self::LegacyCheckpoint => !version.has_dedicated_checkpoints(),
            Self::Checkpoint => version.has_dedicated_checkpoints(),
            Self::ChunkStart | Self::ChunkEnd | Self::Rollback => version.has_append_index(),
        }
    }
}

/// Marker byte of a consensus index inside a start entry's additional header.
const CONSENSUS_INDEX_MARKER: u8 = 0x01;

/// Encode a consensus index as a start entry additional header.
#[must_use]
pub fn encode_consensus_index(consensus_index: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.push(CONSENSUS_INDEX_MARKER);
    out.extend_from_slice(&consensus_index.to_le_bytes());
    out
}

/// Decode a consensus index from a start entry additional header.
#[must_use]
pub fn decode_consensus_index(additional_header: &[u8]) -> Option<i64> {
    match additional_header {
        [CONSENSUS_INDEX_MARKER, rest @ ..] if rest.len() >= 8 => {
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(&rest[..8]);
            Some(i64::from_le_bytes(raw))
        }
        _ => None,
    }
}

/// Opens a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartEntry {
    pub format_version: FormatVersion,
    pub time_written: i64,
    /// Stored explicitly from V4 on; older formats store the last committed
    /// transaction id and the append index is that id plus one.
    pub append_index: i64,
    pub previous_checksum: i32,
    pub additional_header: Vec<u8>,
}

impl StartEntry {
    #[must_use]
    pub fn consensus_index(&self) -> Option<i64> {
        decode_consensus_index(&self.additional_header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEntry {
    pub format_version: FormatVersion,
    pub payload: Vec<u8>,
}

/// Inline checkpoint of the V1/V2 transaction segments. Carries only the
/// transaction log position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyCheckpointEntry {
    pub format_version: FormatVersion,
    pub transaction_log_position: LogPosition,
}

/// Checkpoint of the dedicated checkpoint chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointEntry {
    pub format_version: FormatVersion,
    pub transaction_log_position: LogPosition,
    pub transaction_id: TransactionId,
    pub append_index: i64,
    pub time_written: i64,
    pub store_id: StoreIdentity,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitEntry {
    pub format_version: FormatVersion,
    pub tx_id: i64,
    pub commit_timestamp: i64,
    /// Zero for V1, which does not store it.
    pub checksum: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkStartEntry {
    pub format_version: FormatVersion,
    pub time_written: i64,
    pub chunk_id: i64,
    pub append_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkEndEntry {
    pub format_version: FormatVersion,
    pub tx_id: i64,
    pub chunk_id: i64,
    pub checksum: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackEntry {
    pub format_version: FormatVersion,
    pub tx_id: i64,
    pub append_index: i64,
    pub timestamp: i64,
    pub checksum: i32,
}

/// One decoded log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LogEntry {
    Start(StartEntry),
    Command(CommandEntry),
    LegacyCheckpoint(LegacyCheckpointEntry),
    Checkpoint(CheckpointEntry),
    Commit(CommitEntry),
    ChunkStart(ChunkStartEntry),
    ChunkEnd(ChunkEndEntry),
    Rollback(RollbackEntry),
}

impl LogEntry {
    #[must_use]
    pub const fn entry_type(&self) -> EntryType {
        match self {
            Self::Start(_) => EntryType::Start,
            Self::Command(_) => EntryType::Command,
            Self::LegacyCheckpoint(_) => EntryType::LegacyCheckpoint,
            Self::Checkpoint(_) => EntryType::Checkpoint,
            Self::Commit(_) => EntryType::Commit,
            Self::ChunkStart(_) => EntryType::ChunkStart,
            Self::ChunkEnd(_) => EntryType::ChunkEnd,
            Self::Rollback(_) => EntryType::Rollback,
        }
    }

    #[must_use]
    pub const fn format_version(&self) -> FormatVersion {
        match self {
            Self::Start(e) => e.format_version,
            Self::Command(e) => e.format_version,
            Self::LegacyCheckpoint(e) => e.format_version,
            Self::Checkpoint(e) => e.format_version,
            Self::Commit(e) => e.format_version,
            Self::ChunkStart(e) => e.format_version,
            Self::ChunkEnd(e) => e.format_version,
            Self::Rollback(e) => e.format_version,
        }
    }

    /// Checkpoint entries of either layout.
    #[must_use]
    pub const fn is_checkpoint(&self) -> bool {
        matches!(self, Self::LegacyCheckpoint(_) | Self::Checkpoint(_))
    }

    /// Entries that close a transaction or a chunk of one.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Commit(_) | Self::ChunkEnd(_))
    }
}
