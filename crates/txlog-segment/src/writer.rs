//! Builds segment images in any supported format.
//!
//! Used by tools that lay down fixtures and by tests; the writer keeps the
//! whole image in memory and hands it to a store with `put_segment`.

use tracing::debug;
use txlog_error::{Result, TxLogError};
use txlog_types::transaction::BASE_TX_CHECKSUM;
use txlog_types::{FormatVersion, LogPosition};

use crate::codec::encode_entry;
use crate::entry::{CommandEntry, CommitEntry, LogEntry, StartEntry, encode_consensus_index};
use crate::header::SegmentHeader;

/// Chain a transaction checksum over its command payloads.
#[must_use]
pub fn transaction_checksum(previous_checksum: i32, commands: &[Vec<u8>]) -> i32 {
    let mut crc = crc32c::crc32c(&previous_checksum.to_le_bytes());
    for payload in commands {
        crc = crc32c::crc32c_append(crc, payload);
    }
    crc as i32
}

/// A whole transaction to append: start, commands and commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub tx_id: i64,
    pub append_index: i64,
    pub time_written: i64,
    pub commands: Vec<Vec<u8>>,
    pub consensus_index: Option<i64>,
}

impl TransactionRecord {
    /// Transaction whose id and append index coincide, with one command.
    #[must_use]
    pub fn simple(tx_id: i64) -> Self {
        Self {
            tx_id,
            append_index: tx_id,
            time_written: 1_700_000_000_000 + tx_id,
            commands: vec![tx_id.to_le_bytes().to_vec()],
            consensus_index: None,
        }
    }

    #[must_use]
    pub fn with_consensus_index(mut self, consensus_index: i64) -> Self {
        self.consensus_index = Some(consensus_index);
        self
    }
}

/// Where the entries of an appended transaction landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenTransaction {
    pub start: LogPosition,
    pub commit: LogPosition,
    /// Position right after the commit entry.
    pub end: LogPosition,
    pub checksum: i32,
}

/// Accumulates one segment: header, entries and optional padding.
#[derive(Debug, Clone)]
pub struct SegmentWriter {
    header: SegmentHeader,
    bytes: Vec<u8>,
    previous_checksum: i32,
}

impl SegmentWriter {
    pub fn new(header: SegmentHeader) -> Result<Self> {
        let bytes = header.encode()?;
        Ok(Self {
            header,
            bytes,
            previous_checksum: BASE_TX_CHECKSUM,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &SegmentHeader {
        &self.header
    }

    #[must_use]
    pub const fn format_version(&self) -> FormatVersion {
        self.header.format_version
    }

    /// Position the next entry will be written at.
    #[must_use]
    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.header.segment_version, self.bytes.len() as u64)
    }

    /// Checksum the next transaction chains from.
    #[must_use]
    pub const fn previous_checksum(&self) -> i32 {
        self.previous_checksum
    }

    /// Continue the checksum chain of an earlier segment.
    #[must_use]
    pub fn with_previous_checksum(mut self, previous_checksum: i32) -> Self {
        self.previous_checksum = previous_checksum;
        self
    }

    /// Append one entry, returning the position it starts at.
    pub fn append(&mut self, entry: &LogEntry) -> Result<LogPosition> {
        let position = self.position();
        encode_entry(entry, &mut self.bytes)?;
        Ok(position)
    }

    /// Append start, command and commit entries in the segment's format.
    pub fn append_transaction(&mut self, tx: &TransactionRecord) -> Result<WrittenTransaction> {
        let version = self.format_version();
        let additional_header = match tx.consensus_index {
            Some(index) if version.has_additional_header() => encode_consensus_index(index),
            Some(_) => {
                return Err(TxLogError::unsupported_format(
                    version.as_byte(),
                    "start entries cannot carry a consensus index",
                ));
            }
            None => Vec::new(),
        };
        let checksum = transaction_checksum(self.previous_checksum, &tx.commands);

        let start = self.append(&LogEntry::Start(StartEntry {
            format_version: version,
            time_written: tx.time_written,
            append_index: tx.append_index,
            previous_checksum: self.previous_checksum,
            additional_header,
        }))?;
        for payload in &tx.commands {
            self.append(&LogEntry::Command(CommandEntry {
                format_version: version,
                payload: payload.clone(),
            }))?;
        }
        let commit = self.append(&LogEntry::Commit(CommitEntry {
            format_version: version,
            tx_id: tx.tx_id,
            commit_timestamp: tx.time_written,
            checksum: if version.has_commit_checksum() {
                checksum
            } else {
                0
            },
        }))?;
        self.previous_checksum = checksum;

        debug!(
            segment_version = self.header.segment_version,
            tx_id = tx.tx_id,
            append_index = tx.append_index,
            "transaction appended"
        );
        Ok(WrittenTransaction {
            start,
            commit,
            end: self.position(),
            checksum,
        })
    }

    /// Append bytes verbatim, e.g. to simulate damage.
    pub fn append_raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Zero-pad the segment up to `total_len` bytes.
    pub fn preallocate(&mut self, total_len: u64) {
        let total_len = total_len as usize;
        if self.bytes.len() < total_len {
            self.bytes.resize(total_len, 0);
        }
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
