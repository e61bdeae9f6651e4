//! Fixed-size segment header.
//!
//! Layout (always little endian, zero padded to [`SEGMENT_HEADER_SIZE`]):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 8 | magic `TXLGSEG\0` |
//! | 8 | 1 | format version |
//! | 9 | 1 | segment kind |
//! | 10 | 8 | segment version |
//! | 18 | 8 | last committed transaction id before this segment |
//! | 26 | .. | store identity |

use serde::Serialize;
use txlog_error::{Result, TxLogError};
use txlog_types::{FormatVersion, LogPosition, StoreIdentity};

use crate::bytes::{FieldError, FieldReader, FieldWriter};

/// Size of every segment header in bytes.
pub const SEGMENT_HEADER_SIZE: u64 = 128;
/// Magic bytes at the start of every segment.
pub const SEGMENT_MAGIC: [u8; 8] = *b"TXLGSEG\0";

/// Which chain a segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentKind {
    Transaction,
    Checkpoint,
}

impl SegmentKind {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Transaction => 1,
            Self::Checkpoint => 2,
        }
    }

    const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Transaction),
            2 => Some(Self::Checkpoint),
            _ => None,
        }
    }
}

/// Decoded segment header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentHeader {
    pub format_version: FormatVersion,
    pub kind: SegmentKind,
    pub segment_version: u64,
    pub last_committed_tx_id: i64,
    pub store_id: StoreIdentity,
}

impl SegmentHeader {
    #[must_use]
    pub fn new(
        format_version: FormatVersion,
        kind: SegmentKind,
        segment_version: u64,
        last_committed_tx_id: i64,
        store_id: StoreIdentity,
    ) -> Self {
        Self {
            format_version,
            kind,
            segment_version,
            last_committed_tx_id,
            store_id,
        }
    }

    /// Position of the first entry.
    #[must_use]
    pub const fn start_position(&self) -> LogPosition {
        LogPosition::new(self.segment_version, SEGMENT_HEADER_SIZE)
    }

    /// Encode into exactly [`SEGMENT_HEADER_SIZE`] bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(SEGMENT_HEADER_SIZE as usize);
        let mut writer = FieldWriter::new(&mut out, true);
        writer.bytes(&SEGMENT_MAGIC);
        writer.u8(self.format_version.as_byte());
        writer.u8(self.kind.as_byte());
        writer.u64(self.segment_version);
        writer.i64(self.last_committed_tx_id);
        if !writer.store_identity(&self.store_id) || out.len() > SEGMENT_HEADER_SIZE as usize {
            return Err(TxLogError::malformed_header(
                self.segment_version,
                "store identity does not fit the segment header",
            ));
        }
        out.resize(SEGMENT_HEADER_SIZE as usize, 0);
        Ok(out)
    }

    /// Decode the header of the segment expected to carry `version`.
    pub fn decode(version: u64, bytes: &[u8]) -> Result<Self> {
        let malformed = |err: FieldError| match err {
            FieldError::Short => TxLogError::malformed_header(version, "header is truncated"),
            FieldError::Malformed(detail) => TxLogError::malformed_header(version, detail),
        };

        let mut reader = FieldReader::new(bytes, true);
        let magic = reader.bytes(SEGMENT_MAGIC.len()).map_err(malformed)?;
        if magic != SEGMENT_MAGIC {
            return Err(TxLogError::malformed_header(version, "bad magic"));
        }
        let format_byte = reader.u8().map_err(malformed)?;
        let format_version = FormatVersion::from_byte(format_byte).ok_or_else(|| {
            TxLogError::unsupported_format(format_byte, format!("header of segment {version}"))
        })?;
        let kind_byte = reader.u8().map_err(malformed)?;
        let kind = SegmentKind::from_byte(kind_byte).ok_or_else(|| {
            TxLogError::malformed_header(version, format!("unknown segment kind {kind_byte}"))
        })?;
        let segment_version = reader.u64().map_err(malformed)?;
        if segment_version != version {
            return Err(TxLogError::InconsistentPosition {
                expected_version: version,
                actual: format!("segment header names version {segment_version}"),
            });
        }
        let last_committed_tx_id = reader.i64().map_err(malformed)?;
        let store_id = reader.store_identity().map_err(malformed)?;

        Ok(Self {
            format_version,
            kind,
            segment_version,
            last_committed_tx_id,
            store_id,
        })
    }
}
