//! On-disk format versions of log entries and segment headers.
//!
//! Every entry starts with a one-byte format version. The byte `0` is never a
//! valid version: it marks the zero padding of a pre-allocated segment.

use std::fmt;

use serde::{Deserialize, Serialize};
use txlog_error::TxLogError;

/// Version byte that marks the end of written data.
pub const END_OF_DATA_VERSION_BYTE: u8 = 0;

/// Format version of a log entry or segment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum FormatVersion {
    /// Big-endian fields, no commit checksum, checkpoints inline.
    V1 = 1,
    /// Adds the commit checksum.
    V2 = 2,
    /// Little-endian fields, dedicated checkpoint chain, additional start header.
    V3 = 3,
    /// Explicit append index, chunked transactions, consensus index in checkpoints.
    V4 = 4,
}

impl FormatVersion {
    /// Every version this build can decode, oldest first.
    pub const ALL: [Self; 4] = [Self::V1, Self::V2, Self::V3, Self::V4];

    /// Version written by this build.
    pub const LATEST: Self = Self::V4;

    /// Decode a version byte. Returns `None` for padding and unknown bytes.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            4 => Some(Self::V4),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Multi-byte fields are little endian from V3 on.
    #[must_use]
    pub const fn is_little_endian(self) -> bool {
        self as u8 >= Self::V3 as u8
    }

    /// Commit entries carry a trailing 4-byte checksum from V2 on.
    #[must_use]
    pub const fn has_commit_checksum(self) -> bool {
        self as u8 >= Self::V2 as u8
    }

    /// Checkpoints live in their own segment chain from V3 on.
    #[must_use]
    pub const fn has_dedicated_checkpoints(self) -> bool {
        self as u8 >= Self::V3 as u8
    }

    /// Start entries carry an explicit append index from V4 on.
    #[must_use]
    pub const fn has_append_index(self) -> bool {
        self as u8 >= Self::V4 as u8
    }

    /// Checkpoint entries record the consensus index from V4 on.
    #[must_use]
    pub const fn checkpoint_carries_consensus_index(self) -> bool {
        self as u8 >= Self::V4 as u8
    }

    /// Start entries carry the variable-length additional header from V3 on.
    #[must_use]
    pub const fn has_additional_header(self) -> bool {
        self as u8 >= Self::V3 as u8
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = TxLogError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_byte(byte)
            .ok_or_else(|| TxLogError::unsupported_format(byte, "unknown format version byte"))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.as_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for version in FormatVersion::ALL {
            assert_eq!(FormatVersion::from_byte(version.as_byte()), Some(version));
        }
        assert_eq!(FormatVersion::from_byte(END_OF_DATA_VERSION_BYTE), None);
        assert_eq!(FormatVersion::from_byte(0xFF), None);
    }

    #[test]
    fn try_from_rejects_unknown_byte() {
        let err = FormatVersion::try_from(9).expect_err("9 is not a version");
        assert!(matches!(
            err,
            TxLogError::UnsupportedFormat { version: 9, .. }
        ));
    }

    #[test]
    fn capability_matrix() {
        use FormatVersion::{V1, V2, V3, V4};
        assert!(!V1.is_little_endian() && !V2.is_little_endian());
        assert!(V3.is_little_endian() && V4.is_little_endian());
        assert!(!V1.has_commit_checksum() && V2.has_commit_checksum());
        assert!(!V2.has_dedicated_checkpoints() && V3.has_dedicated_checkpoints());
        assert!(!V3.has_append_index() && V4.has_append_index());
        assert!(!V3.checkpoint_carries_consensus_index());
        assert!(V4.checkpoint_carries_consensus_index());
    }

    #[test]
    fn ordering_follows_byte() {
        assert!(FormatVersion::V1 < FormatVersion::V4);
        assert_eq!(FormatVersion::LATEST, FormatVersion::V4);
        assert_eq!(FormatVersion::V3.to_string(), "V3");
    }
}
