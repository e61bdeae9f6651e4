use std::fmt;

use serde::{Deserialize, Serialize};

/// A byte position inside the versioned segment chain.
///
/// Ordering is lexicographic on `(segment_version, byte_offset)`, which is the
/// order in which bytes were appended to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    /// Version of the segment that holds the byte.
    pub segment_version: u64,
    /// Offset from the start of the segment, header included.
    pub byte_offset: u64,
}

impl LogPosition {
    /// Sentinel for "no position known".
    pub const UNSPECIFIED: Self = Self {
        segment_version: u64::MAX,
        byte_offset: u64::MAX,
    };

    #[must_use]
    pub const fn new(segment_version: u64, byte_offset: u64) -> Self {
        Self {
            segment_version,
            byte_offset,
        }
    }

    /// Whether this is a real position rather than [`Self::UNSPECIFIED`].
    #[must_use]
    pub const fn is_specified(&self) -> bool {
        !(self.segment_version == u64::MAX && self.byte_offset == u64::MAX)
    }

    /// Same segment, different offset.
    #[must_use]
    pub const fn with_offset(&self, byte_offset: u64) -> Self {
        Self {
            segment_version: self.segment_version,
            byte_offset,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogPosition{{version={}, offset={}}}",
            self.segment_version, self.byte_offset
        )
    }
}
