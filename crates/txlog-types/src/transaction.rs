use serde::{Deserialize, Serialize};

use crate::format::FormatVersion;

/// Consensus index recorded when none is known.
pub const UNKNOWN_CONSENSUS_INDEX: i64 = -1;
/// Id of the implicit transaction that created an empty store.
pub const BASE_TX_ID: i64 = 1;
/// Checksum chained into the first transaction of a store.
pub const BASE_TX_CHECKSUM: i32 = 0x1F2E_3D4C;
/// Commit timestamp of the implicit base transaction.
pub const BASE_TX_COMMIT_TIMESTAMP: i64 = 0;

/// Identity and commit metadata of one committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub id: i64,
    pub append_index: i64,
    /// Raw format version byte of the transaction's entries.
    pub format_version: u8,
    pub checksum: i32,
    pub commit_timestamp: i64,
    pub consensus_index: i64,
}

impl TransactionId {
    /// Placeholder used when the checkpointed transaction cannot be located,
    /// e.g. because its segment was pruned.
    pub const UNKNOWN: Self = Self {
        id: BASE_TX_ID,
        append_index: BASE_TX_ID,
        format_version: 0,
        checksum: BASE_TX_CHECKSUM,
        commit_timestamp: BASE_TX_COMMIT_TIMESTAMP,
        consensus_index: UNKNOWN_CONSENSUS_INDEX,
    };

    #[must_use]
    pub const fn new(
        id: i64,
        append_index: i64,
        format_version: FormatVersion,
        checksum: i32,
        commit_timestamp: i64,
        consensus_index: i64,
    ) -> Self {
        Self {
            id,
            append_index,
            format_version: format_version.as_byte(),
            checksum,
            commit_timestamp,
            consensus_index,
        }
    }

    /// Copy with a different consensus index.
    #[must_use]
    pub const fn with_consensus_index(self, consensus_index: i64) -> Self {
        Self {
            consensus_index,
            ..self
        }
    }

    /// Decoded format version, `None` when the byte is unknown.
    #[must_use]
    pub const fn format(&self) -> Option<FormatVersion> {
        FormatVersion::from_byte(self.format_version)
    }

    #[must_use]
    pub const fn has_consensus_index(&self) -> bool {
        self.consensus_index != UNKNOWN_CONSENSUS_INDEX
    }
}
