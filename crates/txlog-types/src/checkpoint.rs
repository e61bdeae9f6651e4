use serde::{Deserialize, Serialize};

use crate::format::FormatVersion;
use crate::identity::StoreIdentity;
use crate::position::LogPosition;
use crate::transaction::TransactionId;

/// A decoded checkpoint together with where it was found.
///
/// `transaction_log_position` always refers to the transaction chain, even
/// when the checkpoint itself was read from the dedicated checkpoint chain.
/// Values are never mutated; corrections produce a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    /// Position in the transaction chain up to which the store is durable.
    pub transaction_log_position: LogPosition,
    /// Where the checkpoint entry itself starts.
    pub checkpoint_entry_position: LogPosition,
    /// Position right after the checkpoint entry.
    pub channel_position_after_checkpoint: LogPosition,
    /// Position where reading of the enclosing segment stopped.
    pub checkpoint_file_post_read_position: LogPosition,
    /// Format version of the checkpoint entry.
    pub format_version: FormatVersion,
    /// Raw version byte the checkpoint entry was written with.
    pub format_version_byte: u8,
    pub transaction_id: TransactionId,
    pub append_index: i64,
    pub reason: String,
    pub store_id: StoreIdentity,
}

impl CheckpointInfo {
    /// Copy whose transaction carries `consensus_index`.
    #[must_use]
    pub fn with_consensus_index(&self, consensus_index: i64) -> Self {
        Self {
            transaction_id: self.transaction_id.with_consensus_index(consensus_index),
            ..self.clone()
        }
    }

    /// Whether unreadable data follows this checkpoint in its own segment.
    ///
    /// Always `false` for inline checkpoints, whose segment continues with
    /// transaction entries.
    #[must_use]
    pub fn has_unreadable_tail(&self) -> bool {
        self.format_version.has_dedicated_checkpoints()
            && self.channel_position_after_checkpoint != self.checkpoint_file_post_read_position
    }
}
