use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointInfo;
use crate::format::FormatVersion;
use crate::identity::StoreIdentity;
use crate::position::LogPosition;

/// `last_transaction_id` when nothing was written after the checkpoint.
pub const NO_TRANSACTION_ID: i64 = -1;
/// Append index reported when no append was observed.
pub const UNKNOWN_APPEND_INDEX: i64 = -1;

/// Last append observed in the transaction chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendBatchInfo {
    pub append_index: i64,
    /// Position right after the last complete batch.
    pub position_after: LogPosition,
}

impl AppendBatchInfo {
    /// No segments at all.
    pub const EMPTY: Self = Self {
        append_index: UNKNOWN_APPEND_INDEX,
        position_after: LogPosition::UNSPECIFIED,
    };

    #[must_use]
    pub const fn new(append_index: i64, position_after: LogPosition) -> Self {
        Self {
            append_index,
            position_after,
        }
    }
}

/// Everything startup needs to know about the end of durable history.
///
/// Computed once per process and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTailInformation {
    pub last_checkpoint: Option<CheckpointInfo>,
    pub records_after_checkpoint: bool,
    /// Append index of the first transaction after the checkpoint, or
    /// [`NO_TRANSACTION_ID`].
    pub last_transaction_id: i64,
    /// No transaction segment exists.
    pub log_chain_empty: bool,
    /// Highest transaction segment version, `0` when there are none.
    pub highest_segment_version: u64,
    pub newest_entry_format_version: Option<FormatVersion>,
    pub store_id: Option<StoreIdentity>,
    /// Damage was found and tolerated because strict checking is off.
    pub corrupted: bool,
    /// Data that cannot be decoded follows the last checkpoint entry.
    pub checkpoint_chain_unreadable: bool,
    pub last_batch: AppendBatchInfo,
}

impl LogTailInformation {
    /// Tail of a store that has no segments and no checkpoints.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            last_checkpoint: None,
            records_after_checkpoint: false,
            last_transaction_id: NO_TRANSACTION_ID,
            log_chain_empty: true,
            highest_segment_version: 0,
            newest_entry_format_version: None,
            store_id: None,
            corrupted: false,
            checkpoint_chain_unreadable: false,
            last_batch: AppendBatchInfo::EMPTY,
        }
    }

    /// Neither a checkpoint nor a transaction segment survived.
    #[must_use]
    pub const fn logs_missing(&self) -> bool {
        self.last_checkpoint.is_none() && self.log_chain_empty
    }

    /// Whether replay must run before the store can open.
    #[must_use]
    pub const fn is_recovery_required(&self) -> bool {
        self.records_after_checkpoint || self.logs_missing() || self.corrupted
    }

    /// Position replay starts from, when there is a checkpoint to start at.
    #[must_use]
    pub fn checkpointed_position(&self) -> Option<LogPosition> {
        self.last_checkpoint
            .as_ref()
            .map(|checkpoint| checkpoint.transaction_log_position)
    }
}
