//! Turning decoded checkpoint entries into [`CheckpointInfo`] values.

use tracing::{debug, warn};
use txlog_error::Result;
use txlog_segment::{
    CheckpointEntry, LegacyCheckpointEntry, LogEntry, LogEntryReader, SegmentStore,
};
use txlog_types::{CheckpointInfo, LogPosition, StoreIdentity};

use crate::legacy::resolve_legacy_transaction;

/// Reason recorded for checkpoints of the inline layout, which stores none.
pub const LEGACY_CHECKPOINT_REASON: &str = "legacy checkpoint";

/// Where a checkpoint entry was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLocation {
    pub entry_position: LogPosition,
    pub position_after_entry: LogPosition,
    /// Where reading of the enclosing segment stopped.
    pub post_read_position: LogPosition,
    /// Identity from the enclosing segment's header.
    pub enclosing_store_id: StoreIdentity,
}

/// Builds checkpoint records, consulting the transaction chain where the
/// entry alone is not enough.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointRecordBuilder<'a> {
    transactions: &'a dyn SegmentStore,
}

impl<'a> CheckpointRecordBuilder<'a> {
    #[must_use]
    pub const fn new(transactions: &'a dyn SegmentStore) -> Self {
        Self { transactions }
    }

    /// `None` when `entry` is not a checkpoint.
    pub fn build(
        &self,
        entry: &LogEntry,
        location: &CheckpointLocation,
    ) -> Result<Option<CheckpointInfo>> {
        match entry {
            LogEntry::Checkpoint(checkpoint) => self.build_current(checkpoint, location).map(Some),
            LogEntry::LegacyCheckpoint(checkpoint) => {
                self.build_legacy(checkpoint, location).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn build_current(
        &self,
        entry: &CheckpointEntry,
        location: &CheckpointLocation,
    ) -> Result<CheckpointInfo> {
        let info = CheckpointInfo {
            transaction_log_position: entry.transaction_log_position,
            checkpoint_entry_position: location.entry_position,
            channel_position_after_checkpoint: location.position_after_entry,
            checkpoint_file_post_read_position: location.post_read_position,
            format_version: entry.format_version,
            format_version_byte: entry.format_version.as_byte(),
            transaction_id: entry.transaction_id,
            append_index: entry.append_index,
            reason: entry.reason.clone(),
            store_id: entry.store_id.clone(),
        };
        if entry.format_version.checkpoint_carries_consensus_index()
            || info.transaction_id.has_consensus_index()
        {
            return Ok(info);
        }
        match self.find_consensus_index(&info)? {
            Some(consensus_index) => Ok(info.with_consensus_index(consensus_index)),
            None => Ok(info),
        }
    }

    fn build_legacy(
        &self,
        entry: &LegacyCheckpointEntry,
        location: &CheckpointLocation,
    ) -> Result<CheckpointInfo> {
        let transaction_id =
            resolve_legacy_transaction(self.transactions, entry.transaction_log_position)?;
        Ok(CheckpointInfo {
            transaction_log_position: entry.transaction_log_position,
            checkpoint_entry_position: location.entry_position,
            channel_position_after_checkpoint: location.position_after_entry,
            checkpoint_file_post_read_position: location.post_read_position,
            format_version: entry.format_version,
            format_version_byte: entry.format_version.as_byte(),
            transaction_id,
            append_index: transaction_id.append_index,
            reason: LEGACY_CHECKPOINT_REASON.to_owned(),
            store_id: location.enclosing_store_id.clone(),
        })
    }

    /// Consensus index from the start entry of the checkpointed transaction.
    ///
    /// Looks in the segment the checkpoint points into, then in the one
    /// before it. Damaged or missing segments yield `None`.
    fn find_consensus_index(&self, info: &CheckpointInfo) -> Result<Option<i64>> {
        let version = info.transaction_log_position.segment_version;
        let tx_id = info.transaction_id.id;
        let mut candidates = vec![version];
        if let Some(previous) = version.checked_sub(1) {
            candidates.push(previous);
        }
        for candidate in candidates {
            match self.consensus_index_in(candidate, tx_id) {
                Ok(Some(consensus_index)) => {
                    debug!(
                        segment_version = candidate,
                        tx_id, consensus_index, "consensus index recovered from start entry"
                    );
                    return Ok(Some(consensus_index));
                }
                Ok(None) => {}
                Err(err) if err.is_corruption() => {
                    warn!(
                        segment_version = candidate,
                        tx_id,
                        %err,
                        "cannot search segment for consensus index"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn consensus_index_in(&self, version: u64, tx_id: i64) -> Result<Option<i64>> {
        let Some(header) = self.transactions.extract_header(version)? else {
            return Ok(None);
        };
        let mut reader = LogEntryReader::open(self.transactions, header.start_position())?;
        let mut last_start_index = None;
        while let Some(entry) = reader.next_entry()? {
            match entry {
                LogEntry::Start(start) => last_start_index = start.consensus_index(),
                LogEntry::Commit(commit) if commit.tx_id == tx_id => return Ok(last_start_index),
                _ => {}
            }
        }
        Ok(None)
    }
}
