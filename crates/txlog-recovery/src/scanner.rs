//! Finding checkpoints in segment chains.
//!
//! Checkpoints live either in a dedicated checkpoint chain (V3 and later) or
//! inline in the transaction segments (V1/V2). [`SegmentCheckpointScanner`]
//! reads one layout; [`CompositeCheckpointScanner`] joins both so a store
//! upgraded from the inline layout still sees its older checkpoints.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use txlog_error::{Result, TxLogError};
use txlog_segment::{LogEntry, LogEntryReader, SegmentStore, StopReason};
use txlog_types::{CheckpointInfo, LogPosition};

use crate::checkpoint::{CheckpointLocation, CheckpointRecordBuilder};
use crate::trailing::find_trailing_garbage;

/// Source of checkpoint records.
pub trait CheckpointScanner: Send + Sync + fmt::Debug {
    /// The newest checkpoint, if any.
    fn latest_checkpoint(&self) -> Result<Option<CheckpointInfo>>;

    /// All checkpoints, oldest first. The last element equals
    /// [`CheckpointScanner::latest_checkpoint`].
    fn reachable_checkpoints(&self) -> Result<Vec<CheckpointInfo>>;

    /// First segment header that does not decode. Such segments are skipped
    /// by the other two methods.
    fn header_damage(&self) -> Result<Option<TxLogError>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Segments of their own, holding only checkpoint entries.
    Dedicated,
    /// Checkpoint entries interleaved with transactions.
    Inline,
}

/// A checkpoint entry before it is turned into a record.
struct RawCheckpoint {
    entry: LogEntry,
    location: CheckpointLocation,
}

/// Scans one chain of segments for checkpoint entries.
#[derive(Debug, Clone)]
pub struct SegmentCheckpointScanner {
    layout: Layout,
    checkpoints: Arc<dyn SegmentStore>,
    transactions: Arc<dyn SegmentStore>,
    trailing_check_window: usize,
}

impl SegmentCheckpointScanner {
    /// Checkpoints stored in their own chain.
    #[must_use]
    pub fn dedicated(
        checkpoints: Arc<dyn SegmentStore>,
        transactions: Arc<dyn SegmentStore>,
        trailing_check_window: usize,
    ) -> Self {
        Self {
            layout: Layout::Dedicated,
            checkpoints,
            transactions,
            trailing_check_window,
        }
    }

    /// Checkpoints stored inline in transaction segments of the oldest
    /// formats.
    #[must_use]
    pub fn inline(transactions: Arc<dyn SegmentStore>, trailing_check_window: usize) -> Self {
        Self {
            layout: Layout::Inline,
            checkpoints: Arc::clone(&transactions),
            transactions,
            trailing_check_window,
        }
    }

    fn log_scan(&self, version: u64) {
        match self.layout {
            Layout::Dedicated => info!(
                segment_version = version,
                "Scanning checkpoint segment with version {version} for checkpoint entries"
            ),
            Layout::Inline => info!(
                segment_version = version,
                "Scanning transaction log segment with version {version} for checkpoint entries"
            ),
        }
    }

    /// Checkpoint entries of one segment in file order.
    fn read_segment(&self, version: u64) -> Result<Vec<RawCheckpoint>> {
        let store = self.checkpoints.as_ref();
        let header = match store.extract_header(version) {
            Ok(Some(header)) => header,
            Ok(None) => {
                debug!(segment_version = version, "segment without header skipped");
                return Ok(Vec::new());
            }
            Err(err) if err.is_corruption() => {
                warn!(segment_version = version, %err, "segment with unreadable header skipped");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        if self.layout == Layout::Inline && header.format_version.has_dedicated_checkpoints() {
            return Ok(Vec::new());
        }
        self.log_scan(version);

        let mut reader = LogEntryReader::open(store, header.start_position())?;
        let mut found = Vec::new();
        loop {
            let entry_position = reader.position();
            let Some(entry) = reader.next_entry()? else {
                break;
            };
            if entry.is_checkpoint() {
                found.push((entry, entry_position, reader.position()));
            }
        }

        let post_read_position = self.post_read_position(&reader)?;
        Ok(found
            .into_iter()
            .map(|(entry, entry_position, position_after_entry)| RawCheckpoint {
                entry,
                location: CheckpointLocation {
                    entry_position,
                    position_after_entry,
                    post_read_position,
                    enclosing_store_id: header.store_id.clone(),
                },
            })
            .collect())
    }

    /// Where reading stopped, or the segment end when readable data stopped
    /// short of it.
    fn post_read_position(&self, reader: &LogEntryReader) -> Result<LogPosition> {
        let position = reader.position();
        let end = LogPosition::new(reader.segment_version(), reader.segment_size());
        match reader.stop_reason() {
            Some(StopReason::EndOfSegment) => Ok(position),
            Some(StopReason::ZeroPadding) => {
                let garbage = find_trailing_garbage(
                    self.checkpoints.as_ref(),
                    position.segment_version,
                    position.byte_offset,
                    self.trailing_check_window,
                )?;
                Ok(if garbage.is_none() { position } else { end })
            }
            _ => Ok(end),
        }
    }

    fn build(&self, raw: &RawCheckpoint) -> Result<Option<CheckpointInfo>> {
        CheckpointRecordBuilder::new(self.transactions.as_ref()).build(&raw.entry, &raw.location)
    }
}

impl CheckpointScanner for SegmentCheckpointScanner {
    fn latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        let versions = self.checkpoints.versions()?;
        for version in versions.into_iter().rev() {
            if let Some(raw) = self.read_segment(version)?.last() {
                return self.build(raw);
            }
        }
        Ok(None)
    }

    fn reachable_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let mut checkpoints = Vec::new();
        for version in self.checkpoints.versions()? {
            for raw in self.read_segment(version)? {
                if let Some(info) = self.build(&raw)? {
                    checkpoints.push(info);
                }
            }
        }
        Ok(checkpoints)
    }

    fn header_damage(&self) -> Result<Option<TxLogError>> {
        for version in self.checkpoints.versions()? {
            match self.checkpoints.extract_header(version) {
                Ok(_) => {}
                Err(err) if err.is_corruption() => return Ok(Some(err)),
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// Inline checkpoints of upgraded stores followed by dedicated ones.
#[derive(Debug, Clone)]
pub struct CompositeCheckpointScanner {
    inline: SegmentCheckpointScanner,
    dedicated: SegmentCheckpointScanner,
}

impl CompositeCheckpointScanner {
    #[must_use]
    pub fn new(
        transactions: Arc<dyn SegmentStore>,
        checkpoints: Arc<dyn SegmentStore>,
        trailing_check_window: usize,
    ) -> Self {
        Self {
            inline: SegmentCheckpointScanner::inline(
                Arc::clone(&transactions),
                trailing_check_window,
            ),
            dedicated: SegmentCheckpointScanner::dedicated(
                checkpoints,
                transactions,
                trailing_check_window,
            ),
        }
    }
}

impl CheckpointScanner for CompositeCheckpointScanner {
    fn latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        match self.dedicated.latest_checkpoint()? {
            Some(checkpoint) => Ok(Some(checkpoint)),
            None => self.inline.latest_checkpoint(),
        }
    }

    fn reachable_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let mut checkpoints = self.inline.reachable_checkpoints()?;
        checkpoints.extend(self.dedicated.reachable_checkpoints()?);
        Ok(checkpoints)
    }

    fn header_damage(&self) -> Result<Option<TxLogError>> {
        match self.dedicated.header_damage()? {
            Some(err) => Ok(Some(err)),
            None => self.inline.header_damage(),
        }
    }
}
