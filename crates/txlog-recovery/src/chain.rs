//! Reading across consecutive segments of one chain.

use tracing::warn;
use txlog_error::Result;
use txlog_segment::{LogEntry, LogEntryReader, SegmentStore};
use txlog_types::LogPosition;

/// An entry together with where it starts and ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedEntry {
    pub position: LogPosition,
    pub entry: LogEntry,
    pub position_after: LogPosition,
}

/// Reads entries forward from a position, moving to segment `v + 1` only
/// once segment `v` was consumed to its last byte.
///
/// Anything else that stops the segment reader (zero padding, a torn or
/// undecodable entry) ends the chain; [`ChainReader::position`] then names the
/// last readable offset for the trailing-bytes check. A next segment whose
/// header does not decode also ends the chain and is reported by
/// [`ChainReader::damaged_header`].
pub struct ChainReader<'a> {
    store: &'a dyn SegmentStore,
    reader: LogEntryReader,
    damaged_header: Option<u64>,
}

impl<'a> ChainReader<'a> {
    pub fn open(store: &'a dyn SegmentStore, start: LogPosition) -> Result<Self> {
        Ok(Self {
            store,
            reader: LogEntryReader::open(store, start)?,
            damaged_header: None,
        })
    }

    pub fn next_entry(&mut self) -> Result<Option<PositionedEntry>> {
        loop {
            let position = self.reader.position();
            if let Some(entry) = self.reader.next_entry()? {
                return Ok(Some(PositionedEntry {
                    position,
                    entry,
                    position_after: self.reader.position(),
                }));
            }
            if !self.reader.fully_consumed() {
                return Ok(None);
            }
            let next = self.reader.segment_version() + 1;
            let header = match self.store.extract_header(next) {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(None),
                Err(err) if err.is_corruption() => {
                    warn!(
                        segment_version = next,
                        %err,
                        "chain ends at an unreadable segment header"
                    );
                    self.damaged_header = Some(next);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            self.reader = LogEntryReader::open(self.store, header.start_position())?;
        }
    }

    /// Position right after the last complete entry of the current segment.
    #[must_use]
    pub fn position(&self) -> LogPosition {
        self.reader.position()
    }

    #[must_use]
    pub const fn last_read_failed(&self) -> bool {
        self.reader.last_read_failed()
    }

    /// Version of the segment whose header stopped the chain, if any.
    #[must_use]
    pub const fn damaged_header(&self) -> Option<u64> {
        self.damaged_header
    }
}
