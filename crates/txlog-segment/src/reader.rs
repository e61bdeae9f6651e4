//! Forward entry reader over one segment.

use txlog_error::{Result, TxLogError};
use txlog_types::LogPosition;

use crate::codec::{Decoded, decode_entry};
use crate::entry::LogEntry;
use crate::store::{SegmentChannel, SegmentStore};

const READ_CHUNK: usize = 64 * 1024;

/// Why a reader stopped producing entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every byte of the segment was consumed.
    EndOfSegment,
    /// A zero version byte: the rest is pre-allocated space.
    ZeroPadding,
    /// The segment ends inside an entry, typically an interrupted append.
    IncompleteEntry,
    /// The bytes at the position are not an entry.
    Undecodable { reason: String },
}

/// Lazily decodes entries from a segment, starting at a given offset.
///
/// [`LogEntryReader::position`] is always the offset right after the last
/// entry that decoded completely, which is where a writer would resume.
pub struct LogEntryReader {
    channel: Box<dyn SegmentChannel>,
    size: u64,
    buffer: Vec<u8>,
    buffer_offset: u64,
    position: u64,
    stop: Option<StopReason>,
}

impl LogEntryReader {
    /// Start reading `channel` at `offset`.
    pub fn new(channel: Box<dyn SegmentChannel>, offset: u64) -> Result<Self> {
        let size = channel.size()?;
        if offset > size {
            return Err(TxLogError::InconsistentPosition {
                expected_version: channel.version(),
                actual: format!("offset {offset} is beyond segment size {size}"),
            });
        }
        Ok(Self {
            channel,
            size,
            buffer: Vec::new(),
            buffer_offset: offset,
            position: offset,
            stop: None,
        })
    }

    /// Open the segment holding `start` and read from there.
    pub fn open(store: &dyn SegmentStore, start: LogPosition) -> Result<Self> {
        let channel = store.open_for_version(start.segment_version)?;
        Self::new(channel, start.byte_offset)
    }

    /// Next complete entry, `None` once the reader stopped.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        if self.stop.is_some() {
            return Ok(None);
        }
        loop {
            let consumed = (self.position - self.buffer_offset) as usize;
            match decode_entry(&self.buffer[consumed..]) {
                Decoded::Entry { entry, length } => {
                    self.position += length as u64;
                    return Ok(Some(entry));
                }
                Decoded::EndOfData => {
                    self.stop = Some(StopReason::ZeroPadding);
                    return Ok(None);
                }
                Decoded::Invalid { reason } => {
                    self.stop = Some(StopReason::Undecodable { reason });
                    return Ok(None);
                }
                Decoded::Incomplete => {
                    if !self.fill()? {
                        self.stop = Some(if self.position >= self.size {
                            StopReason::EndOfSegment
                        } else {
                            StopReason::IncompleteEntry
                        });
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Position right after the last complete entry.
    #[must_use]
    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.channel.version(), self.position)
    }

    #[must_use]
    pub fn segment_version(&self) -> u64 {
        self.channel.version()
    }

    /// Size of the segment when the reader was opened.
    #[must_use]
    pub const fn segment_size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    /// Whether the last attempted entry failed to decode.
    #[must_use]
    pub const fn last_read_failed(&self) -> bool {
        matches!(
            self.stop,
            Some(StopReason::IncompleteEntry | StopReason::Undecodable { .. })
        )
    }

    /// Whether every byte of the segment was consumed.
    #[must_use]
    pub const fn fully_consumed(&self) -> bool {
        matches!(self.stop, Some(StopReason::EndOfSegment))
    }

    /// Restart reading at `offset`.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.size {
            return Err(TxLogError::InconsistentPosition {
                expected_version: self.channel.version(),
                actual: format!("offset {offset} is beyond segment size {}", self.size),
            });
        }
        self.buffer.clear();
        self.buffer_offset = offset;
        self.position = offset;
        self.stop = None;
        Ok(())
    }

    /// Drop consumed bytes and read the next chunk. `false` at end of segment.
    fn fill(&mut self) -> Result<bool> {
        let consumed = (self.position - self.buffer_offset) as usize;
        self.buffer.drain(..consumed);
        self.buffer_offset = self.position;

        let read_from = self.buffer_offset + self.buffer.len() as u64;
        if read_from >= self.size {
            return Ok(false);
        }
        let want = READ_CHUNK.min((self.size - read_from) as usize);
        let old_len = self.buffer.len();
        self.buffer.resize(old_len + want, 0);
        let n = self.channel.read_at(read_from, &mut self.buffer[old_len..])?;
        self.buffer.truncate(old_len + n);
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_entry;
    use crate::entry::{CommitEntry, StartEntry};
    use crate::memory::MemorySegmentStore;
    use txlog_types::FormatVersion;

    fn start(append_index: i64) -> LogEntry {
        LogEntry::Start(StartEntry {
            format_version: FormatVersion::V4,
            time_written: 0,
            append_index,
            previous_checksum: 0,
            additional_header: Vec::new(),
        })
    }

    fn commit(tx_id: i64) -> LogEntry {
        LogEntry::Commit(CommitEntry {
            format_version: FormatVersion::V4,
            tx_id,
            commit_timestamp: 0,
            checksum: 0,
        })
    }

    fn segment(entries: &[LogEntry]) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in entries {
            encode_entry(entry, &mut out).expect("encode");
        }
        out
    }

    fn reader_over(bytes: Vec<u8>) -> LogEntryReader {
        let store = MemorySegmentStore::new();
        store.put_segment(0, bytes);
        LogEntryReader::open(&store, LogPosition::new(0, 0)).expect("open reader")
    }

    #[test]
    fn reads_all_entries_then_end_of_segment() {
        let bytes = segment(&[start(1), commit(1)]);
        let len = bytes.len() as u64;
        let mut reader = reader_over(bytes);
        assert_eq!(reader.next_entry().expect("read"), Some(start(1)));
        assert_eq!(reader.next_entry().expect("read"), Some(commit(1)));
        assert_eq!(reader.next_entry().expect("read"), None);
        assert!(reader.fully_consumed());
        assert!(!reader.last_read_failed());
        assert_eq!(reader.position(), LogPosition::new(0, len));
    }

    #[test]
    fn zero_padding_stops_cleanly() {
        let mut bytes = segment(&[start(1)]);
        let readable = bytes.len() as u64;
        bytes.resize(bytes.len() + 100, 0);
        let mut reader = reader_over(bytes);
        assert!(reader.next_entry().expect("read").is_some());
        assert_eq!(reader.next_entry().expect("read"), None);
        assert_eq!(reader.stop_reason(), Some(&StopReason::ZeroPadding));
        assert!(!reader.last_read_failed());
        assert_eq!(reader.position().byte_offset, readable);
    }

    #[test]
    fn truncated_entry_is_incomplete() {
        let mut bytes = segment(&[start(2), start(3)]);
        bytes.pop();
        let mut reader = reader_over(bytes);
        assert_eq!(reader.next_entry().expect("read"), Some(start(2)));
        assert_eq!(reader.next_entry().expect("read"), None);
        assert_eq!(reader.stop_reason(), Some(&StopReason::IncompleteEntry));
        assert!(reader.last_read_failed());
    }

    #[test]
    fn garbage_is_undecodable() {
        let mut bytes = segment(&[commit(1)]);
        bytes.extend_from_slice(&[0x7F, 2, 3, 4, 5]);
        let mut reader = reader_over(bytes);
        assert!(reader.next_entry().expect("read").is_some());
        assert_eq!(reader.next_entry().expect("read"), None);
        assert!(matches!(
            reader.stop_reason(),
            Some(StopReason::Undecodable { .. })
        ));
        assert!(reader.last_read_failed());
    }

    #[test]
    fn seek_restarts() {
        let bytes = segment(&[start(7), commit(7)]);
        let mut reader = reader_over(bytes);
        while reader.next_entry().expect("read").is_some() {}
        reader.seek(0).expect("seek");
        assert_eq!(reader.next_entry().expect("read"), Some(start(7)));
    }

    #[test]
    fn offset_beyond_size_is_rejected() {
        let store = MemorySegmentStore::new();
        store.put_segment(4, vec![0; 10]);
        assert!(matches!(
            LogEntryReader::open(&store, LogPosition::new(4, 11)),
            Err(TxLogError::InconsistentPosition {
                expected_version: 4,
                ..
            })
        ));
    }

    #[test]
    fn entries_larger_than_one_chunk() {
        let big = LogEntry::Command(crate::entry::CommandEntry {
            format_version: FormatVersion::V4,
            payload: vec![0xAB; READ_CHUNK * 2 + 17],
        });
        let bytes = segment(&[big.clone(), commit(1)]);
        let mut reader = reader_over(bytes);
        assert_eq!(reader.next_entry().expect("read"), Some(big));
        assert_eq!(reader.next_entry().expect("read"), Some(commit(1)));
        assert_eq!(reader.next_entry().expect("read"), None);
        assert!(reader.fully_consumed());
    }
}
