//! Access to a chain of versioned segments.
//!
//! Both traits are object-safe so the recovery core can run against the
//! in-memory store in tests and the file store in production.

use std::fmt;

use txlog_error::Result;

use crate::header::{SEGMENT_HEADER_SIZE, SegmentHeader};

/// A readable handle on one segment.
pub trait SegmentChannel: Send {
    /// Version of the segment this channel reads.
    fn version(&self) -> u64;

    /// Current size of the segment in bytes.
    fn size(&self) -> Result<u64>;

    /// Move the read cursor.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Read up to `buf.len()` bytes at the cursor. Returns 0 at the end.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Fill as much of `buf` as the segment allows, starting at `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek(offset)?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// The set of segments of one chain.
pub trait SegmentStore: Send + Sync + fmt::Debug {
    /// All existing versions, ascending.
    fn versions(&self) -> Result<Vec<u64>>;

    fn version_exists(&self, version: u64) -> Result<bool>;

    /// Open a segment; fails with `MissingSegment` when it does not exist.
    fn open_for_version(&self, version: u64) -> Result<Box<dyn SegmentChannel>>;

    fn highest_version(&self) -> Result<Option<u64>> {
        Ok(self.versions()?.last().copied())
    }

    fn lowest_version(&self) -> Result<Option<u64>> {
        Ok(self.versions()?.first().copied())
    }

    /// Header of a segment; `None` when the segment does not exist or is too
    /// short to hold one.
    fn extract_header(&self, version: u64) -> Result<Option<SegmentHeader>> {
        if !self.version_exists(version)? {
            return Ok(None);
        }
        let mut channel = self.open_for_version(version)?;
        if channel.size()? < SEGMENT_HEADER_SIZE {
            return Ok(None);
        }
        let mut buf = vec![0_u8; SEGMENT_HEADER_SIZE as usize];
        let n = channel.read_at(0, &mut buf)?;
        if (n as u64) < SEGMENT_HEADER_SIZE {
            return Ok(None);
        }
        SegmentHeader::decode(version, &buf).map(Some)
    }

    /// Size of a segment, `None` when it does not exist.
    fn segment_size(&self, version: u64) -> Result<Option<u64>> {
        if !self.version_exists(version)? {
            return Ok(None);
        }
        self.open_for_version(version)?.size().map(Some)
    }
}
