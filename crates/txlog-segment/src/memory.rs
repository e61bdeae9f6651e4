//! In-memory segment store.
//!
//! Channels read a snapshot of the segment taken when they were opened, so a
//! test can damage a segment while a reader still holds the old bytes. Every
//! trait call is counted in [`MemorySegmentStore::io_operations`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use txlog_error::{Result, TxLogError};

use crate::store::{SegmentChannel, SegmentStore};

#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    segments: RwLock<BTreeMap<u64, Arc<Vec<u8>>>>,
    io_operations: AtomicU64,
}

impl MemorySegmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a segment.
    pub fn put_segment(&self, version: u64, bytes: Vec<u8>) {
        self.segments.write().insert(version, Arc::new(bytes));
    }

    /// Copy of a segment's bytes.
    #[must_use]
    pub fn segment_bytes(&self, version: u64) -> Option<Vec<u8>> {
        self.segments
            .read()
            .get(&version)
            .map(|bytes| bytes.as_ref().clone())
    }

    pub fn append_bytes(&self, version: u64, bytes: &[u8]) -> Result<()> {
        self.modify(version, |data| data.extend_from_slice(bytes))
    }

    pub fn truncate(&self, version: u64, len: u64) -> Result<()> {
        self.modify(version, |data| data.truncate(len as usize))
    }

    /// Overwrite bytes at `offset`, growing the segment when needed.
    pub fn write_at(&self, version: u64, offset: u64, bytes: &[u8]) -> Result<()> {
        self.modify(version, |data| {
            let start = offset as usize;
            let end = start + bytes.len();
            if data.len() < end {
                data.resize(end, 0);
            }
            data[start..end].copy_from_slice(bytes);
        })
    }

    /// Number of store calls made so far.
    #[must_use]
    pub fn io_operations(&self) -> u64 {
        self.io_operations.load(Ordering::Relaxed)
    }

    fn modify(&self, version: u64, f: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        let mut segments = self.segments.write();
        let data = segments
            .get_mut(&version)
            .ok_or(TxLogError::MissingSegment { version })?;
        f(Arc::make_mut(data));
        Ok(())
    }

    fn count(&self) {
        self.io_operations.fetch_add(1, Ordering::Relaxed);
    }
}

impl SegmentStore for MemorySegmentStore {
    fn versions(&self) -> Result<Vec<u64>> {
        self.count();
        Ok(self.segments.read().keys().copied().collect())
    }

    fn version_exists(&self, version: u64) -> Result<bool> {
        self.count();
        Ok(self.segments.read().contains_key(&version))
    }

    fn open_for_version(&self, version: u64) -> Result<Box<dyn SegmentChannel>> {
        self.count();
        let data = self
            .segments
            .read()
            .get(&version)
            .cloned()
            .ok_or(TxLogError::MissingSegment { version })?;
        Ok(Box::new(MemoryChannel {
            version,
            data,
            cursor: 0,
        }))
    }
}

struct MemoryChannel {
    version: u64,
    data: Arc<Vec<u8>>,
    cursor: u64,
}

impl SegmentChannel for MemoryChannel {
    fn version(&self) -> u64 {
        self.version
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.cursor = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = usize::try_from(self.cursor)
            .map_err(|_| TxLogError::internal("segment offset exceeds address space"))?;
        let Some(available) = self.data.get(start..) else {
            return Ok(0);
        };
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.cursor += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_sorted() {
        let store = MemorySegmentStore::new();
        store.put_segment(5, vec![1]);
        store.put_segment(3, vec![1]);
        store.put_segment(4, vec![1]);
        assert_eq!(store.versions().expect("versions"), vec![3, 4, 5]);
        assert_eq!(store.lowest_version().expect("lowest"), Some(3));
        assert_eq!(store.highest_version().expect("highest"), Some(5));
    }

    #[test]
    fn channel_reads_snapshot() {
        let store = MemorySegmentStore::new();
        store.put_segment(0, vec![1, 2, 3, 4]);
        let mut channel = store.open_for_version(0).expect("open");
        store.truncate(0, 1).expect("truncate");
        let mut buf = [0_u8; 8];
        assert_eq!(channel.read_at(1, &mut buf).expect("read"), 3);
        assert_eq!(&buf[..3], &[2, 3, 4]);
        assert_eq!(store.segment_bytes(0), Some(vec![1]));
    }

    #[test]
    fn missing_segment_fails_to_open() {
        let store = MemorySegmentStore::new();
        assert!(matches!(
            store.open_for_version(9),
            Err(TxLogError::MissingSegment { version: 9 })
        ));
        assert_eq!(store.extract_header(9).expect("no header"), None);
    }

    #[test]
    fn write_at_grows_segment() {
        let store = MemorySegmentStore::new();
        store.put_segment(1, vec![0; 4]);
        store.write_at(1, 6, &[9, 9]).expect("write");
        assert_eq!(store.segment_bytes(1), Some(vec![0, 0, 0, 0, 0, 0, 9, 9]));
    }

    #[test]
    fn append_bytes_requires_existing_segment() {
        let store = MemorySegmentStore::new();
        store.put_segment(2, vec![1]);
        store.append_bytes(2, &[2, 3]).expect("append");
        assert_eq!(store.segment_bytes(2), Some(vec![1, 2, 3]));
        assert!(matches!(
            store.append_bytes(3, &[1]),
            Err(TxLogError::MissingSegment { version: 3 })
        ));
    }

    #[test]
    fn every_call_is_counted() {
        let store = MemorySegmentStore::new();
        store.put_segment(1, vec![0; 4]);
        let before = store.io_operations();
        store.version_exists(1).expect("exists");
        store.open_for_version(1).expect("open");
        assert_eq!(store.io_operations(), before + 2);
    }
}
