//! Directory-backed segment store. Segment `v` lives in `<prefix>.<v>`.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;
use txlog_error::{Result, TxLogError};

use crate::store::{SegmentChannel, SegmentStore};

#[derive(Debug, Clone)]
pub struct FileSegmentStore {
    directory: PathBuf,
    prefix: String,
}

impl FileSegmentStore {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn segment_path(&self, version: u64) -> PathBuf {
        self.directory.join(format!("{}.{version}", self.prefix))
    }

    /// Create or replace a segment file.
    pub fn put_segment(&self, version: u64, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.directory)?;
        let path = self.segment_path(version);
        fs::write(&path, bytes)?;
        debug!(version, len = bytes.len(), path = %path.display(), "segment written");
        Ok(())
    }

    fn parse_version(&self, file_name: &str) -> Option<u64> {
        file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('.')?
            .parse()
            .ok()
    }
}

impl SegmentStore for FileSegmentStore {
    fn versions(&self) -> Result<Vec<u64>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(version) = entry.file_name().to_str().and_then(|n| self.parse_version(n)) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn version_exists(&self, version: u64) -> Result<bool> {
        Ok(self.segment_path(version).is_file())
    }

    fn open_for_version(&self, version: u64) -> Result<Box<dyn SegmentChannel>> {
        let file = match File::open(self.segment_path(version)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(TxLogError::MissingSegment { version });
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Box::new(FileChannel { version, file }))
    }
}

struct FileChannel {
    version: u64,
    file: File,
}

impl SegmentChannel for FileChannel {
    fn version(&self) -> u64 {
        self.version
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.file.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_matching_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSegmentStore::new(dir.path(), "txlog");
        store.put_segment(2, b"two").expect("write 2");
        store.put_segment(10, b"ten").expect("write 10");
        fs::write(dir.path().join("txlog.tmp"), b"x").expect("write junk");
        fs::write(dir.path().join("checkpoint.3"), b"x").expect("write other chain");
        assert_eq!(store.versions().expect("versions"), vec![2, 10]);
        assert!(store.version_exists(10).expect("exists"));
        assert!(!store.version_exists(3).expect("exists"));
    }

    #[test]
    fn missing_directory_is_an_empty_chain() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSegmentStore::new(dir.path().join("absent"), "txlog");
        assert_eq!(store.highest_version().expect("highest"), None);
    }

    #[test]
    fn channel_reads_file_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSegmentStore::new(dir.path(), "txlog");
        store.put_segment(0, &[1, 2, 3, 4, 5]).expect("write");
        let mut channel = store.open_for_version(0).expect("open");
        assert_eq!(channel.size().expect("size"), 5);
        let mut buf = [0_u8; 3];
        assert_eq!(channel.read_at(3, &mut buf).expect("read"), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert!(matches!(
            store.open_for_version(1),
            Err(TxLogError::MissingSegment { version: 1 })
        ));
    }
}
