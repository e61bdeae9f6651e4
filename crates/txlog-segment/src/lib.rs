//! Versioned transaction log segments.
//!
//! A chain is a sequence of segments numbered by version. Each segment starts
//! with a fixed-size [`SegmentHeader`] followed by framed [`LogEntry`]
//! records. This crate provides the header and entry codecs, the
//! [`SegmentStore`] abstraction with in-memory and directory-backed
//! implementations, a forward [`LogEntryReader`] and a [`SegmentWriter`].

mod bytes;
pub mod codec;
pub mod entry;
pub mod file;
pub mod header;
pub mod memory;
pub mod reader;
pub mod store;
pub mod writer;

pub use codec::{
    COMMIT_ENTRY_SIZE_WITH_CHECKSUM, COMMIT_ENTRY_SIZE_WITHOUT_CHECKSUM, Decoded, decode_entry,
    encode_entry,
};
pub use entry::{
    CheckpointEntry, ChunkEndEntry, ChunkStartEntry, CommandEntry, CommitEntry, EntryType,
    LegacyCheckpointEntry, LogEntry, RollbackEntry, StartEntry, decode_consensus_index,
    encode_consensus_index,
};
pub use file::FileSegmentStore;
pub use header::{SEGMENT_HEADER_SIZE, SEGMENT_MAGIC, SegmentHeader, SegmentKind};
pub use memory::MemorySegmentStore;
pub use reader::{LogEntryReader, StopReason};
pub use store::{SegmentChannel, SegmentStore};
pub use writer::{SegmentWriter, TransactionRecord, WrittenTransaction, transaction_checksum};
