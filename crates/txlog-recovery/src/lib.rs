//! Log tail resolution for crash recovery.
//!
//! At startup the store needs to know where durable history ends: the last
//! valid checkpoint, whether anything was written after it, and whether the
//! tail of the transaction chain is damaged. [`LogTailService`] answers this
//! once and caches the result.
//!
//! Resolution proceeds as follows:
//!
//! 1. The [`CheckpointScanner`] finds the latest checkpoint, in the dedicated
//!    checkpoint chain or inline in transaction segments of the oldest
//!    formats.
//! 2. The checkpoint is validated against the transaction chain. A rejected
//!    checkpoint is fatal unless `fail_on_corrupted_log_files` is off, in
//!    which case older checkpoints are tried newest first.
//! 3. The transaction chain is scanned forward from the chosen start for the
//!    first transaction and for the end of the last complete batch.
//! 4. Bytes after the last readable entry must be zero.

pub mod backfill;
pub mod chain;
pub mod checkpoint;
pub mod config;
mod legacy;
pub mod resolver;
pub mod scanner;
pub mod state;
pub mod tail;
pub mod trailing;

pub use backfill::{BackfillOutcome, backfill_append_index};
pub use checkpoint::{CheckpointLocation, CheckpointRecordBuilder, LEGACY_CHECKPOINT_REASON};
pub use config::{DEFAULT_TRAILING_CHECK_WINDOW, TailScanConfig};
pub use legacy::resolve_legacy_transaction;
pub use resolver::TailResolver;
pub use scanner::{CheckpointScanner, CompositeCheckpointScanner, SegmentCheckpointScanner};
pub use state::{CheckpointVerdict, TailFailure, TailState};
pub use tail::LogTailService;
pub use trailing::{TrailingGarbage, verify_trailing_bytes};
