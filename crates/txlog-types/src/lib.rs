//! Value types shared by the segment layer and the recovery core.
//!
//! None of these types own file handles; they are plain data that can be
//! copied, compared and serialized for diagnostics.

pub mod checkpoint;
pub mod format;
pub mod identity;
pub mod position;
pub mod tail;
pub mod transaction;

pub use checkpoint::CheckpointInfo;
pub use format::FormatVersion;
pub use identity::{StoreCompatibility, StoreIdentity, UpgradeSuccessor};
pub use position::LogPosition;
pub use tail::{AppendBatchInfo, LogTailInformation, NO_TRANSACTION_ID, UNKNOWN_APPEND_INDEX};
pub use transaction::{TransactionId, UNKNOWN_CONSENSUS_INDEX};
