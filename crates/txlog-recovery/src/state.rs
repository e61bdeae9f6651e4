//! States of tail resolution and the pure transitions between them.
//!
//! The resolver performs all I/O; this module only decides what happens with
//! each answer, which keeps the policy testable without segments.
//!
//! ```text
//! begin ──► NoCheckpoint ──────────────────────────► Resolved
//!       ──► ValidCheckpoint ───────────────────────► Resolved
//!       ──► InvalidCheckpointRetry ─┬► ValidCheckpoint
//!                                   └► NoCheckpoint (candidates exhausted)
//!       ──► Failed
//! ```

use std::collections::VecDeque;

use txlog_error::TxLogError;
use txlog_types::{CheckpointInfo, LogPosition, LogTailInformation};

/// Outcome of checking one checkpoint against the transaction chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointVerdict {
    Valid,
    /// The transaction position does not exist in the chain.
    Invalid { reason: String },
    /// The checkpoint was written in a format this build does not accept.
    Unsupported { version: u8 },
}

/// Why resolution stopped without an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailFailure {
    UnsupportedFormat { version: u8 },
    InvalidCheckpoint { position: LogPosition },
    CheckpointChainUnreadable { position: LogPosition },
}

impl TailFailure {
    #[must_use]
    pub fn into_error(self) -> TxLogError {
        match self {
            Self::UnsupportedFormat { version } => {
                TxLogError::unsupported_format(version, "latest checkpoint")
            }
            Self::InvalidCheckpoint { position } => TxLogError::InvalidCheckpoint {
                version: position.segment_version,
                offset: position.byte_offset,
            },
            Self::CheckpointChainUnreadable { position } => TxLogError::corrupted(
                position.segment_version,
                format!(
                    "checkpoint segment with version {} has some data available after last \
                     readable log entry at offset {}",
                    position.segment_version, position.byte_offset
                ),
            ),
        }
    }
}

/// Where resolution currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailState {
    /// Scan the transaction chain from its oldest segment.
    NoCheckpoint { corrupted: bool },
    /// Scan the transaction chain from this checkpoint.
    ValidCheckpoint {
        checkpoint: Box<CheckpointInfo>,
        corrupted: bool,
    },
    /// The latest checkpoint was rejected; older ones are tried newest first.
    InvalidCheckpointRetry {
        rejected: Box<CheckpointInfo>,
        candidates: VecDeque<CheckpointInfo>,
        corrupted: bool,
    },
    Resolved(Box<LogTailInformation>),
    Failed(TailFailure),
}

impl TailState {
    /// First state given the latest checkpoint and its verdict.
    #[must_use]
    pub fn begin(latest: Option<(CheckpointInfo, CheckpointVerdict)>, strict: bool) -> Self {
        let Some((checkpoint, verdict)) = latest else {
            return Self::NoCheckpoint { corrupted: false };
        };
        let mut corrupted = false;
        if checkpoint.has_unreadable_tail() {
            if strict {
                return Self::Failed(TailFailure::CheckpointChainUnreadable {
                    position: checkpoint.channel_position_after_checkpoint,
                });
            }
            corrupted = true;
        }
        match verdict {
            CheckpointVerdict::Valid => Self::ValidCheckpoint {
                checkpoint: Box::new(checkpoint),
                corrupted,
            },
            CheckpointVerdict::Unsupported { version } => {
                Self::Failed(TailFailure::UnsupportedFormat { version })
            }
            CheckpointVerdict::Invalid { .. } if strict => {
                Self::Failed(TailFailure::InvalidCheckpoint {
                    position: checkpoint.transaction_log_position,
                })
            }
            CheckpointVerdict::Invalid { .. } => Self::InvalidCheckpointRetry {
                rejected: Box::new(checkpoint),
                candidates: VecDeque::new(),
                corrupted: true,
            },
        }
    }

    /// Load the older checkpoints to retry with.
    ///
    /// `reachable` is oldest first and ends with the rejected checkpoint,
    /// which is dropped.
    #[must_use]
    pub fn offer_candidates(self, mut reachable: Vec<CheckpointInfo>) -> Self {
        match self {
            Self::InvalidCheckpointRetry {
                rejected,
                corrupted,
                ..
            } => {
                reachable.pop();
                if reachable.is_empty() {
                    return Self::NoCheckpoint { corrupted };
                }
                Self::InvalidCheckpointRetry {
                    rejected,
                    candidates: reachable.into_iter().rev().collect(),
                    corrupted,
                }
            }
            other => other,
        }
    }

    /// Candidate to check next, newest first.
    #[must_use]
    pub fn next_candidate(&self) -> Option<&CheckpointInfo> {
        match self {
            Self::InvalidCheckpointRetry { candidates, .. } => candidates.front(),
            _ => None,
        }
    }

    /// Record the verdict on [`TailState::next_candidate`].
    #[must_use]
    pub fn candidate_checked(self, verdict: &CheckpointVerdict) -> Self {
        match self {
            Self::InvalidCheckpointRetry {
                rejected,
                mut candidates,
                corrupted,
            } => {
                let Some(candidate) = candidates.pop_front() else {
                    return Self::NoCheckpoint { corrupted };
                };
                if *verdict == CheckpointVerdict::Valid {
                    return Self::ValidCheckpoint {
                        checkpoint: Box::new(candidate),
                        corrupted,
                    };
                }
                if candidates.is_empty() {
                    return Self::NoCheckpoint { corrupted };
                }
                Self::InvalidCheckpointRetry {
                    rejected,
                    candidates,
                    corrupted,
                }
            }
            other => other,
        }
    }

    #[must_use]
    pub fn resolved(info: LogTailInformation) -> Self {
        Self::Resolved(Box::new(info))
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Failed(_))
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoCheckpoint { .. } => "NoCheckpoint",
            Self::ValidCheckpoint { .. } => "ValidCheckpoint",
            Self::InvalidCheckpointRetry { .. } => "InvalidCheckpointRetry",
            Self::Resolved(_) => "Resolved",
            Self::Failed(_) => "Failed",
        }
    }
}
