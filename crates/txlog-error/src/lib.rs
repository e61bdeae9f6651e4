use thiserror::Error;

/// Primary error type for transaction log recovery.
///
/// Every variant that can stop a store from starting carries enough context
/// (segment version, byte offset) for an operator to locate the damage, and
/// [`TxLogError::suggestion`] supplies the remediation text.
#[derive(Error, Debug)]
pub enum TxLogError {
    // === I/O Errors ===
    /// Underlying storage failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A segment that was listed a moment ago can no longer be opened.
    #[error("transaction log segment with version {version} is missing")]
    MissingSegment { version: u64 },

    // === Format Errors ===
    /// A log or checkpoint uses a format version this build does not accept.
    #[error("unsupported transaction log format version {version}: {context}")]
    UnsupportedFormat { version: u8, context: String },

    /// A position refers to a different segment than the one being read.
    #[error(
        "inconsistent log position: expected segment version {expected_version}, got {actual}"
    )]
    InconsistentPosition {
        expected_version: u64,
        actual: String,
    },

    /// The fixed-size segment header could not be decoded.
    #[error("malformed header in transaction log segment {version}: {detail}")]
    MalformedHeader { version: u64, detail: String },

    // === Corruption Errors ===
    /// A segment holds data that cannot be trusted.
    #[error("transaction log segment {version} is corrupted: {detail}")]
    CorruptedSegment { version: u64, detail: String },

    /// The latest checkpoint points outside the readable transaction log.
    #[error(
        "checkpoint does not point to a valid location in transaction logs: \
         LogPosition{{version={version}, offset={offset}}}. Restore the store from a backup, \
         or start with fail_on_corrupted_log_files = false to recover from the last valid \
         checkpoint and discard everything after it"
    )]
    InvalidCheckpoint { version: u64, offset: u64 },

    /// Undecodable bytes before the end of a segment that is not the newest.
    #[error(
        "Transaction log segment with version {version} has {leftover} unreadable bytes. \
         Was able to read upto {last_readable} but {size} is available."
    )]
    UnreadableTrailingBytes {
        version: u64,
        leftover: u64,
        last_readable: u64,
        size: u64,
    },

    /// Non-zero bytes after the last readable entry of the newest segment.
    #[error(
        "transaction log segment {version} contains data after the last readable entry, \
         first non-zero byte at offset {offset}: {dump}"
    )]
    TrailingGarbage {
        version: u64,
        offset: u64,
        dump: String,
    },

    /// The transaction behind an oldest-format checkpoint cannot be rebuilt.
    #[error(
        "unable to reconstruct the transaction referenced by legacy checkpoint at \
         LogPosition{{version={version}, offset={offset}}}"
    )]
    UnresolvableLegacyTransaction { version: u64, offset: u64 },

    // === Configuration ===
    /// Recovery configuration could not be parsed.
    #[error("invalid recovery configuration: {detail}")]
    Config { detail: String },

    // === Internal ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl TxLogError {
    /// Whether the error reports damaged on-disk data rather than an
    /// environment or usage problem.
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptedSegment { .. }
                | Self::InvalidCheckpoint { .. }
                | Self::UnreadableTrailingBytes { .. }
                | Self::TrailingGarbage { .. }
                | Self::MalformedHeader { .. }
                | Self::UnresolvableLegacyTransaction { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCheckpoint { .. }
            | Self::CorruptedSegment { .. }
            | Self::TrailingGarbage { .. } => Some(
                "Restore from backup, or set fail_on_corrupted_log_files = false to truncate \
                 the log at the last readable entry",
            ),
            Self::UnreadableTrailingBytes { .. } | Self::UnresolvableLegacyTransaction { .. } => {
                Some("Restore from backup; the damaged segment is not the newest one")
            }
            Self::UnsupportedFormat { .. } => {
                Some("Start the store with a release that understands this log format")
            }
            Self::MissingSegment { .. } => {
                Some("Check that no other process removes log segments during startup")
            }
            Self::Config { .. } => Some("Fix the recovery configuration and restart"),
            _ => None,
        }
    }

    /// Create a corrupted-segment error.
    pub fn corrupted(version: u64, detail: impl Into<String>) -> Self {
        Self::CorruptedSegment {
            version,
            detail: detail.into(),
        }
    }

    /// Create a malformed-header error.
    pub fn malformed_header(version: u64, detail: impl Into<String>) -> Self {
        Self::MalformedHeader {
            version,
            detail: detail.into(),
        }
    }

    /// Create an unsupported-format error.
    pub fn unsupported_format(version: u8, context: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            version,
            context: context.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `TxLogError`.
pub type Result<T> = std::result::Result<T, TxLogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_checkpoint_names_position_and_remedy() {
        let err = TxLogError::InvalidCheckpoint {
            version: 3,
            offset: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("checkpoint does not point to a valid location in transaction logs"));
        assert!(msg.contains("LogPosition{version=3, offset=4096}"));
        assert!(msg.contains("fail_on_corrupted_log_files = false"));
        assert!(err.is_corruption());
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn unreadable_trailing_bytes_display() {
        let err = TxLogError::UnreadableTrailingBytes {
            version: 0,
            leftover: 50,
            last_readable: 178,
            size: 228,
        };
        assert_eq!(
            err.to_string(),
            "Transaction log segment with version 0 has 50 unreadable bytes. \
             Was able to read upto 178 but 228 is available."
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: TxLogError = io.into();
        assert!(matches!(err, TxLogError::Io(_)));
        assert!(!err.is_corruption());
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn helper_constructors() {
        let err = TxLogError::corrupted(7, "checksum mismatch");
        assert_eq!(
            err.to_string(),
            "transaction log segment 7 is corrupted: checksum mismatch"
        );
        let err = TxLogError::unsupported_format(9, "checkpoint entry");
        assert_eq!(
            err.to_string(),
            "unsupported transaction log format version 9: checkpoint entry"
        );
        assert!(matches!(
            TxLogError::internal("boom"),
            TxLogError::Internal(ref m) if m == "boom"
        ));
    }
}
