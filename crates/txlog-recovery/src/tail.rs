//! The service startup asks for the log tail.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use txlog_error::Result;
use txlog_segment::SegmentStore;
use txlog_types::{CheckpointInfo, LogTailInformation, StoreCompatibility, UpgradeSuccessor};

use crate::config::TailScanConfig;
use crate::resolver::TailResolver;
use crate::scanner::{CheckpointScanner, CompositeCheckpointScanner};

/// Resolves the log tail once and hands out the cached answer afterwards.
///
/// Concurrent first calls serialize on the cache lock, so the chain is
/// scanned at most once per successful resolution. Failures are not cached.
#[derive(Debug)]
pub struct LogTailService {
    transactions: Arc<dyn SegmentStore>,
    scanner: Box<dyn CheckpointScanner>,
    compatibility: Arc<dyn StoreCompatibility>,
    config: TailScanConfig,
    tail: Mutex<Option<Arc<LogTailInformation>>>,
}

impl LogTailService {
    /// Service over a transaction chain and its dedicated checkpoint chain,
    /// also honouring inline checkpoints of the oldest formats.
    #[must_use]
    pub fn new(
        transactions: Arc<dyn SegmentStore>,
        checkpoints: Arc<dyn SegmentStore>,
        config: TailScanConfig,
    ) -> Self {
        let scanner = CompositeCheckpointScanner::new(
            Arc::clone(&transactions),
            checkpoints,
            config.trailing_check_window,
        );
        Self::with_scanner(transactions, Box::new(scanner), config)
    }

    #[must_use]
    pub fn with_scanner(
        transactions: Arc<dyn SegmentStore>,
        scanner: Box<dyn CheckpointScanner>,
        config: TailScanConfig,
    ) -> Self {
        Self {
            transactions,
            scanner,
            compatibility: Arc::new(UpgradeSuccessor),
            config,
            tail: Mutex::new(None),
        }
    }

    /// Replace the store-identity relation used to validate checkpoints.
    #[must_use]
    pub fn with_compatibility(mut self, compatibility: Arc<dyn StoreCompatibility>) -> Self {
        self.compatibility = compatibility;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &TailScanConfig {
        &self.config
    }

    /// The log tail, computed on first use.
    pub fn get_tail_metadata(&self) -> Result<Arc<LogTailInformation>> {
        let mut tail = self.tail.lock();
        if let Some(info) = tail.as_ref() {
            return Ok(Arc::clone(info));
        }
        let info = Arc::new(
            TailResolver::new(
                self.transactions.as_ref(),
                self.scanner.as_ref(),
                self.compatibility.as_ref(),
                &self.config,
            )
            .resolve()?,
        );
        debug!(
            last_transaction_id = info.last_transaction_id,
            highest_segment_version = info.highest_segment_version,
            "log tail cached"
        );
        *tail = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Whether the tail has been computed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.tail.lock().is_some()
    }

    /// Newest checkpoint, read directly from the segments.
    pub fn find_latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        self.scanner.latest_checkpoint()
    }

    /// All checkpoints, oldest first.
    pub fn reachable_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        self.scanner.reachable_checkpoints()
    }
}
