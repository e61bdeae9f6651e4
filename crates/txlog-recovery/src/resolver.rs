//! The tail resolution algorithm.
//!
//! Drives [`TailState`] to a terminal state, performing the I/O each state
//! asks for: checking checkpoints against the transaction chain, scanning
//! forward from the chosen start and verifying the bytes after the last
//! readable entry.

use tracing::{debug, error, warn};
use txlog_error::Result;
use txlog_segment::{LogEntry, SegmentHeader, SegmentStore};
use txlog_types::{
    AppendBatchInfo, CheckpointInfo, LogPosition, LogTailInformation, NO_TRANSACTION_ID,
    StoreCompatibility, UNKNOWN_APPEND_INDEX,
};

use crate::backfill::{BackfillOutcome, backfill_append_index};
use crate::chain::ChainReader;
use crate::config::TailScanConfig;
use crate::scanner::CheckpointScanner;
use crate::state::{CheckpointVerdict, TailState};
use crate::trailing::verify_trailing_bytes;

/// First entries found after the scan start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FirstEntries {
    start_append_index: Option<i64>,
    terminator_tx_id: Option<i64>,
}

impl FirstEntries {
    const fn found(&self) -> bool {
        self.start_append_index.is_some() || self.terminator_tx_id.is_some()
    }

    const fn complete(&self) -> bool {
        self.start_append_index.is_some() && self.terminator_tx_id.is_some()
    }

    fn transaction_id(&self) -> i64 {
        self.start_append_index
            .or(self.terminator_tx_id)
            .unwrap_or(NO_TRANSACTION_ID)
    }
}

/// One resolution run over borrowed collaborators.
#[derive(Debug, Clone, Copy)]
pub struct TailResolver<'a> {
    transactions: &'a dyn SegmentStore,
    scanner: &'a dyn CheckpointScanner,
    compatibility: &'a dyn StoreCompatibility,
    config: &'a TailScanConfig,
}

impl<'a> TailResolver<'a> {
    #[must_use]
    pub const fn new(
        transactions: &'a dyn SegmentStore,
        scanner: &'a dyn CheckpointScanner,
        compatibility: &'a dyn StoreCompatibility,
        config: &'a TailScanConfig,
    ) -> Self {
        Self {
            transactions,
            scanner,
            compatibility,
            config,
        }
    }

    pub fn resolve(&self) -> Result<LogTailInformation> {
        self.run()
            .inspect_err(|err| error!(%err, "log tail resolution failed"))
    }

    fn run(&self) -> Result<LogTailInformation> {
        let strict = self.config.fail_on_corrupted_log_files;
        let checkpoint_damage = match self.scanner.header_damage()? {
            Some(err) if strict => return Err(err),
            Some(err) => {
                warn!(
                    %err,
                    "segment with unreadable header skipped while scanning for checkpoints"
                );
                true
            }
            None => false,
        };
        let latest = match self.scanner.latest_checkpoint()? {
            Some(checkpoint) => {
                let verdict = self.check(&checkpoint)?;
                if let CheckpointVerdict::Invalid { reason } = &verdict {
                    warn!(
                        position = %checkpoint.transaction_log_position,
                        reason = reason.as_str(),
                        "latest checkpoint does not point to a valid location"
                    );
                }
                Some((checkpoint, verdict))
            }
            None => None,
        };
        let chain_unreadable = latest
            .as_ref()
            .is_some_and(|(checkpoint, _)| checkpoint.has_unreadable_tail());
        if chain_unreadable {
            warn!("checkpoint chain has data after its last readable checkpoint");
        }

        let mut state = TailState::begin(latest, strict);
        loop {
            debug!(
                state = state.name(),
                terminal = state.is_terminal(),
                "tail resolution step"
            );
            state = match state {
                TailState::NoCheckpoint { corrupted } => TailState::resolved(
                    self.scan_without_checkpoint(corrupted || checkpoint_damage, chain_unreadable)?,
                ),
                TailState::ValidCheckpoint {
                    checkpoint,
                    corrupted,
                } => TailState::resolved(self.scan_from_checkpoint(
                    *checkpoint,
                    corrupted || checkpoint_damage,
                    chain_unreadable,
                )?),
                s @ TailState::InvalidCheckpointRetry { .. } => match s.next_candidate() {
                    None => s.offer_candidates(self.scanner.reachable_checkpoints()?),
                    Some(candidate) => {
                        let verdict = self.check(candidate)?;
                        if verdict != CheckpointVerdict::Valid {
                            warn!(
                                position = %candidate.transaction_log_position,
                                ?verdict,
                                "older checkpoint rejected"
                            );
                        }
                        s.candidate_checked(&verdict)
                    }
                },
                TailState::Resolved(info) => {
                    debug!(
                        records_after_checkpoint = info.records_after_checkpoint,
                        last_transaction_id = info.last_transaction_id,
                        corrupted = info.corrupted,
                        "log tail resolved"
                    );
                    return Ok(*info);
                }
                TailState::Failed(failure) => return Err(failure.into_error()),
            };
        }
    }

    /// Whether `checkpoint` points at an existing, compatible place in the
    /// transaction chain.
    pub fn check(&self, checkpoint: &CheckpointInfo) -> Result<CheckpointVerdict> {
        if !self.config.accepts(checkpoint.format_version) {
            return Ok(CheckpointVerdict::Unsupported {
                version: checkpoint.format_version_byte,
            });
        }
        let position = checkpoint.transaction_log_position;
        let version = position.segment_version;
        let Some(size) = self.transactions.segment_size(version)? else {
            return Ok(invalid(format!("segment {version} does not exist")));
        };
        if size < position.byte_offset {
            return Ok(invalid(format!(
                "offset {} is beyond segment size {size}",
                position.byte_offset
            )));
        }
        let header = match self.transactions.extract_header(version) {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(invalid(format!("segment {version} has no header"))),
            Err(err) if err.is_corruption() => return Ok(invalid(err.to_string())),
            Err(err) => return Err(err),
        };
        if !self
            .compatibility
            .compatible(&header.store_id, &checkpoint.store_id)
        {
            return Ok(invalid(format!(
                "segment {version} belongs to store {}, checkpoint to {}",
                header.store_id, checkpoint.store_id
            )));
        }
        Ok(CheckpointVerdict::Valid)
    }

    fn scan_from_checkpoint(
        &self,
        checkpoint: CheckpointInfo,
        corrupted: bool,
        chain_unreadable: bool,
    ) -> Result<LogTailInformation> {
        let start = checkpoint.transaction_log_position;
        let first = self.first_entries(start)?;
        let backfill = backfill_append_index(self.transactions, start, checkpoint.append_index)?;
        self.assemble(Some(checkpoint), first, backfill, corrupted, chain_unreadable)
    }

    fn scan_without_checkpoint(
        &self,
        mut corrupted: bool,
        chain_unreadable: bool,
    ) -> Result<LogTailInformation> {
        let Some(lowest) = self.transactions.lowest_version()? else {
            debug!("transaction log chain is empty");
            return Ok(LogTailInformation {
                corrupted,
                checkpoint_chain_unreadable: chain_unreadable,
                ..LogTailInformation::empty()
            });
        };
        let Some(header) = self.segment_header(lowest, &mut corrupted)? else {
            debug!(segment_version = lowest, "oldest segment has no header yet");
            let highest = self.transactions.highest_version()?.unwrap_or(lowest);
            return Ok(LogTailInformation {
                log_chain_empty: false,
                highest_segment_version: highest,
                corrupted,
                checkpoint_chain_unreadable: chain_unreadable,
                ..LogTailInformation::empty()
            });
        };
        let start = header.start_position();
        let first = self.first_entries(start)?;
        let backfill = backfill_append_index(self.transactions, start, UNKNOWN_APPEND_INDEX)?;
        self.assemble(None, first, backfill, corrupted, chain_unreadable)
    }

    /// First start and first terminator at or after `start`.
    fn first_entries(&self, start: LogPosition) -> Result<FirstEntries> {
        let mut first = FirstEntries::default();
        let mut chain = ChainReader::open(self.transactions, start)?;
        while let Some(positioned) = chain.next_entry()? {
            match positioned.entry {
                LogEntry::Start(start) if first.start_append_index.is_none() => {
                    first.start_append_index = Some(start.append_index);
                }
                LogEntry::Commit(commit) if first.terminator_tx_id.is_none() => {
                    first.terminator_tx_id = Some(commit.tx_id);
                }
                LogEntry::ChunkEnd(chunk) if first.terminator_tx_id.is_none() => {
                    first.terminator_tx_id = Some(chunk.tx_id);
                }
                _ => {}
            }
            if first.complete() {
                break;
            }
        }
        Ok(first)
    }

    fn assemble(
        &self,
        checkpoint: Option<CheckpointInfo>,
        first: FirstEntries,
        backfill: BackfillOutcome,
        mut corrupted: bool,
        chain_unreadable: bool,
    ) -> Result<LogTailInformation> {
        let highest = self.transactions.highest_version()?;
        let scan_end = backfill.scan_end;
        let is_newest = highest == Some(scan_end.segment_version);
        if verify_trailing_bytes(
            self.transactions,
            scan_end.segment_version,
            scan_end.byte_offset,
            is_newest,
            self.config,
        )? {
            corrupted = true;
        }
        if let Some(version) = backfill.damaged_header {
            self.segment_header(version, &mut corrupted)?;
        }

        let newest_header = match highest {
            Some(version) if backfill.damaged_header != Some(version) => {
                self.segment_header(version, &mut corrupted)?
            }
            _ => None,
        };
        if corrupted {
            warn!(%scan_end, "transaction log tail is corrupted, recovery will truncate it");
        }

        let store_id = newest_header
            .as_ref()
            .map(|header| header.store_id.clone())
            .or_else(|| checkpoint.as_ref().map(|cp| cp.store_id.clone()));
        let newest_entry_format_version = backfill
            .last_entry_format
            .or_else(|| newest_header.as_ref().map(|header| header.format_version));
        let last_batch = if highest.is_some() {
            backfill.batch
        } else {
            AppendBatchInfo::EMPTY
        };

        Ok(LogTailInformation {
            records_after_checkpoint: first.found(),
            last_transaction_id: first.transaction_id(),
            last_checkpoint: checkpoint,
            log_chain_empty: highest.is_none(),
            highest_segment_version: highest.unwrap_or(0),
            newest_entry_format_version,
            store_id,
            corrupted,
            checkpoint_chain_unreadable: chain_unreadable,
            last_batch,
        })
    }

    /// Header of a transaction segment. An unreadable header is fatal in
    /// strict mode and flags `corrupted` otherwise.
    fn segment_header(&self, version: u64, corrupted: &mut bool) -> Result<Option<SegmentHeader>> {
        match self.transactions.extract_header(version) {
            Ok(header) => Ok(header),
            Err(err) if err.is_corruption() && !self.config.fail_on_corrupted_log_files => {
                warn!(segment_version = version, %err, "transaction segment header is unreadable");
                *corrupted = true;
                Ok(None)
            }
            Err(err) => {
                error!(segment_version = version, %err, "transaction segment header is unreadable");
                Err(err)
            }
        }
    }
}

fn invalid(reason: String) -> CheckpointVerdict {
    CheckpointVerdict::Invalid { reason }
}
