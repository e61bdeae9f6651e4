//! Verifies what follows the last readable entry of a segment.
//!
//! Pre-allocated segments are zero filled, so after the last entry only zeros
//! are expected. Anything else is damage: fatal when it sits in a segment that
//! is not the newest, and fatal or flagged in the newest one depending on
//! `fail_on_corrupted_log_files`.

use std::fmt::Write as _;

use tracing::{error, warn};
use txlog_error::{Result, TxLogError};
use txlog_segment::SegmentStore;

use crate::config::TailScanConfig;

/// Bytes rendered around the first non-zero byte in diagnostics.
const DUMP_BYTES: usize = 32;

/// Non-zero data found after the last readable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingGarbage {
    /// Absolute offset of the first non-zero byte.
    pub offset: u64,
    /// Hex and printable rendering starting at `offset`.
    pub dump: String,
}

/// Inspect `bytes`, which start at absolute offset `base`.
#[must_use]
pub fn inspect_trailing_bytes(bytes: &[u8], base: u64) -> Option<TrailingGarbage> {
    let index = bytes.iter().position(|b| *b != 0)?;
    let end = (index + DUMP_BYTES).min(bytes.len());
    Some(TrailingGarbage {
        offset: base + index as u64,
        dump: printable_dump(&bytes[index..end]),
    })
}

/// `"0a 41 ff | .A."`
#[must_use]
pub fn printable_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out.push_str(" | ");
    out.extend(bytes.iter().map(|b| {
        if b.is_ascii_graphic() || *b == b' ' {
            char::from(*b)
        } else {
            '.'
        }
    }));
    out
}

/// Read up to `window` bytes after `from` and report the first non-zero one.
pub fn find_trailing_garbage(
    store: &dyn SegmentStore,
    version: u64,
    from: u64,
    window: usize,
) -> Result<Option<TrailingGarbage>> {
    let mut channel = store.open_for_version(version)?;
    let size = channel.size()?;
    if size <= from {
        return Ok(None);
    }
    let len = window.min((size - from) as usize);
    let mut buf = vec![0_u8; len];
    let n = channel.read_at(from, &mut buf)?;
    Ok(inspect_trailing_bytes(&buf[..n], from))
}

/// Check the bytes after `last_readable` in segment `version`.
///
/// Returns `true` when damage was found and tolerated.
pub fn verify_trailing_bytes(
    store: &dyn SegmentStore,
    version: u64,
    last_readable: u64,
    is_newest: bool,
    config: &TailScanConfig,
) -> Result<bool> {
    let Some(size) = store.segment_size(version)? else {
        return Ok(false);
    };
    let leftover = size.saturating_sub(last_readable);
    if leftover == 0 {
        return Ok(false);
    }

    if !is_newest {
        error!(
            version,
            leftover, last_readable, size, "unreadable bytes before the end of an older segment"
        );
        return Err(TxLogError::UnreadableTrailingBytes {
            version,
            leftover,
            last_readable,
            size,
        });
    }

    let Some(garbage) =
        find_trailing_garbage(store, version, last_readable, config.trailing_check_window)?
    else {
        return Ok(false);
    };

    if config.fail_on_corrupted_log_files {
        error!(
            version,
            offset = garbage.offset,
            dump = %garbage.dump,
            "data after the last readable entry"
        );
        return Err(TxLogError::TrailingGarbage {
            version,
            offset: garbage.offset,
            dump: garbage.dump,
        });
    }
    warn!(
        version,
        offset = garbage.offset,
        last_readable,
        "data after the last readable entry; log will be truncated at the last readable entry"
    );
    Ok(true)
}
