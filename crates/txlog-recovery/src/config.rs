//! Recovery configuration.

use serde::{Deserialize, Serialize};
use txlog_error::{Result, TxLogError};
use txlog_types::FormatVersion;

/// Default number of bytes inspected after the last readable entry.
pub const DEFAULT_TRAILING_CHECK_WINDOW: usize = 12 * 1024;

/// Knobs consumed by tail resolution.
///
/// ```toml
/// fail_on_corrupted_log_files = false
/// accepted_format_versions = ["V3", "V4"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TailScanConfig {
    /// Abort on damaged logs instead of recovering up to the damage.
    pub fail_on_corrupted_log_files: bool,
    /// Checkpoint formats this build accepts.
    pub accepted_format_versions: Vec<FormatVersion>,
    /// Bytes after the last readable entry that must be zero.
    pub trailing_check_window: usize,
}

impl Default for TailScanConfig {
    fn default() -> Self {
        Self {
            fail_on_corrupted_log_files: true,
            accepted_format_versions: FormatVersion::ALL.to_vec(),
            trailing_check_window: DEFAULT_TRAILING_CHECK_WINDOW,
        }
    }
}

impl TailScanConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|err| TxLogError::Config {
            detail: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_fail_on_corrupted_log_files(mut self, fail: bool) -> Self {
        self.fail_on_corrupted_log_files = fail;
        self
    }

    #[must_use]
    pub fn with_accepted_format_versions(mut self, versions: &[FormatVersion]) -> Self {
        self.accepted_format_versions = versions.to_vec();
        self
    }

    #[must_use]
    pub fn with_trailing_check_window(mut self, window: usize) -> Self {
        self.trailing_check_window = window;
        self
    }

    #[must_use]
    pub fn accepts(&self, version: FormatVersion) -> bool {
        self.accepted_format_versions.contains(&version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.accepted_format_versions.is_empty() {
            return Err(TxLogError::Config {
                detail: "accepted_format_versions must not be empty".to_owned(),
            });
        }
        if self.trailing_check_window == 0 {
            return Err(TxLogError::Config {
                detail: "trailing_check_window must be positive".to_owned(),
            });
        }
        Ok(())
    }
}
