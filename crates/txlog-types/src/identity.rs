use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the store that wrote a segment.
///
/// Stamped into every segment header and every dedicated checkpoint so that
/// recovery never replays a log written by a different store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreIdentity {
    pub creation_time: i64,
    pub random: i64,
    pub storage_engine: String,
    pub format_family: String,
    pub major_version: u16,
    pub minor_version: u16,
}

impl StoreIdentity {
    #[must_use]
    pub fn new(
        creation_time: i64,
        random: i64,
        storage_engine: impl Into<String>,
        format_family: impl Into<String>,
        major_version: u16,
        minor_version: u16,
    ) -> Self {
        Self {
            creation_time,
            random,
            storage_engine: storage_engine.into(),
            format_family: format_family.into(),
            major_version,
            minor_version,
        }
    }

    /// Whether both identities describe the same store lineage, ignoring the
    /// store format version.
    #[must_use]
    pub fn same_lineage(&self, other: &Self) -> bool {
        self.creation_time == other.creation_time
            && self.random == other.random
            && self.storage_engine == other.storage_engine
            && self.format_family == other.format_family
    }
}

impl fmt::Display for StoreIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreIdentity{{creation_time={}, random={}, {}/{} {}.{}}}",
            self.creation_time,
            self.random,
            self.storage_engine,
            self.format_family,
            self.major_version,
            self.minor_version
        )
    }
}

/// Relation deciding whether a segment written under one identity may be
/// read by a store carrying another.
pub trait StoreCompatibility: Send + Sync + fmt::Debug {
    /// `true` when `newer` is `older` itself or a store produced by upgrading it.
    fn is_same_or_upgrade_successor(&self, older: &StoreIdentity, newer: &StoreIdentity) -> bool;

    /// Equality or the upgrade relation in either direction.
    fn compatible(&self, a: &StoreIdentity, b: &StoreIdentity) -> bool {
        a == b || self.is_same_or_upgrade_successor(a, b) || self.is_same_or_upgrade_successor(b, a)
    }
}

/// Same lineage and a store format version that did not go backwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpgradeSuccessor;

impl StoreCompatibility for UpgradeSuccessor {
    fn is_same_or_upgrade_successor(&self, older: &StoreIdentity, newer: &StoreIdentity) -> bool {
        older.same_lineage(newer)
            && (newer.major_version, newer.minor_version)
                >= (older.major_version, older.minor_version)
    }
}

/// Only byte-identical identities are compatible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl StoreCompatibility for ExactMatch {
    fn is_same_or_upgrade_successor(&self, older: &StoreIdentity, newer: &StoreIdentity) -> bool {
        older == newer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(major: u16, minor: u16) -> StoreIdentity {
        StoreIdentity::new(1, 2, "engine-1", "format-1", major, minor)
    }

    #[test]
    fn upgrade_successor_accepts_newer_minor() {
        let relation = UpgradeSuccessor;
        assert!(relation.is_same_or_upgrade_successor(&store(3, 4), &store(3, 5)));
        assert!(relation.is_same_or_upgrade_successor(&store(3, 4), &store(4, 0)));
        assert!(!relation.is_same_or_upgrade_successor(&store(3, 5), &store(3, 4)));
    }

    #[test]
    fn compatible_is_symmetric() {
        let relation = UpgradeSuccessor;
        assert!(relation.compatible(&store(3, 5), &store(3, 4)));
        assert!(relation.compatible(&store(3, 4), &store(3, 5)));
    }

    #[test]
    fn different_lineage_is_incompatible() {
        let relation = UpgradeSuccessor;
        let other = StoreIdentity::new(9, 2, "engine-1", "format-1", 3, 4);
        assert!(!relation.compatible(&store(3, 4), &other));
        let other_engine = StoreIdentity::new(1, 2, "engine-2", "format-1", 3, 4);
        assert!(!relation.compatible(&store(3, 4), &other_engine));
    }

    #[test]
    fn exact_match_rejects_upgrades() {
        assert!(ExactMatch.compatible(&store(3, 4), &store(3, 4)));
        assert!(!ExactMatch.compatible(&store(3, 4), &store(3, 5)));
    }
}
