//! Versions, version ranges, and branch identifiers.
//!
//! A [`Version`] names a point in one branch's history. [`VersionRange`] is what gets published
//! about a region's state — `[earliest, latest]` plus a `coherent` flag meaning "no write has
//! been acknowledged past `latest`" (see [`branch_history`](crate::branch_history) for the
//! relational queries used to compare versions across branches).

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Identifies one branch in the branch history's semilattice of write lineages.
///
/// Branches are created when a node starts serving fresh writes for a region (becoming primary
/// with no prior history, or after an operator blesses a divergent branch) — unlike [`PeerId`]
/// (crate::PeerId), which is assigned externally, a branch id is something this node mints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(u64);

impl BranchId {
    /// The distinguished "no writes yet" branch. Every region starts here before any primary has
    /// ever taken a write for it; it is its own ancestor/descendant of nothing.
    pub const ROOT: BranchId = BranchId(0);

    /// Mints a fresh branch id, unique within this process.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BranchId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        BranchId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch-{}", self.0)
    }
}

impl Default for BranchId {
    fn default() -> Self {
        BranchId::ROOT
    }
}

/// A point in one branch's write history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    branch: BranchId,
    sequence: u64,
}

impl Version {
    /// The version before any writes have ever been taken for a region.
    pub const ZERO: Version = Version { branch: BranchId::ROOT, sequence: 0 };

    pub const fn new(branch: BranchId, sequence: u64) -> Self {
        Version { branch, sequence }
    }

    pub const fn branch(self) -> BranchId {
        self.branch
    }

    pub const fn sequence(self) -> u64 {
        self.sequence
    }

    /// The next version on the same branch, e.g. after acknowledging one more write.
    pub fn next(self) -> Version {
        Version { branch: self.branch, sequence: self.sequence + 1 }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.sequence, self.branch)
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::ZERO
    }
}

/// `[earliest, latest]` for a region, with a `coherent` flag meaning no write has been
/// acknowledged past `latest` — i.e. the range is not missing a gap of unknown data between
/// `latest` and whatever comes next.
///
/// A range with `latest == earliest` and `coherent == true` is a clean point-version: the whole
/// region is known to sit at exactly that version with nothing pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionRange {
    earliest: Version,
    latest: Version,
    coherent: bool,
}

impl VersionRange {
    /// A fresh, empty region that has never taken a write: coherent at `Version::ZERO`.
    pub const EMPTY: VersionRange = VersionRange {
        earliest: Version::ZERO,
        latest: Version::ZERO,
        coherent: true,
    };

    pub const fn new(earliest: Version, latest: Version, coherent: bool) -> Self {
        VersionRange { earliest, latest, coherent }
    }

    /// A clean point-version: `earliest == latest == version`, coherent.
    pub const fn point(version: Version) -> Self {
        VersionRange { earliest: version, latest: version, coherent: true }
    }

    pub const fn earliest(self) -> Version {
        self.earliest
    }

    pub const fn latest(self) -> Version {
        self.latest
    }

    pub const fn coherent(self) -> bool {
        self.coherent
    }

    pub const fn is_clean_point(self) -> bool {
        self.coherent && self.earliest.sequence() == self.latest.sequence()
            && self.earliest.branch().raw() == self.latest.branch().raw()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]{}",
            self.earliest,
            self.latest,
            if self.coherent { "" } else { " (incoherent)" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_branch_ids_are_distinct() {
        let a = BranchId::fresh();
        let b = BranchId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn point_version_range_is_clean() {
        let v = Version::new(BranchId::fresh(), 5);
        assert!(VersionRange::point(v).is_clean_point());
    }

    #[test]
    fn incoherent_range_is_not_a_clean_point() {
        let branch = BranchId::fresh();
        let range = VersionRange::new(Version::new(branch, 1), Version::new(branch, 5), false);
        assert!(!range.is_clean_point());
    }
}
