//! Branch history: the convergent (semilattice) graph of write lineages.
//!
//! Every region's data lives on some branch; branches fork when a primary starts serving fresh
//! writes without prior history (or after an operator blesses a divergent branch by hand — see
//! crate docs, conflict resolution is explicitly out of scope here). The reactor only ever reads
//! two relational facts out of this graph and, on `be_primary`, records that a new branch
//! started.

use crate::region::Region;
use crate::version::{BranchId, Version};

/// Read-write access to the branch history semilattice.
///
/// Implementations must merge concurrent `record_branch` calls the way any CRDT does: merging
/// two histories never loses either side's ancestry information. The reactor relies only on
/// [`is_ancestor`](BranchHistory::is_ancestor) and [`is_divergent`](BranchHistory::is_divergent)
/// being consistent with whatever has been merged in so far.
pub trait BranchHistory: Send + Sync {
    /// True iff `v`'s branch is an ancestor of `w`'s branch on `region` (or they are the same
    /// branch). Reflexive: `is_ancestor(v, v, region)` is always true.
    fn is_ancestor(&self, v: Version, w: Version, region: Region) -> bool;

    /// True iff neither `is_ancestor(v, w, region)` nor `is_ancestor(w, v, region)` holds — the
    /// two versions describe conflicting histories for `region` that no automatic merge can
    /// reconcile.
    fn is_divergent(&self, v: Version, w: Version, region: Region) -> bool {
        !self.is_ancestor(v, w, region) && !self.is_ancestor(w, v, region)
    }

    /// Records that `child` forked from `parent` on `region`. Idempotent: recording the same
    /// fork twice is a no-op. Used by `be_primary` when it starts a fresh branch after a
    /// successful safety check.
    fn record_branch(&self, parent: BranchId, child: BranchId, region: Region);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// A minimal in-memory branch history good enough to exercise the trait's default
    /// `is_divergent` method: every branch is either `BranchId::ROOT`, or has a recorded parent.
    #[derive(Default)]
    struct LinearHistory {
        edges: Mutex<HashSet<(u64, u64)>>,
    }

    impl BranchHistory for LinearHistory {
        fn is_ancestor(&self, v: Version, w: Version, _region: Region) -> bool {
            if v.branch() == w.branch() {
                return v.sequence() <= w.sequence();
            }
            let edges = self.edges.lock().unwrap();
            edges.contains(&(v.branch().raw(), w.branch().raw()))
        }

        fn record_branch(&self, parent: BranchId, child: BranchId, _region: Region) {
            self.edges.lock().unwrap().insert((parent.raw(), child.raw()));
        }
    }

    #[test]
    fn same_branch_compares_by_sequence() {
        let history = LinearHistory::default();
        let branch = BranchId::fresh();
        let early = Version::new(branch, 1);
        let late = Version::new(branch, 5);
        assert!(history.is_ancestor(early, late, Region::ALL));
        assert!(!history.is_divergent(early, late, Region::ALL));
    }

    #[test]
    fn unrelated_branches_are_divergent() {
        let history = LinearHistory::default();
        let a = Version::new(BranchId::fresh(), 1);
        let b = Version::new(BranchId::fresh(), 1);
        assert!(history.is_divergent(a, b, Region::ALL));
    }

    #[test]
    fn recorded_fork_makes_child_descend_from_parent() {
        let history = LinearHistory::default();
        let parent = BranchId::fresh();
        let child = BranchId::fresh();
        history.record_branch(parent, child, Region::ALL);
        let v = Version::new(parent, 9);
        let w = Version::new(child, 0);
        assert!(history.is_ancestor(v, w, Region::ALL));
        assert!(!history.is_divergent(v, w, Region::ALL));
    }
}
