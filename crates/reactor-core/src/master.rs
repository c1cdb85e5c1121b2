//! The shared master directory: a cluster-wide registry of currently-active primaries.
//!
//! Contributed to only while a region's runner actually holds the primary role — the reactor's
//! own per-peer directory (see [`crate::directory`]) tracks *this node's* activities; the master
//! directory is the cross-cutting view an external collaborator (e.g. a query router) consults to
//! find whoever is primary for a region, independent of which peer that happens to be.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::mailbox::BroadcasterCard;
use crate::region::Region;

/// Identifies one entry in the master directory. Minted fresh each time a runner becomes primary,
/// mirroring [`crate::activity::ReactorActivityId`]'s allocation discipline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MasterId(u64);

impl MasterId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        MasterId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MasterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "master-{}", self.0)
    }
}

/// What a newly-elected primary contributes to the master directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MasterBusinessCard {
    pub region: Region,
    pub broadcaster: BroadcasterCard,
}

/// The writable slot of the shared master directory — an external collaborator (§6 construction
/// parameters: "a writable view of the master directory").
#[async_trait]
pub trait MasterDirectory: Send + Sync {
    fn publish(&self, id: MasterId, card: MasterBusinessCard);
    fn retract(&self, id: MasterId);
}
