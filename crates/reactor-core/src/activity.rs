//! Activities: the reactor's public statement about what it is doing for a region.
//!
//! Each peer's reactor publishes an [`ActivityMap`] — `reactor_activity_id → (region, Activity)`
//! — into the directory. Within one peer, activity regions for the same role never overlap, and
//! their union is exactly the set of regions that peer currently participates in; the safety
//! predicate in [`crate::safety`] depends on this invariant holding for every peer it inspects.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::mailbox::{BackfillerCard, BroadcasterCard, ReplierCard};
use crate::region::Region;
use crate::version::VersionRange;

/// Identifies one entry in a peer's activity map. Allocated fresh by [`crate::entry::DirectoryEntry::set`]
/// every time the underlying sub-state changes in a way observers should treat as a reset (as
/// opposed to [`crate::entry::DirectoryEntry::update_without_changing_id`], which keeps the id for
/// strict refinements).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReactorActivityId(u64);

impl ReactorActivityId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ReactorActivityId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ReactorActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "activity-{}", self.0)
    }
}

/// The tagged state a node publishes about one of its (region, role) pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activity {
    /// Waiting to be elected primary: the directory entry exists, acks have not necessarily been
    /// collected yet.
    PrimaryWhenSafe,
    /// Serving as primary. `replier` is `None` until the listener/replier have come up.
    Primary {
        broadcaster: BroadcasterCard,
        replier: Option<ReplierCard>,
    },
    /// Has data, but no primary is currently visible for this region.
    SecondaryWithoutPrimary {
        current_state: VersionRange,
        backfiller: BackfillerCard,
    },
    /// Backfilled from a primary and serving reads.
    SecondaryUpToDate { backfiller: BackfillerCard },
    /// Will erase local data once it is safe to do so.
    NothingWhenSafe {
        current_state: VersionRange,
        backfiller: BackfillerCard,
    },
    /// Erasing local data; transitional state between `NothingWhenSafe` and `Nothing`.
    NothingWhenDoneErasing,
    /// Terminal: no data, not participating in this region.
    Nothing,
}

impl Activity {
    /// Matches step 3 of `is_safe_for_us_to_be_primary`: variants that mean "this peer is not
    /// competing to be, or already, primary".
    pub fn is_compatible_with_someone_else_becoming_primary(&self) -> bool {
        matches!(
            self,
            Activity::SecondaryWithoutPrimary { .. }
                | Activity::NothingWhenSafe { .. }
                | Activity::Nothing
                | Activity::NothingWhenDoneErasing
        )
    }

    /// The backfiller card offered by this activity, if any — used to seed best-backfiller
    /// candidates (`§4.C`).
    pub fn backfiller(&self) -> Option<BackfillerCard> {
        match self {
            Activity::SecondaryWithoutPrimary { backfiller, .. }
            | Activity::SecondaryUpToDate { backfiller }
            | Activity::NothingWhenSafe { backfiller, .. } => Some(*backfiller),
            _ => None,
        }
    }

    /// The version range this activity is offering to backfill from, if any.
    pub fn offered_version(&self) -> Option<VersionRange> {
        match self {
            Activity::SecondaryWithoutPrimary { current_state, .. }
            | Activity::NothingWhenSafe { current_state, .. } => Some(*current_state),
            _ => None,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Activity::Primary { .. })
    }

    pub fn is_primary_when_safe(&self) -> bool {
        matches!(self, Activity::PrimaryWhenSafe)
    }

    pub fn is_secondary_up_to_date(&self) -> bool {
        matches!(self, Activity::SecondaryUpToDate { .. })
    }

    pub fn broadcaster(&self) -> Option<BroadcasterCard> {
        match self {
            Activity::Primary { broadcaster, .. } => Some(*broadcaster),
            _ => None,
        }
    }
}

/// One peer's full activity map: every (region, role) it is currently participating in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivityMap {
    entries: BTreeMap<ReactorActivityId, (Region, Activity)>,
}

impl ActivityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ReactorActivityId, region: Region, activity: Activity) {
        self.entries.insert(id, (region, activity));
    }

    pub fn remove(&mut self, id: ReactorActivityId) -> Option<(Region, Activity)> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: ReactorActivityId) -> Option<&(Region, Activity)> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReactorActivityId, &(Region, Activity))> {
        self.entries.iter()
    }

    /// All entries whose region intersects `region`, clipped to the overlap.
    pub fn intersecting(&self, region: Region) -> Vec<(Region, &Activity)> {
        self.entries
            .values()
            .filter_map(|(r, activity)| {
                let overlap = r.intersect(region);
                (!overlap.is_empty()).then_some((overlap, activity))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a reactor publishes into its per-peer directory slot: its full activity map plus
/// whatever the directory-echo wrapper needs to stamp a version on it (see
/// [`crate::directory`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReactorBusinessCard {
    pub activity_map: ActivityMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxAddr;
    use crate::PeerId;

    fn card() -> BackfillerCard {
        BackfillerCard { peer: PeerId::from_raw(1), addr: MailboxAddr::from_raw(1) }
    }

    #[test]
    fn fresh_ids_are_strictly_increasing() {
        let a = ReactorActivityId::fresh();
        let b = ReactorActivityId::fresh();
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn nothing_is_compatible_with_primary_election() {
        assert!(Activity::Nothing.is_compatible_with_someone_else_becoming_primary());
        assert!(Activity::PrimaryWhenSafe.is_compatible_with_someone_else_becoming_primary() == false);
    }

    #[test]
    fn secondary_without_primary_offers_its_backfiller() {
        let activity = Activity::SecondaryWithoutPrimary {
            current_state: VersionRange::EMPTY,
            backfiller: card(),
        };
        assert_eq!(activity.backfiller(), Some(card()));
    }

    #[test]
    fn activity_map_intersecting_clips_region() {
        let mut map = ActivityMap::new();
        map.insert(
            ReactorActivityId::fresh(),
            Region::new(0, 50),
            Activity::Nothing,
        );
        let hits = map.intersecting(Region::new(25, 100));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, Region::new(25, 50));
    }
}
