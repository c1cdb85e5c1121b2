//! The gossiped directory: consumed as an external interface (§6), wrapped by the reactor's own
//! directory-echo access (component A of SPEC_FULL.md §2).
//!
//! The gossip layer itself — propagation, watchability, per-peer ack tracking — is out of scope
//! for this crate (§1); [`Directory`] is the narrow trait this crate depends on to get that
//! behavior from an embedder. Everything else in this module (`DirectoryEchoAccess`,
//! `run_until_satisfied`, the lens functions at the bottom) is the reactor's own logic, built on
//! top of that trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::activity::{Activity, ActivityMap, ReactorActivityId, ReactorBusinessCard};
use crate::blueprint::Blueprint;
use crate::branch_history::BranchHistory;
use crate::error::{ReactorError, ReactorResult};
use crate::interruptor::Interruptor;
use crate::mailbox::{BackfillerCard, BroadcasterCard};
use crate::region::Region;
use crate::version::VersionRange;
use crate::PeerId;

/// Monotonically increasing per-peer logical timestamp stamped on every publish.
pub type EchoVersion = u64;

/// A point-in-time view across every peer's directory slot.
#[derive(Clone, Debug, Default)]
pub struct DirectorySnapshot {
    peers: BTreeMap<PeerId, Option<ReactorBusinessCard>>,
}

impl DirectorySnapshot {
    pub fn new(peers: BTreeMap<PeerId, Option<ReactorBusinessCard>>) -> Self {
        DirectorySnapshot { peers }
    }

    pub fn card(&self, peer: PeerId) -> Option<&ReactorBusinessCard> {
        self.peers.get(&peer).and_then(|card| card.as_ref())
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &Option<ReactorBusinessCard>)> {
        self.peers.iter()
    }
}

/// The writable-per-peer, fully-readable cross-peer directory. An external collaborator: this
/// crate's `testkit` module provides an in-memory implementation good enough for tests; real
/// deployments back it with an actual gossip protocol.
#[async_trait]
pub trait Directory: Send + Sync {
    fn me(&self) -> PeerId;

    /// Atomically updates this node's activity map entry for `id` and returns the new echo
    /// version. Versions are per-publisher monotonic.
    fn publish(&self, id: ReactorActivityId, region: Region, activity: Activity) -> EchoVersion;

    /// Removes the entry for `id` from this node's activity map.
    fn retract(&self, id: ReactorActivityId) -> EchoVersion;

    /// A consistent snapshot across every peer's slot.
    fn snapshot(&self) -> DirectorySnapshot;

    /// Suspends until the next directory mutation (from any peer, including ourselves).
    async fn changed(&self);

    /// The most recent echo version of *our* slot that `peer` has observed, or `0` if `peer` has
    /// never observed anything from us. Provided by the gossip layer, which is in the best
    /// position to know what it has propagated and had acknowledged.
    fn acked_version(&self, peer: PeerId) -> EchoVersion;
}

/// The reactor's own wrapper over [`Directory`] — component A of SPEC_FULL.md §2.
#[derive(Clone)]
pub struct DirectoryEchoAccess {
    directory: Arc<dyn Directory>,
}

impl std::fmt::Debug for DirectoryEchoAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryEchoAccess").field("me", &self.directory.me()).finish_non_exhaustive()
    }
}

impl DirectoryEchoAccess {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        DirectoryEchoAccess { directory }
    }

    pub fn me(&self) -> PeerId {
        self.directory.me()
    }

    /// The underlying shared directory handle, for constructing a [`crate::entry::DirectoryEntry`].
    pub fn handle(&self) -> Arc<dyn Directory> {
        self.directory.clone()
    }

    pub fn publish(&self, id: ReactorActivityId, region: Region, activity: Activity) -> EchoVersion {
        trace!(activity_id = %id, %region, "publishing activity");
        self.directory.publish(id, region, activity)
    }

    pub fn retract(&self, id: ReactorActivityId) -> EchoVersion {
        trace!(activity_id = %id, "retracting activity");
        self.directory.retract(id)
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        self.directory.snapshot()
    }

    /// Suspends the caller until `predicate(snapshot)` returns `Some`, re-evaluating on every
    /// directory change, or fails with `Interrupted` if `interruptor` fires first.
    ///
    /// `predicate` must be pure over the snapshot it is given and idempotent under repeated
    /// calls — it may be invoked any number of times, including after it has already returned
    /// `Some` once during a previous, superseded evaluation.
    pub async fn run_until_satisfied<T>(
        &self,
        mut predicate: impl FnMut(&DirectorySnapshot) -> Option<T> + Send,
        interruptor: &Interruptor,
    ) -> ReactorResult<T> {
        loop {
            let snapshot = self.directory.snapshot();
            if let Some(value) = predicate(&snapshot) {
                return Ok(value);
            }
            interruptor.race(self.directory.changed()).await?;
        }
    }

    /// Returns once every peer in `connected_peers` has observed echo version `>= version` from
    /// us. Peers that disconnect are dropped from consideration on the next re-evaluation — a
    /// peer is only ever waited on while it remains in the connectivity service's live set (see
    /// SPEC_FULL.md §9 on the open question of peers dropping mid-wait).
    ///
    /// Re-evaluates at least once every `stall_timeout` even if no directory change notification
    /// arrives, so a peer that disconnects without the connectivity service ever publishing a
    /// directory mutation is still dropped from `pending` in bounded time rather than stalling
    /// the wait forever.
    pub async fn wait_for_directory_acks(
        &self,
        version: EchoVersion,
        connected_peers: impl Fn() -> Vec<PeerId> + Send,
        stall_timeout: std::time::Duration,
        interruptor: &Interruptor,
    ) -> ReactorResult<()> {
        loop {
            let pending: Vec<PeerId> = connected_peers()
                .into_iter()
                .filter(|peer| self.directory.acked_version(*peer) < version)
                .collect();
            if pending.is_empty() {
                return Ok(());
            }
            trace!(?pending, version, "waiting for directory acks");
            interruptor
                .race(async {
                    let _ = tokio::time::timeout(stall_timeout, self.directory.changed()).await;
                })
                .await?;
        }
    }
}

/// Looks up a single activity by peer and activity id — the Rust equivalent of the original's
/// `boost::optional`-shaped directory lenses (SPEC_FULL.md §9). Callers always handle `None`.
pub fn lookup_activity<'a>(
    snapshot: &'a DirectorySnapshot,
    peer: PeerId,
    id: ReactorActivityId,
) -> Option<&'a Activity> {
    snapshot
        .card(peer)?
        .activity_map
        .get(id)
        .map(|(_, activity)| activity)
}

/// All of `peer`'s activities intersecting `region`, or `None` if `peer` has no published card
/// at all (as opposed to a card with zero overlapping activities, which is `Some(vec![])`).
pub fn intersecting_activities<'a>(
    snapshot: &'a DirectorySnapshot,
    peer: PeerId,
    region: Region,
) -> Option<Vec<(Region, &'a Activity)>> {
    Some(snapshot.card(peer)?.activity_map.intersecting(region))
}

/// Finds a broadcaster card for `region` among the peers the blueprint assigns a role over it,
/// picking the lowest [`PeerId`] if more than one peer happens to advertise one (per the open
/// question resolved in SPEC_FULL.md §9: deterministic tie-break for testability).
pub fn find_broadcaster(
    snapshot: &DirectorySnapshot,
    blueprint: &Blueprint,
    region: Region,
) -> Option<BroadcasterCard> {
    let mut candidates: Vec<(PeerId, BroadcasterCard)> = blueprint
        .peers()
        .filter_map(|&peer| {
            let card = intersecting_activities(snapshot, peer, region)?;
            card.into_iter().find_map(|(r, activity)| {
                (r == region).then(|| activity.broadcaster()).flatten().map(|b| (peer, b))
            })
        })
        .collect();
    candidates.sort_by_key(|(peer, _)| *peer);
    candidates.into_iter().next().map(|(_, card)| card)
}

/// Finds a usable, branch-coherent backfiller card for `region`: any peer whose activity offers
/// one, preferring the lowest `PeerId`, excluding peers whose offered version has diverged from
/// `our_state` per `history` (SPEC_FULL.md §4.E.2 step 2: "whose branch is consistent with our
/// own, via branch history").
///
/// A peer's activity may offer a backfiller card with no version alongside it (`secondary_up_to_date`
/// carries only a `backfiller_card`, never a `current_state` — see `Activity::offered_version`);
/// such candidates cannot be checked for divergence and are accepted as-is, since only a peer that
/// itself already passed a safety check could have reached `secondary_up_to_date`.
pub fn find_backfiller(
    snapshot: &DirectorySnapshot,
    blueprint: &Blueprint,
    region: Region,
    history: &dyn BranchHistory,
    our_state: VersionRange,
) -> Option<BackfillerCard> {
    let mut candidates: Vec<(PeerId, BackfillerCard)> = blueprint
        .peers()
        .filter_map(|&peer| {
            let activities = intersecting_activities(snapshot, peer, region)?;
            activities.into_iter().find_map(|(r, activity)| {
                if r != region {
                    return None;
                }
                let backfiller = activity.backfiller()?;
                if let Some(offered) = activity.offered_version() {
                    if history.is_divergent(our_state.latest(), offered.latest(), region) {
                        return None;
                    }
                }
                Some(backfiller)
            }).map(|b| (peer, b))
        })
        .collect();
    candidates.sort_by_key(|(peer, _)| *peer);
    candidates.into_iter().next().map(|(_, card)| card)
}

/// Asserts, per safety-predicate step 2, that one peer's activities over `region` neither gap nor
/// overlap. Overlap is a programmer-error condition (SPEC_FULL.md §4.D item 2): it must abort the
/// process rather than be handled as a recoverable error.
pub fn assert_no_overlap(peer: PeerId, activities: &[(Region, &Activity)]) -> ReactorResult<()> {
    for i in 0..activities.len() {
        for j in (i + 1)..activities.len() {
            if activities[i].0.overlaps(activities[j].0) {
                tracing::error!(
                    %peer,
                    region_a = %activities[i].0,
                    region_b = %activities[j].0,
                    "overlap invariant violated"
                );
                return Err(ReactorError::ProgrammerError(
                    "peer published overlapping activity regions for the same role",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxAddr;

    fn business_card(entries: Vec<(ReactorActivityId, Region, Activity)>) -> ReactorBusinessCard {
        let mut map = ActivityMap::new();
        for (id, region, activity) in entries {
            map.insert(id, region, activity);
        }
        ReactorBusinessCard { activity_map: map }
    }

    #[test]
    fn lookup_activity_returns_none_when_peer_absent() {
        let snapshot = DirectorySnapshot::new(BTreeMap::new());
        assert!(lookup_activity(&snapshot, PeerId::from_raw(1), ReactorActivityId::fresh()).is_none());
    }

    #[test]
    fn lookup_activity_finds_published_entry() {
        let id = ReactorActivityId::fresh();
        let peer = PeerId::from_raw(1);
        let card = business_card(vec![(id, Region::new(0, 10), Activity::Nothing)]);
        let mut peers = BTreeMap::new();
        peers.insert(peer, Some(card));
        let snapshot = DirectorySnapshot::new(peers);
        assert_eq!(lookup_activity(&snapshot, peer, id), Some(&Activity::Nothing));
    }

    #[test]
    fn assert_no_overlap_detects_overlap() {
        let a = Activity::Nothing;
        let b = Activity::Nothing;
        let activities = vec![(Region::new(0, 10), &a), (Region::new(5, 15), &b)];
        assert!(assert_no_overlap(PeerId::from_raw(1), &activities).is_err());
    }

    #[test]
    fn assert_no_overlap_accepts_disjoint_regions() {
        let a = Activity::Nothing;
        let b = Activity::Nothing;
        let activities = vec![(Region::new(0, 10), &a), (Region::new(10, 20), &b)];
        assert!(assert_no_overlap(PeerId::from_raw(1), &activities).is_ok());
    }

    #[test]
    fn find_broadcaster_prefers_lowest_peer_id() {
        use crate::blueprint::{Blueprint, PeerRoles, Role};
        use std::collections::BTreeMap as Map;

        let region = Region::new(0, 10);
        let low = PeerId::from_raw(1);
        let high = PeerId::from_raw(2);
        let broadcaster_low = BroadcasterCard { peer: low, addr: MailboxAddr::from_raw(1) };
        let broadcaster_high = BroadcasterCard { peer: high, addr: MailboxAddr::from_raw(2) };

        let card_low = business_card(vec![(
            ReactorActivityId::fresh(),
            region,
            Activity::Primary { broadcaster: broadcaster_low, replier: None },
        )]);
        let card_high = business_card(vec![(
            ReactorActivityId::fresh(),
            region,
            Activity::Primary { broadcaster: broadcaster_high, replier: None },
        )]);

        let mut peers = Map::new();
        peers.insert(low, Some(card_low));
        peers.insert(high, Some(card_high));
        let snapshot = DirectorySnapshot::new(peers);

        let mut roles = Map::new();
        roles.insert(low, PeerRoles::new(vec![(region, Role::Primary)]));
        roles.insert(high, PeerRoles::new(vec![(region, Role::Primary)]));
        let blueprint = Blueprint::new(roles);

        assert_eq!(find_broadcaster(&snapshot, &blueprint, region), Some(broadcaster_low));
    }
}
