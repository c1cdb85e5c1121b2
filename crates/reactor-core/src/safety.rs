//! The primary and nothing safety predicates (component D of SPEC_FULL.md §2): the gate every
//! role transition must pass before it is allowed to make an externally visible claim.

use crate::activity::Activity;
use crate::backfill::BestBackfillerMap;
use crate::blueprint::Blueprint;
use crate::branch_history::BranchHistory;
use crate::directory::{assert_no_overlap, intersecting_activities, DirectorySnapshot};
use crate::error::{ReactorError, ReactorResult};
use crate::region::Region;

/// Decides whether it is safe to assume primary for `region`, given the current directory
/// snapshot, blueprint, and branch history (SPEC_FULL.md §4.D).
///
/// `me` is excluded from the peer checks below: the predicate asks whether everyone *else* is
/// standing down, not whether our own in-flight `primary_when_safe` publish is compatible with
/// itself.
///
/// `best_backfiller_map` is only overwritten on success (`Ok(true)`); on `Ok(false)` or `Err` the
/// caller's map is left untouched, matching the original's in/out parameter discipline translated
/// into an explicit return.
pub fn is_safe_for_us_to_be_primary(
    snapshot: &DirectorySnapshot,
    blueprint: &Blueprint,
    region: Region,
    me: crate::PeerId,
    history: &dyn BranchHistory,
    best_backfiller_map: &BestBackfillerMap,
) -> ReactorResult<(bool, BestBackfillerMap)> {
    let mut working = best_backfiller_map.clone();

    for &peer in blueprint.peers().filter(|&&peer| peer != me) {
        let Some(card) = snapshot.card(peer) else {
            return Ok((false, best_backfiller_map.clone()));
        };
        let activities = card.activity_map.intersecting(region);

        assert_no_overlap(peer, &activities)?;

        let covered: Vec<Region> = activities.iter().map(|(r, _)| *r).collect();
        if !covers_without_gaps(region, &covered) {
            return Ok((false, best_backfiller_map.clone()));
        }

        if !activities
            .iter()
            .all(|(_, activity)| activity.is_compatible_with_someone_else_becoming_primary())
        {
            return Ok((false, best_backfiller_map.clone()));
        }

        for (sub_region, activity) in &activities {
            let (Some(offered), Some(backfiller)) = (activity.offered_version(), activity.backfiller())
            else {
                continue;
            };
            match working.absorb_offer(history, backfiller, &[(*sub_region, offered)]) {
                Ok(()) => {}
                Err(ReactorError::DivergentData { .. }) => {
                    return Ok((false, best_backfiller_map.clone()));
                }
                Err(other) => return Err(other),
            }
        }
    }

    if !working.all_coherent() {
        return Ok((false, best_backfiller_map.clone()));
    }

    Ok((true, working))
}

/// Decides whether it is safe to erase our copy of `region`: every peer intersecting it must
/// already hold a durable copy, either as a live `primary` or a caught-up secondary
/// (SPEC_FULL.md §4.D, "is_safe_for_us_to_be_nothing"). `me` is excluded for the same reason as
/// in [`is_safe_for_us_to_be_primary`] — we are not asking whether our own in-flight erase is
/// compatible with itself.
pub fn is_safe_for_us_to_be_nothing(
    snapshot: &DirectorySnapshot,
    blueprint: &Blueprint,
    region: Region,
    me: crate::PeerId,
) -> bool {
    for &peer in blueprint.peers().filter(|&&peer| peer != me) {
        let Some(activities) = intersecting_activities(snapshot, peer, region) else {
            return false;
        };
        let holds_a_durable_copy = activities.iter().all(|(_, activity)| {
            activity.broadcaster().is_some() || activity.is_secondary_up_to_date()
        });
        if !holds_a_durable_copy {
            return false;
        }
    }
    true
}

/// True iff `subregions`, sorted, tile `region` exactly end-to-end with no gaps (overlap is
/// already ruled out by [`assert_no_overlap`] before this runs).
fn covers_without_gaps(region: Region, subregions: &[Region]) -> bool {
    if region.is_empty() {
        return true;
    }
    let mut sorted = subregions.to_vec();
    sorted.sort_by_key(|r| r.start());
    let mut cursor = region.start();
    for r in sorted {
        if r.start() != cursor {
            return false;
        }
        cursor = r.end();
    }
    cursor == region.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityMap, ReactorActivityId, ReactorBusinessCard};
    use crate::blueprint::{PeerRoles, Role};
    use crate::mailbox::{BackfillerCard, BroadcasterCard, MailboxAddr};
    use crate::version::{BranchId, Version, VersionRange};
    use crate::PeerId;
    use std::collections::BTreeMap;

    fn business_card(entries: Vec<(Region, Activity)>) -> ReactorBusinessCard {
        let mut map = ActivityMap::new();
        for (region, activity) in entries {
            map.insert(ReactorActivityId::fresh(), region, activity);
        }
        ReactorBusinessCard { activity_map: map }
    }

    fn backfiller(peer: PeerId) -> BackfillerCard {
        BackfillerCard { peer, addr: MailboxAddr::from_raw(peer.raw()) }
    }

    fn blueprint_with(peers: &[PeerId]) -> Blueprint {
        let region = Region::new(0, 100);
        let mut roles = BTreeMap::new();
        for &peer in peers {
            roles.insert(peer, PeerRoles::new(vec![(region, Role::Secondary)]));
        }
        Blueprint::new(roles)
    }

    struct NoHistory;
    impl BranchHistory for NoHistory {
        fn is_ancestor(&self, v: Version, w: Version, _region: Region) -> bool {
            v.branch() == w.branch() && v.sequence() <= w.sequence()
        }
        fn record_branch(&self, _parent: BranchId, _child: BranchId, _region: Region) {}
    }

    #[test]
    fn unsafe_when_peer_has_no_card() {
        let region = Region::new(0, 100);
        let peer = PeerId::from_raw(1);
        let blueprint = blueprint_with(&[peer]);
        let snapshot = DirectorySnapshot::new(BTreeMap::new());
        let (safe, _) = is_safe_for_us_to_be_primary(
            &snapshot,
            &blueprint,
            region,
            PeerId::from_raw(99),
            &NoHistory,
            &BestBackfillerMap::default(),
        )
        .unwrap();
        assert!(!safe);
    }

    #[test]
    fn unsafe_when_someone_else_is_primary() {
        let region = Region::new(0, 100);
        let peer = PeerId::from_raw(1);
        let blueprint = blueprint_with(&[peer]);
        let card = business_card(vec![(
            region,
            Activity::Primary {
                broadcaster: BroadcasterCard { peer, addr: MailboxAddr::from_raw(1) },
                replier: None,
            },
        )]);
        let mut peers = BTreeMap::new();
        peers.insert(peer, Some(card));
        let snapshot = DirectorySnapshot::new(peers);
        let (safe, _) = is_safe_for_us_to_be_primary(
            &snapshot,
            &blueprint,
            region,
            PeerId::from_raw(99),
            &NoHistory,
            &BestBackfillerMap::default(),
        )
        .unwrap();
        assert!(!safe);
    }

    #[test]
    fn safe_when_everyone_is_nothing_and_coherent() {
        let region = Region::new(0, 100);
        let peer = PeerId::from_raw(1);
        let blueprint = blueprint_with(&[peer]);
        let card = business_card(vec![(region, Activity::Nothing)]);
        let mut peers = BTreeMap::new();
        peers.insert(peer, Some(card));
        let snapshot = DirectorySnapshot::new(peers);
        let (safe, map) = is_safe_for_us_to_be_primary(
            &snapshot,
            &blueprint,
            region,
            PeerId::from_raw(99),
            &NoHistory,
            &BestBackfillerMap::default(),
        )
        .unwrap();
        assert!(safe);
        assert!(map.all_coherent());
    }

    #[test]
    fn unsafe_on_gap_in_peer_coverage() {
        let region = Region::new(0, 100);
        let peer = PeerId::from_raw(1);
        let blueprint = blueprint_with(&[peer]);
        let card = business_card(vec![(Region::new(0, 50), Activity::Nothing)]);
        let mut peers = BTreeMap::new();
        peers.insert(peer, Some(card));
        let snapshot = DirectorySnapshot::new(peers);
        let (safe, _) = is_safe_for_us_to_be_primary(
            &snapshot,
            &blueprint,
            region,
            PeerId::from_raw(99),
            &NoHistory,
            &BestBackfillerMap::default(),
        )
        .unwrap();
        assert!(!safe);
    }

    #[test]
    fn unsafe_when_the_only_offered_version_is_incoherent() {
        // Same branch as our own history (so this does not take the separate `DivergentData`
        // error path) but flagged incoherent: a write has been acknowledged past `latest` without
        // the gap being backfilled yet. `is_safe_for_us_to_be_primary` must still refuse, via the
        // `!working.all_coherent()` check, since auto-healing onto an incoherent range would mean
        // the new primary serves a region it does not actually fully hold (SPEC_FULL.md §8,
        // "no un-coherent auto-heal").
        let region = Region::new(0, 100);
        let peer = PeerId::from_raw(1);
        let blueprint = blueprint_with(&[peer]);
        let seed = BestBackfillerMap::seed_from_metainfo(
            &crate::store::Metainfo::empty_for(region),
            region,
        );
        let incoherent =
            VersionRange::new(Version::new(BranchId::ROOT, 1), Version::new(BranchId::ROOT, 5), false);
        let card = business_card(vec![(
            region,
            Activity::SecondaryWithoutPrimary { current_state: incoherent, backfiller: backfiller(peer) },
        )]);
        let mut peers = BTreeMap::new();
        peers.insert(peer, Some(card));
        let snapshot = DirectorySnapshot::new(peers);
        let (safe, returned_map) = is_safe_for_us_to_be_primary(
            &snapshot,
            &blueprint,
            region,
            PeerId::from_raw(99),
            &NoHistory,
            &seed,
        )
        .unwrap();
        assert!(!safe, "an incoherent offered version must never let primary election proceed");
        // On failure the caller's map is returned untouched, per this function's in/out contract.
        assert_eq!(returned_map.iter().count(), seed.iter().count());
    }

    #[test]
    fn nothing_is_safe_only_when_peer_holds_durable_copy() {
        let region = Region::new(0, 100);
        let primary_peer = PeerId::from_raw(1);
        let blueprint = blueprint_with(&[primary_peer]);

        let not_yet = business_card(vec![(
            region,
            Activity::SecondaryWithoutPrimary {
                current_state: VersionRange::EMPTY,
                backfiller: backfiller(primary_peer),
            },
        )]);
        let mut peers = BTreeMap::new();
        peers.insert(primary_peer, Some(not_yet));
        let snapshot = DirectorySnapshot::new(peers);
        assert!(!is_safe_for_us_to_be_nothing(&snapshot, &blueprint, region, PeerId::from_raw(99)));

        let caught_up =
            business_card(vec![(region, Activity::SecondaryUpToDate { backfiller: backfiller(primary_peer) })]);
        let mut peers = BTreeMap::new();
        peers.insert(primary_peer, Some(caught_up));
        let snapshot = DirectorySnapshot::new(peers);
        assert!(is_safe_for_us_to_be_nothing(&snapshot, &blueprint, region, PeerId::from_raw(99)));
    }
}
