//! Blueprints: the cluster-wide assignment of roles to regions, per peer.
//!
//! A [`Blueprint`] is an immutable snapshot produced by an external orchestrator (choosing one is
//! explicitly out of scope for this crate — see the crate's module docs). The reactor only
//! consumes blueprints: it reconciles its own running role-runners against whatever the latest
//! snapshot says (see [`crate::reconciler`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::region::Region;
use crate::PeerId;

/// The role a peer plays for a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Primary,
    Secondary,
    Nothing,
}

/// One peer's region→role assignment within a blueprint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerRoles {
    entries: Vec<(Region, Role)>,
}

impl PeerRoles {
    pub fn new(entries: Vec<(Region, Role)>) -> Self {
        PeerRoles { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Region, Role)> {
        self.entries.iter()
    }

    /// The role this peer plays over `region`, if `region` is fully covered by a single entry.
    /// Returns `None` when `region` spans more than one of this peer's assigned sub-regions or
    /// is not assigned at all.
    pub fn role_for(&self, region: Region) -> Option<Role> {
        self.entries
            .iter()
            .find(|(r, _)| r.intersect(region) == region)
            .map(|(_, role)| *role)
    }

    /// All `(sub_region, role)` entries that intersect `region`, sub-regions clipped to the
    /// intersection.
    pub fn intersecting(&self, region: Region) -> Vec<(Region, Role)> {
        self.entries
            .iter()
            .filter_map(|(r, role)| {
                let overlap = r.intersect(region);
                (!overlap.is_empty()).then_some((overlap, *role))
            })
            .collect()
    }
}

/// An immutable, cluster-wide assignment of roles to regions for every peer.
///
/// Invariant: for every region in the key space, exactly one peer is assigned `Role::Primary`
/// over it. This crate does not validate that invariant on construction (the orchestrator that
/// produces blueprints is responsible for it) but the safety predicate in
/// [`crate::safety`] is written assuming it holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blueprint {
    peers_roles: BTreeMap<PeerId, PeerRoles>,
}

impl Blueprint {
    pub fn new(peers_roles: BTreeMap<PeerId, PeerRoles>) -> Self {
        Blueprint { peers_roles }
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers_roles.keys()
    }

    pub fn roles_for_peer(&self, peer: PeerId) -> Option<&PeerRoles> {
        self.peers_roles.get(&peer)
    }

    /// The `(region, role)` pairs assigned to `peer`, clipped to `peer`'s own entries — used by
    /// the reconciler to compute this node's desired set of role-runners.
    pub fn assignments_for(&self, peer: PeerId) -> Vec<(Region, Role)> {
        self.roles_for_peer(peer)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerRoles)> {
        self.peers_roles.iter()
    }
}

/// The external orchestrator's watchable handle on the current blueprint — consumed, not
/// implemented, by this crate (§6 construction parameters). The [`crate::reconciler::Reconciler`]
/// polls [`current`](BlueprintWatch::current) on startup and after every
/// [`changed`](BlueprintWatch::changed) wakeup.
#[async_trait]
pub trait BlueprintWatch: Send + Sync {
    fn current(&self) -> Arc<Blueprint>;

    /// Suspends until the blueprint has changed from whatever `current()` last returned.
    async fn changed(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_for_exact_region_match() {
        let region = Region::new(0, 100);
        let roles = PeerRoles::new(vec![(region, Role::Primary)]);
        assert_eq!(roles.role_for(region), Some(Role::Primary));
    }

    #[test]
    fn role_for_partial_overlap_is_none() {
        let roles = PeerRoles::new(vec![(Region::new(0, 50), Role::Primary)]);
        assert_eq!(roles.role_for(Region::new(0, 100)), None);
    }

    #[test]
    fn intersecting_clips_to_overlap() {
        let roles = PeerRoles::new(vec![(Region::new(0, 50), Role::Secondary)]);
        let hits = roles.intersecting(Region::new(25, 100));
        assert_eq!(hits, vec![(Region::new(25, 50), Role::Secondary)]);
    }

    #[test]
    fn assignments_for_unknown_peer_is_empty() {
        let bp = Blueprint::default();
        assert!(bp.assignments_for(PeerId::from_raw(1)).is_empty());
    }
}
