//! Best-backfiller computation (component C of SPEC_FULL.md §2): for a region, compare every
//! peer's offered version against the causal branch history and settle on a coherent latest
//! version plus the set of peers that can supply it.
//!
//! The map partitions the region under analysis; each partition tracks its own candidate
//! independently, since different sub-regions can end up preferring different source peers.

use crate::branch_history::BranchHistory;
use crate::error::{ReactorError, ReactorResult};
use crate::mailbox::BackfillerCard;
use crate::region::Region;
use crate::store::Metainfo;
use crate::version::VersionRange;

/// One region's current best candidate to backfill from, or to recognize as already satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillCandidate {
    pub version_range: VersionRange,
    pub places_to_get_this_version: Vec<BackfillerCard>,
    pub present_in_our_store: bool,
}

/// A region-partitioned map of [`BackfillCandidate`]s.
#[derive(Clone, Debug, Default)]
pub struct BestBackfillerMap {
    entries: Vec<(Region, BackfillCandidate)>,
}

impl BestBackfillerMap {
    /// Seeds the map from the local store's metainfo, restricted to `region`: every sub-region the
    /// store already has metainfo for starts out `present_in_our_store = true` with no offered
    /// sources, so it is recognized as already satisfied unless a peer later out-argues it.
    pub fn seed_from_metainfo(metainfo: &Metainfo, region: Region) -> Self {
        let entries = metainfo
            .restrict(region)
            .into_iter()
            .map(|(r, version_range)| {
                (
                    r,
                    BackfillCandidate {
                        version_range,
                        places_to_get_this_version: Vec::new(),
                        present_in_our_store: true,
                    },
                )
            })
            .collect();
        BestBackfillerMap { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Region, BackfillCandidate)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff every candidate's version range is coherent — step 5 of
    /// `is_safe_for_us_to_be_primary`.
    pub fn all_coherent(&self) -> bool {
        self.entries.iter().all(|(_, candidate)| candidate.version_range.coherent())
    }

    /// Sub-regions whose candidate still needs an actual backfill (`present_in_our_store ==
    /// false`), paired with the peer to pull from first.
    pub fn entries_needing_backfill(&self) -> Vec<(Region, BackfillCandidate)> {
        self.entries
            .iter()
            .filter(|(_, candidate)| !candidate.present_in_our_store)
            .cloned()
            .collect()
    }

    /// Absorbs a peer's offer — `(sub_region, version_range)` pairs it claims to hold — comparing
    /// each offered sub-region against whatever this map currently holds there, per SPEC_FULL.md
    /// §4.C. `source` is recorded as a place to fetch the winning version from, when it wins or
    /// ties.
    pub fn absorb_offer(
        &mut self,
        history: &dyn BranchHistory,
        source: BackfillerCard,
        offer: &[(Region, VersionRange)],
    ) -> ReactorResult<()> {
        for &(offer_region, challenger) in offer {
            self.absorb_one(history, source, offer_region, challenger)?;
        }
        Ok(())
    }

    fn absorb_one(
        &mut self,
        history: &dyn BranchHistory,
        source: BackfillerCard,
        offer_region: Region,
        challenger: VersionRange,
    ) -> ReactorResult<()> {
        let mut new_entries = Vec::with_capacity(self.entries.len() + 1);
        for (entry_region, incumbent) in std::mem::take(&mut self.entries) {
            let overlap = entry_region.intersect(offer_region);
            if overlap.is_empty() {
                new_entries.push((entry_region, incumbent));
                continue;
            }
            if overlap.start() > entry_region.start() {
                new_entries.push((Region::new(entry_region.start(), overlap.start()), incumbent.clone()));
            }
            let resolved = resolve(history, overlap, incumbent.clone(), challenger, source)?;
            new_entries.push((overlap, resolved));
            if overlap.end() < entry_region.end() {
                new_entries.push((Region::new(overlap.end(), entry_region.end()), incumbent));
            }
        }
        self.entries = new_entries;
        Ok(())
    }
}

/// Resolves one sub-region's incumbent against a challenger, per the four cases of SPEC_FULL.md
/// §4.C.
fn resolve(
    history: &dyn BranchHistory,
    region: Region,
    incumbent: BackfillCandidate,
    challenger_range: VersionRange,
    source: BackfillerCard,
) -> ReactorResult<BackfillCandidate> {
    let incumbent_latest = incumbent.version_range.latest();
    let challenger_latest = challenger_range.latest();

    if history.is_divergent(challenger_latest, incumbent_latest, region) {
        return Err(ReactorError::DivergentData { region });
    }

    let same_version = incumbent_latest == challenger_latest;
    let coherence_agrees = incumbent.version_range.coherent() == challenger_range.coherent();

    if same_version && coherence_agrees {
        let mut places = incumbent.places_to_get_this_version;
        places.push(source);
        return Ok(BackfillCandidate {
            version_range: incumbent.version_range,
            places_to_get_this_version: places,
            present_in_our_store: incumbent.present_in_our_store,
        });
    }

    let challenger_supersedes = history.is_ancestor(incumbent_latest, challenger_latest, region)
        || (same_version && challenger_range.coherent() && !incumbent.version_range.coherent());

    if challenger_supersedes {
        Ok(BackfillCandidate {
            version_range: challenger_range,
            places_to_get_this_version: vec![source],
            present_in_our_store: false,
        })
    } else {
        Ok(incumbent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxAddr;
    use crate::version::{BranchId, Version};
    use crate::PeerId;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct LinearHistory {
        edges: Mutex<HashSet<(u64, u64)>>,
    }

    impl BranchHistory for LinearHistory {
        fn is_ancestor(&self, v: Version, w: Version, _region: Region) -> bool {
            if v.branch() == w.branch() {
                return v.sequence() <= w.sequence();
            }
            self.edges.lock().unwrap().contains(&(v.branch().raw(), w.branch().raw()))
        }

        fn record_branch(&self, parent: BranchId, child: BranchId, _region: Region) {
            self.edges.lock().unwrap().insert((parent.raw(), child.raw()));
        }
    }

    fn card(raw: u64) -> BackfillerCard {
        BackfillerCard { peer: PeerId::from_raw(raw), addr: MailboxAddr::from_raw(raw) }
    }

    #[test]
    fn tie_adds_source_without_replacing_version() {
        let history = LinearHistory::default();
        let branch = BranchId::fresh();
        let version = Version::new(branch, 5);
        let region = Region::new(0, 100);
        let metainfo = Metainfo::new(vec![(region, VersionRange::point(version))]);
        let mut map = BestBackfillerMap::seed_from_metainfo(&metainfo, region);

        map.absorb_offer(&history, card(2), &[(region, VersionRange::point(version))]).unwrap();

        let (_, candidate) = map.iter().next().unwrap();
        assert_eq!(candidate.places_to_get_this_version, vec![card(2)]);
        assert!(candidate.present_in_our_store);
    }

    #[test]
    fn newer_coherent_challenger_replaces_incumbent() {
        let history = LinearHistory::default();
        let branch = BranchId::fresh();
        let region = Region::new(0, 100);
        let old = VersionRange::point(Version::new(branch, 1));
        let new = VersionRange::point(Version::new(branch, 9));
        let metainfo = Metainfo::new(vec![(region, old)]);
        let mut map = BestBackfillerMap::seed_from_metainfo(&metainfo, region);

        map.absorb_offer(&history, card(2), &[(region, new)]).unwrap();

        let (_, candidate) = map.iter().next().unwrap();
        assert_eq!(candidate.version_range, new);
        assert!(!candidate.present_in_our_store);
        assert_eq!(candidate.places_to_get_this_version, vec![card(2)]);
    }

    #[test]
    fn divergent_branches_fail() {
        let history = LinearHistory::default();
        let region = Region::new(0, 100);
        let ours = VersionRange::point(Version::new(BranchId::fresh(), 3));
        let theirs = VersionRange::point(Version::new(BranchId::fresh(), 3));
        let metainfo = Metainfo::new(vec![(region, ours)]);
        let mut map = BestBackfillerMap::seed_from_metainfo(&metainfo, region);

        let result = map.absorb_offer(&history, card(2), &[(region, theirs)]);
        assert!(matches!(result, Err(ReactorError::DivergentData { .. })));
    }

    #[test]
    fn incoherent_incumbent_loses_to_coherent_tie() {
        let history = LinearHistory::default();
        let branch = BranchId::fresh();
        let region = Region::new(0, 100);
        let version = Version::new(branch, 5);
        let incoherent = VersionRange::new(version, version, false);
        let coherent = VersionRange::new(version, version, true);
        let metainfo = Metainfo::new(vec![(region, incoherent)]);
        let mut map = BestBackfillerMap::seed_from_metainfo(&metainfo, region);

        map.absorb_offer(&history, card(2), &[(region, coherent)]).unwrap();

        let (_, candidate) = map.iter().next().unwrap();
        assert_eq!(candidate.version_range, coherent);
        assert!(!candidate.present_in_our_store);
    }

    #[test]
    fn only_overlapping_subregion_is_replaced() {
        let history = LinearHistory::default();
        let branch = BranchId::fresh();
        let whole = Region::new(0, 100);
        let old = VersionRange::point(Version::new(branch, 1));
        let new = VersionRange::point(Version::new(branch, 9));
        let metainfo = Metainfo::new(vec![(whole, old)]);
        let mut map = BestBackfillerMap::seed_from_metainfo(&metainfo, whole);

        let offered_region = Region::new(0, 40);
        map.absorb_offer(&history, card(2), &[(offered_region, new)]).unwrap();

        let entries: Vec<_> = map.iter().cloned().collect();
        assert_eq!(entries.len(), 2);
        let (r0, c0) = entries.iter().find(|(r, _)| *r == offered_region).unwrap();
        assert_eq!(*r0, offered_region);
        assert_eq!(c0.version_range, new);
        let remainder = Region::new(40, 100);
        let (_, c1) = entries.iter().find(|(r, _)| *r == remainder).unwrap();
        assert_eq!(c1.version_range, old);
    }
}
