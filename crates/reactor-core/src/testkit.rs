//! Zero-IO fakes for every external collaborator this crate consumes, mirroring the teacher's
//! `test_stubs` convention: good enough to drive the full scenario suite without real networking
//! or disk.
//!
//! [`InMemoryDirectory::fork`] is the seam that lets a single test build a small simulated
//! cluster: every fork shares the same gossip fabric, so publishes from one peer's view are
//! visible (and, in this fake, instantly acked) from every other.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::activity::{Activity, ReactorActivityId, ReactorBusinessCard};
use crate::blueprint::{Blueprint, BlueprintWatch};
use crate::branch_history::BranchHistory;
use crate::directory::{Directory, DirectorySnapshot, EchoVersion};
use crate::error::ReactorResult;
use crate::interruptor::Interruptor;
use crate::mailbox::{Backfillee, BackfillerCard, ConnectivityService, MailboxAddr, MailboxManager};
use crate::master::{MasterBusinessCard, MasterDirectory, MasterId};
use crate::region::Region;
use crate::store::{Metainfo, ReadToken, StoreView, WriteToken};
use crate::version::{BranchId, VersionRange};
use crate::PeerId;

#[derive(Default)]
struct SharedDirectoryState {
    peers: Mutex<BTreeSet<PeerId>>,
    cards: Mutex<BTreeMap<PeerId, ReactorBusinessCard>>,
    versions: Mutex<BTreeMap<PeerId, EchoVersion>>,
    acked: Mutex<BTreeMap<(PeerId, PeerId), EchoVersion>>,
    notify: Notify,
}

/// An in-memory [`Directory`] backed by a shared gossip fabric. Acks are instantaneous: every
/// publish is immediately marked observed by every peer known to the fabric, which is adequate for
/// exercising the reactor's own logic but does not model real propagation delay.
pub struct InMemoryDirectory {
    me: PeerId,
    shared: Arc<SharedDirectoryState>,
}

impl InMemoryDirectory {
    pub fn new(me: PeerId) -> Self {
        let shared = Arc::new(SharedDirectoryState::default());
        shared.peers.lock().unwrap().insert(me);
        InMemoryDirectory { me, shared }
    }

    /// A second peer's view onto the same simulated gossip fabric.
    pub fn fork(&self, me: PeerId) -> Self {
        self.shared.peers.lock().unwrap().insert(me);
        InMemoryDirectory { me, shared: self.shared.clone() }
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    fn me(&self) -> PeerId {
        self.me
    }

    fn publish(&self, id: ReactorActivityId, region: Region, activity: Activity) -> EchoVersion {
        let version = {
            let mut versions = self.shared.versions.lock().unwrap();
            let entry = versions.entry(self.me).or_insert(0);
            *entry += 1;
            *entry
        };
        {
            let mut cards = self.shared.cards.lock().unwrap();
            cards.entry(self.me).or_default().activity_map.insert(id, region, activity);
        }
        self.ack_everyone(version);
        self.shared.notify.notify_waiters();
        version
    }

    fn retract(&self, id: ReactorActivityId) -> EchoVersion {
        let version = {
            let mut versions = self.shared.versions.lock().unwrap();
            let entry = versions.entry(self.me).or_insert(0);
            *entry += 1;
            *entry
        };
        {
            let mut cards = self.shared.cards.lock().unwrap();
            if let Some(card) = cards.get_mut(&self.me) {
                card.activity_map.remove(id);
            }
        }
        self.ack_everyone(version);
        self.shared.notify.notify_waiters();
        version
    }

    fn snapshot(&self) -> DirectorySnapshot {
        let peers = self.shared.peers.lock().unwrap();
        let cards = self.shared.cards.lock().unwrap();
        let map = peers.iter().map(|&peer| (peer, cards.get(&peer).cloned())).collect();
        DirectorySnapshot::new(map)
    }

    async fn changed(&self) {
        self.shared.notify.notified().await;
    }

    fn acked_version(&self, peer: PeerId) -> EchoVersion {
        self.shared.acked.lock().unwrap().get(&(self.me, peer)).copied().unwrap_or(0)
    }
}

impl InMemoryDirectory {
    fn ack_everyone(&self, version: EchoVersion) {
        let peers = self.shared.peers.lock().unwrap();
        let mut acked = self.shared.acked.lock().unwrap();
        for &observer in peers.iter() {
            if observer != self.me {
                acked.insert((self.me, observer), version);
            }
        }
    }
}

/// An in-memory branch history tracking one parent per branch, good enough for the fork/ancestor
/// relationships the test suite exercises — real branch histories may be more general DAGs under
/// concurrent operator-blessed merges, which is out of scope for this fake.
#[derive(Default)]
pub struct InMemoryBranchHistory {
    parents: Mutex<HashMap<u64, u64>>,
}

impl BranchHistory for InMemoryBranchHistory {
    fn is_ancestor(&self, v: crate::version::Version, w: crate::version::Version, _region: Region) -> bool {
        if v.branch() == w.branch() {
            return v.sequence() <= w.sequence();
        }
        let parents = self.parents.lock().unwrap();
        let mut cursor = w.branch().raw();
        while let Some(&parent) = parents.get(&cursor) {
            if parent == v.branch().raw() {
                return true;
            }
            cursor = parent;
        }
        false
    }

    fn record_branch(&self, parent: BranchId, child: BranchId, _region: Region) {
        self.parents.lock().unwrap().insert(child.raw(), parent.raw());
    }
}

/// An in-memory store holding metainfo only — no actual key/value bytes, since the reactor never
/// touches them directly.
pub struct InMemoryStore {
    metainfo: Mutex<Metainfo>,
    next_token: AtomicU64,
}

impl InMemoryStore {
    pub fn new(metainfo: Metainfo) -> Self {
        InMemoryStore { metainfo: Mutex::new(metainfo), next_token: AtomicU64::new(1) }
    }
}

#[async_trait]
impl StoreView for InMemoryStore {
    async fn new_read_token(&self) -> ReadToken {
        ReadToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    async fn new_write_token(&self) -> WriteToken {
        WriteToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    async fn get_metainfo(&self, _token: ReadToken) -> ReactorResult<Metainfo> {
        Ok(self.metainfo.lock().unwrap().clone())
    }

    async fn set_metainfo(&self, _token: WriteToken, metainfo: Metainfo) -> ReactorResult<()> {
        *self.metainfo.lock().unwrap() = metainfo;
        Ok(())
    }

    async fn erase_region(&self, _token: WriteToken, region: Region) -> ReactorResult<()> {
        let mut guard = self.metainfo.lock().unwrap();
        let mut new_entries = Vec::new();
        for (r, v) in guard.iter().copied() {
            let overlap = r.intersect(region);
            if overlap.is_empty() {
                new_entries.push((r, v));
                continue;
            }
            if overlap.start() > r.start() {
                new_entries.push((Region::new(r.start(), overlap.start()), v));
            }
            if overlap.end() < r.end() {
                new_entries.push((Region::new(overlap.end(), r.end()), v));
            }
        }
        new_entries.push((region, VersionRange::EMPTY));
        *guard = Metainfo::new(new_entries);
        Ok(())
    }
}

/// A no-op mailbox manager that records every send for test assertions instead of delivering it
/// anywhere.
#[derive(Default)]
pub struct InMemoryMailboxManager {
    next_addr: AtomicU64,
    sent: Mutex<Vec<(MailboxAddr, Vec<u8>)>>,
}

impl InMemoryMailboxManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(MailboxAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxManager for InMemoryMailboxManager {
    fn new_mailbox(&self) -> MailboxAddr {
        MailboxAddr::from_raw(self.next_addr.fetch_add(1, Ordering::Relaxed))
    }

    async fn send(&self, addr: MailboxAddr, payload: &[u8]) -> ReactorResult<()> {
        self.sent.lock().unwrap().push((addr, payload.to_vec()));
        Ok(())
    }
}

/// A fixed, never-changing peer set.
pub struct StaticConnectivity {
    me: PeerId,
    peers: Vec<PeerId>,
}

impl StaticConnectivity {
    pub fn new(me: PeerId, peers: Vec<PeerId>) -> Self {
        StaticConnectivity { me, peers }
    }
}

impl ConnectivityService for StaticConnectivity {
    fn get_me(&self) -> PeerId {
        self.me
    }

    fn get_peers_list(&self) -> Vec<PeerId> {
        self.peers.clone()
    }
}

/// A [`Backfillee`] that completes as soon as it is polled, for tests that only care about the
/// control flow around backfills rather than actual data transfer.
pub struct InstantBackfillee;

#[async_trait]
impl Backfillee for InstantBackfillee {
    async fn run(&self, _source: BackfillerCard, _region: Region, interruptor: &Interruptor) -> ReactorResult<()> {
        interruptor.race(tokio::task::yield_now()).await
    }
}

/// An in-memory master directory that just records the currently-published cards — tests assert
/// against [`InMemoryMasterDirectory::entries`] rather than observing real query routing.
#[derive(Default)]
pub struct InMemoryMasterDirectory {
    entries: Mutex<BTreeMap<MasterId, MasterBusinessCard>>,
}

impl InMemoryMasterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<MasterBusinessCard> {
        self.entries.lock().unwrap().values().copied().collect()
    }
}

#[async_trait]
impl MasterDirectory for InMemoryMasterDirectory {
    fn publish(&self, id: MasterId, card: MasterBusinessCard) {
        self.entries.lock().unwrap().insert(id, card);
    }

    fn retract(&self, id: MasterId) {
        self.entries.lock().unwrap().remove(&id);
    }
}

/// A blueprint watch whose value can be replaced at will, waking up anyone suspended in
/// [`BlueprintWatch::changed`].
pub struct MutableBlueprintWatch {
    current: Mutex<Arc<Blueprint>>,
    notify: Notify,
}

impl MutableBlueprintWatch {
    pub fn new(initial: Blueprint) -> Self {
        MutableBlueprintWatch { current: Mutex::new(Arc::new(initial)), notify: Notify::new() }
    }

    pub fn set(&self, blueprint: Blueprint) {
        *self.current.lock().unwrap() = Arc::new(blueprint);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl BlueprintWatch for MutableBlueprintWatch {
    fn current(&self) -> Arc<Blueprint> {
        self.current.lock().unwrap().clone()
    }

    async fn changed(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forked_directories_share_publishes() {
        let a = InMemoryDirectory::new(PeerId::from_raw(1));
        let b = a.fork(PeerId::from_raw(2));

        let id = ReactorActivityId::fresh();
        let version = a.publish(id, Region::new(0, 10), Activity::Nothing);

        let snapshot = b.snapshot();
        assert!(snapshot.card(PeerId::from_raw(1)).is_some());
        assert_eq!(a.acked_version(PeerId::from_raw(2)), version);
    }
}
