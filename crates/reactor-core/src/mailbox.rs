//! External collaborators consumed, not implemented, by this crate: the RPC/mailbox substrate
//! and the connectivity service. Real deployments wire these to an actual transport; the
//! [`crate::testkit`] module provides in-memory fakes good enough to drive every scenario in the
//! test suite.

use async_trait::async_trait;

use crate::error::ReactorResult;
use crate::PeerId;

/// An addressable one-way endpoint handed out by a [`MailboxManager`].
///
/// Business cards (see [`crate::activity`]) carry `MailboxAddr`s so a peer that observes one in
/// the directory knows where to send requests; addresses are opaque and only meaningful to the
/// `MailboxManager` that created them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MailboxAddr(u64);

impl MailboxAddr {
    pub const fn from_raw(raw: u64) -> Self {
        MailboxAddr(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Creates addressable one-way endpoints and sends fire-and-forget messages to them.
///
/// `send` is best-effort and unordered across distinct addresses: the reactor never relies on
/// message ordering between different mailboxes, only on ordering within directory echo versions
/// (see [`crate::directory`]).
#[async_trait]
pub trait MailboxManager: Send + Sync {
    /// Allocates a fresh local mailbox address of a given kind, to be advertised in a business
    /// card. The reactor never inspects the address itself, only passes it along.
    fn new_mailbox(&self) -> MailboxAddr;

    /// Best-effort, fire-and-forget send. Failure here is always `ErrorCategory::ResourceLost`
    /// territory: the caller retries at a higher level (the safety loop re-evaluating on the
    /// next directory change) rather than this call itself retrying.
    async fn send(&self, addr: MailboxAddr, payload: &[u8]) -> ReactorResult<()>;
}

/// Cluster membership: who we are, and who else is around.
#[async_trait]
pub trait ConnectivityService: Send + Sync {
    /// This node's own peer id.
    fn get_me(&self) -> PeerId;

    /// The currently-connected *other* peers — never includes [`get_me`](Self::get_me).
    /// `wait_for_directory_acks` only waits on peers in this list — a peer that disconnects
    /// before acking is not expected to ack, and we never wait on an ack from ourselves.
    fn get_peers_list(&self) -> Vec<PeerId>;
}

/// A reference to a peer's backfiller, advertised through that peer's business card. Opaque to
/// the reactor beyond carrying enough information (a mailbox address, and which peer it is) to
/// hand to a [`Backfillee`] implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackfillerCard {
    pub peer: PeerId,
    pub addr: MailboxAddr,
}

/// A reference to a primary's broadcaster, advertised once a region's primary has finished
/// bringing up its data path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BroadcasterCard {
    pub peer: PeerId,
    pub addr: MailboxAddr,
}

/// A reference to a primary's replier, advertised once the listener/replier have come up —
/// strictly after the broadcaster card, refining the same `primary` activity in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplierCard {
    pub peer: PeerId,
    pub addr: MailboxAddr,
}

/// Performs one backfill: blocks until the region is caught up to the offered version, or fails.
///
/// This is the one place the reactor crosses into real data transfer; everything else in this
/// crate is control-plane bookkeeping. Implementations stream data through the embedder's
/// [`crate::store::StoreView`] themselves — the reactor only decides *which* peer to backfill
/// from and *when*, via [`crate::safety`] and [`crate::backfill`].
#[async_trait]
pub trait Backfillee: Send + Sync {
    async fn run(
        &self,
        source: BackfillerCard,
        region: crate::region::Region,
        interruptor: &crate::interruptor::Interruptor,
    ) -> ReactorResult<()>;
}
