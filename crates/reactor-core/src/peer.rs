//! Peer identity.
//!
//! `PeerId` is handed out by the [`ConnectivityService`](crate::mailbox::ConnectivityService),
//! not generated by the reactor itself — a peer's identity is stable for the lifetime of its
//! process, so this is a plain opaque wrapper rather than anything with a constructor the reactor
//! would call on its own behalf.

use core::fmt;

/// Stable identifier for a peer node in the cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// Wraps a raw identifier handed out by the connectivity layer.
    pub const fn from_raw(raw: u64) -> Self {
        PeerId(raw)
    }

    /// Returns the raw identifier, e.g. for use as a map key in a wire-level payload.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}
