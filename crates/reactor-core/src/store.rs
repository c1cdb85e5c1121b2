//! The on-disk storage engine's surface that the reactor actually touches.
//!
//! Per crate scope (§1), the reactor never interprets stored values — it only reads and writes
//! **metainfo** (what version range this store holds, per sub-region) and streams bytes through
//! the store during backfill. Everything else about `StoreView` (the actual read/write path) is
//! an external collaborator; this trait exposes just enough surface for the safety predicate and
//! the role runners to do their job.

use async_trait::async_trait;

use crate::error::ReactorResult;
use crate::interruptor::Interruptor;
use crate::region::Region;
use crate::version::VersionRange;

/// A region → version-range map, as the store itself understands its own contents.
///
/// The original system encodes this as a `region → binary_blob` map; this crate keeps it typed
/// since nothing here needs wire compatibility with that on-disk encoding (see SPEC_FULL.md §2.2).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metainfo {
    entries: Vec<(Region, VersionRange)>,
}

impl Metainfo {
    pub fn new(entries: Vec<(Region, VersionRange)>) -> Self {
        Metainfo { entries }
    }

    pub fn empty_for(region: Region) -> Self {
        Metainfo { entries: vec![(region, VersionRange::EMPTY)] }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Region, VersionRange)> {
        self.entries.iter()
    }

    /// The sub-entries intersecting `region`, clipped to the overlap.
    pub fn restrict(&self, region: Region) -> Vec<(Region, VersionRange)> {
        self.entries
            .iter()
            .filter_map(|(r, v)| {
                let overlap = r.intersect(region);
                (!overlap.is_empty()).then_some((overlap, *v))
            })
            .collect()
    }
}

/// Marker returned by [`StoreView::new_read_token`]; opaque to callers beyond being presented
/// back to `get_metainfo`. Implementations may use this to pin a consistent snapshot.
#[derive(Debug)]
pub struct ReadToken(pub(crate) u64);

/// Marker returned by [`StoreView::new_write_token`]; presented back to `set_metainfo` /
/// `erase_region`. Acquiring one may need to wait on prior writes draining, which is why
/// acquisition is async and interruptible.
#[derive(Debug)]
pub struct WriteToken(pub(crate) u64);

/// The metainfo-and-lifecycle slice of the on-disk storage engine the reactor depends on.
#[async_trait]
pub trait StoreView: Send + Sync {
    /// Acquires a read token, waiting on prior writes if the engine requires ordering. This is a
    /// suspension point: callers should race it against their interruptor.
    async fn new_read_token(&self) -> ReadToken;

    /// Acquires a write token. Also a suspension point.
    async fn new_write_token(&self) -> WriteToken;

    async fn get_metainfo(&self, token: ReadToken) -> ReactorResult<Metainfo>;

    async fn set_metainfo(&self, token: WriteToken, metainfo: Metainfo) -> ReactorResult<()>;

    /// Erases all data in `region`, used by `be_nothing` once it is safe to do so. Updates
    /// metainfo to `VersionRange::EMPTY` for the erased region as a side effect.
    async fn erase_region(&self, token: WriteToken, region: Region) -> ReactorResult<()>;

    /// Convenience used throughout the role runners: acquire a read token and fetch metainfo in
    /// one interruptible step.
    async fn read_metainfo(&self, interruptor: &Interruptor) -> ReactorResult<Metainfo> {
        let token = interruptor.race(self.new_read_token()).await?;
        self.get_metainfo(token).await
    }
}
