//! The directory entry: a scoped sentry tying one published activity to the lifetime of one
//! role-runner invocation (component B of SPEC_FULL.md §2).
//!
//! This is the Rust-native version of the original's destructor-based sentry (SPEC_FULL.md §9):
//! construction publishes, `Drop` retracts. It is the central ownership discipline behind the
//! "no stale directory entries" invariant (§8) — the directory can never outlive the runner that
//! owns the entry describing it, because the entry retracts unconditionally on drop, including
//! on panic unwind.

use std::sync::Arc;

use tracing::debug;

use crate::activity::{Activity, ReactorActivityId};
use crate::directory::{Directory, EchoVersion};
use crate::region::Region;

/// Scoped sentry: while alive, advertises one activity for one region in the directory; on drop,
/// retracts it.
///
/// Invariant: at any point during the lifetime of a role runner, at most one `DirectoryEntry`
/// exists for its region — runners own exactly one of these for their whole lifetime, replacing
/// its payload via [`set`](Self::set) or [`update_without_changing_id`](Self::update_without_changing_id)
/// rather than ever constructing a second one.
#[derive(Debug)]
pub struct DirectoryEntry {
    directory: Arc<dyn Directory>,
    region: Region,
    id: ReactorActivityId,
}

impl DirectoryEntry {
    /// Allocates a fresh activity id and publishes an initial `Activity::Nothing` for `region`.
    pub fn new(directory: Arc<dyn Directory>, region: Region) -> Self {
        let id = ReactorActivityId::fresh();
        directory.publish(id, region, Activity::Nothing);
        debug!(%region, activity_id = %id, "directory entry opened");
        DirectoryEntry { directory, region, id }
    }

    pub fn activity_id(&self) -> ReactorActivityId {
        self.id
    }

    /// Allocates a **new** activity id, retracts the old one, and publishes `activity` under the
    /// new id. Use this when the underlying sub-state has changed in a way observers should treat
    /// as a reset (a previous subscription built against the old id should be dropped) — e.g.
    /// transitioning from `SecondaryWithoutPrimary` to `SecondaryUpToDate`.
    pub fn set(&mut self, activity: Activity) -> EchoVersion {
        let new_id = ReactorActivityId::fresh();
        let old_id = self.id;
        self.directory.retract(old_id);
        let version = self.directory.publish(new_id, self.region, activity);
        debug!(region = %self.region, old = %old_id, new = %new_id, "directory entry id rotated");
        self.id = new_id;
        version
    }

    /// Mutates the payload in place, keeping the same activity id — used for strict refinements
    /// (e.g. primary appending its `replier_card` once the listener/replier come up) so that
    /// subscribers built against the current id remain valid.
    pub fn update_without_changing_id(&self, activity: Activity) -> EchoVersion {
        self.directory.publish(self.id, self.region, activity)
    }
}

impl Drop for DirectoryEntry {
    fn drop(&mut self) {
        self.directory.retract(self.id);
        debug!(region = %self.region, activity_id = %self.id, "directory entry retracted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::InMemoryDirectory;
    use crate::PeerId;

    #[test]
    fn construction_publishes_nothing() {
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new(PeerId::from_raw(1)));
        let region = Region::new(0, 10);
        let entry = DirectoryEntry::new(directory.clone(), region);
        let snapshot = directory.snapshot();
        let card = snapshot.card(PeerId::from_raw(1)).unwrap();
        let (_, activity) = card.get(entry.activity_id()).unwrap();
        assert_eq!(*activity, Activity::Nothing);
    }

    #[test]
    fn set_rotates_activity_id() {
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new(PeerId::from_raw(1)));
        let region = Region::new(0, 10);
        let mut entry = DirectoryEntry::new(directory.clone(), region);
        let old_id = entry.activity_id();
        entry.set(Activity::PrimaryWhenSafe);
        assert_ne!(entry.activity_id(), old_id);
        let snapshot = directory.snapshot();
        let card = snapshot.card(PeerId::from_raw(1)).unwrap();
        assert!(card.get(old_id).is_none());
        assert_eq!(card.get(entry.activity_id()).unwrap().1, Activity::PrimaryWhenSafe);
    }

    #[test]
    fn update_without_changing_id_keeps_id() {
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new(PeerId::from_raw(1)));
        let region = Region::new(0, 10);
        let entry = DirectoryEntry::new(directory.clone(), region);
        let id = entry.activity_id();
        entry.update_without_changing_id(Activity::PrimaryWhenSafe);
        assert_eq!(entry.activity_id(), id);
        let snapshot = directory.snapshot();
        let card = snapshot.card(PeerId::from_raw(1)).unwrap();
        assert_eq!(card.get(id).unwrap().1, Activity::PrimaryWhenSafe);
    }

    #[test]
    fn drop_retracts_entry() {
        let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new(PeerId::from_raw(1)));
        let region = Region::new(0, 10);
        let id;
        {
            let entry = DirectoryEntry::new(directory.clone(), region);
            id = entry.activity_id();
        }
        let snapshot = directory.snapshot();
        let card = snapshot.card(PeerId::from_raw(1)).unwrap();
        assert!(card.get(id).is_none());
    }
}
