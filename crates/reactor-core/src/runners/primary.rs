//! `be_primary`: SPEC_FULL.md §4.E.1.

use futures::stream::{self, StreamExt};

use crate::activity::Activity;
use crate::backfill::BestBackfillerMap;
use crate::blueprint::Blueprint;
use crate::entry::DirectoryEntry;
use crate::error::{ReactorError, ReactorResult};
use crate::interruptor::Interruptor;
use crate::mailbox::{BroadcasterCard, ReplierCard};
use crate::master::{MasterBusinessCard, MasterDirectory, MasterId};
use crate::region::Region;
use crate::runners::RunnerContext;
use crate::safety::is_safe_for_us_to_be_primary;
use crate::version::BranchId;

/// Scoped sentry for the master-directory contribution, mirroring [`DirectoryEntry`]: publishes on
/// construction, retracts on drop.
struct MasterEntry<'a> {
    master: &'a dyn MasterDirectory,
    id: MasterId,
}

impl<'a> MasterEntry<'a> {
    fn new(master: &'a dyn MasterDirectory, region: Region, broadcaster: BroadcasterCard) -> Self {
        let id = MasterId::fresh();
        master.publish(id, MasterBusinessCard { region, broadcaster });
        MasterEntry { master, id }
    }
}

impl Drop for MasterEntry<'_> {
    fn drop(&mut self) {
        self.master.retract(self.id);
    }
}

/// Drives `region` through the primary role until interrupted by a blueprint change.
#[tracing::instrument(skip(ctx, blueprint, interruptor), fields(%region))]
pub async fn be_primary(
    ctx: &RunnerContext,
    region: Region,
    blueprint: &Blueprint,
    interruptor: &Interruptor,
) -> ReactorResult<()> {
    let mut entry = DirectoryEntry::new(ctx.directory.handle(), region);
    let intent_version = entry.set(Activity::PrimaryWhenSafe);

    ctx.directory
        .wait_for_directory_acks(
            intent_version,
            || ctx.connectivity.get_peers_list(),
            ctx.config.directory_ack_timeout,
            interruptor,
        )
        .await?;

    let best_map = loop {
        let metainfo = ctx.store.read_metainfo(interruptor).await?;
        let seed_map = BestBackfillerMap::seed_from_metainfo(&metainfo, region);

        let best_map = ctx
            .directory
            .run_until_satisfied(
                |snapshot| {
                    match is_safe_for_us_to_be_primary(
                        snapshot,
                        blueprint,
                        region,
                        ctx.connectivity.get_me(),
                        ctx.history.as_ref(),
                        &seed_map,
                    ) {
                        Ok((true, resolved)) => Some(resolved),
                        Ok((false, _)) => None,
                        Err(err) => {
                            tracing::error!(%region, %err, "primary safety predicate violated an invariant");
                            panic!("primary safety predicate violated an invariant: {err}");
                        }
                    }
                },
                interruptor,
            )
            .await?;

        let to_backfill = best_map.entries_needing_backfill();
        if to_backfill.is_empty() {
            break best_map;
        }

        let outcomes: Vec<ReactorResult<()>> = stream::iter(to_backfill.iter().map(|(sub_region, candidate)| {
            let source = *candidate
                .places_to_get_this_version
                .first()
                .expect("a candidate needing backfill always offers at least one source peer");
            let backfillee = ctx.backfillee.clone();
            let child = interruptor.child();
            let sub_region = *sub_region;
            async move { backfillee.run(source, sub_region, &child).await }
        }))
        .buffer_unordered(ctx.config.backfill_concurrency_limit.max(1))
        .collect()
        .await;

        if interruptor.is_pulsed() {
            return Err(ReactorError::Interrupted);
        }
        if outcomes.iter().all(Result::is_ok) {
            break best_map;
        }
        tracing::warn!(%region, "primary backfill attempt failed for one or more sub-regions, retrying");
        interruptor.race(tokio::time::sleep(ctx.config.retry_backoff)).await?;
    };

    let parent_branch = best_map
        .iter()
        .next()
        .map(|(_, candidate)| candidate.version_range.latest().branch())
        .unwrap_or(BranchId::ROOT);
    ctx.history.record_branch(parent_branch, BranchId::fresh(), region);

    let broadcaster = BroadcasterCard { peer: ctx.connectivity.get_me(), addr: ctx.mailbox.new_mailbox() };
    entry.set(Activity::Primary { broadcaster, replier: None });
    let _master_entry = MasterEntry::new(ctx.master.as_ref(), region, broadcaster);
    tracing::info!(%region, "now serving as primary");

    let replier = ReplierCard { peer: ctx.connectivity.get_me(), addr: ctx.mailbox.new_mailbox() };
    entry.update_without_changing_id(Activity::Primary { broadcaster, replier: Some(replier) });

    interruptor.wait().await;
    Ok(())
}
