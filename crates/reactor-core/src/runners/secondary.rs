//! `be_secondary`: SPEC_FULL.md §4.E.2.

use crate::activity::Activity;
use crate::blueprint::Blueprint;
use crate::directory::{find_backfiller, find_broadcaster};
use crate::entry::DirectoryEntry;
use crate::error::ReactorResult;
use crate::interruptor::Interruptor;
use crate::mailbox::BackfillerCard;
use crate::region::Region;
use crate::runners::RunnerContext;
use crate::version::VersionRange;

/// Drives `region` through the secondary role: stays `secondary_without_primary` until a primary
/// shows up, backfills from it, then serves as `secondary_up_to_date` until interrupted.
///
/// A source that disappears or fails mid-backfill sends this runner back to
/// `secondary_without_primary` to look for another candidate — it never surfaces a
/// `ResourceLost` backfill failure to its caller.
#[tracing::instrument(skip(ctx, blueprint, interruptor), fields(%region))]
pub async fn be_secondary(
    ctx: &RunnerContext,
    region: Region,
    blueprint: &Blueprint,
    interruptor: &Interruptor,
) -> ReactorResult<()> {
    let mut entry = DirectoryEntry::new(ctx.directory.handle(), region);
    let our_backfiller = BackfillerCard { peer: ctx.connectivity.get_me(), addr: ctx.mailbox.new_mailbox() };

    loop {
        let metainfo = ctx.store.read_metainfo(interruptor).await?;
        let current_state =
            metainfo.restrict(region).into_iter().map(|(_, v)| v).next().unwrap_or(VersionRange::EMPTY);
        entry.set(Activity::SecondaryWithoutPrimary { current_state, backfiller: our_backfiller });

        ctx.directory
            .run_until_satisfied(
                |snapshot| find_broadcaster(snapshot, blueprint, region).map(|_| ()),
                interruptor,
            )
            .await?;

        let me = ctx.connectivity.get_me();
        let source = ctx
            .directory
            .run_until_satisfied(
                |snapshot| {
                    find_backfiller(snapshot, blueprint, region, ctx.history.as_ref(), current_state)
                        .filter(|b| b.peer != me)
                },
                interruptor,
            )
            .await?;

        match ctx.backfillee.run(source, region, interruptor).await {
            Ok(()) => {
                entry.set(Activity::SecondaryUpToDate { backfiller: our_backfiller });
                tracing::info!(%region, "caught up, now serving as secondary");
                interruptor.wait().await;
                return Ok(());
            }
            Err(err) if err.is_interrupted() => return Err(err),
            Err(err) => {
                tracing::warn!(%region, %err, "lost backfill source, reverting to secondary_without_primary");
                interruptor.race(tokio::time::sleep(ctx.config.retry_backoff)).await?;
            }
        }
    }
}
