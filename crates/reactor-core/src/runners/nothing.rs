//! `be_nothing`: SPEC_FULL.md §4.E.3.

use crate::activity::Activity;
use crate::blueprint::Blueprint;
use crate::entry::DirectoryEntry;
use crate::error::ReactorResult;
use crate::interruptor::Interruptor;
use crate::mailbox::BackfillerCard;
use crate::region::Region;
use crate::runners::RunnerContext;
use crate::safety::is_safe_for_us_to_be_nothing;
use crate::version::VersionRange;

/// Drives `region` through the nothing role: erases any local data once every peer already holds
/// a durable copy, then advertises `nothing` until interrupted.
#[tracing::instrument(skip(ctx, blueprint, interruptor), fields(%region))]
pub async fn be_nothing(
    ctx: &RunnerContext,
    region: Region,
    blueprint: &Blueprint,
    interruptor: &Interruptor,
) -> ReactorResult<()> {
    let mut entry = DirectoryEntry::new(ctx.directory.handle(), region);
    let our_backfiller = BackfillerCard { peer: ctx.connectivity.get_me(), addr: ctx.mailbox.new_mailbox() };

    let metainfo = ctx.store.read_metainfo(interruptor).await?;
    let restricted = metainfo.restrict(region);
    let has_data = restricted.iter().any(|(_, v)| *v != VersionRange::EMPTY);

    if has_data {
        let current_state = restricted.into_iter().map(|(_, v)| v).next().unwrap_or(VersionRange::EMPTY);
        entry.set(Activity::NothingWhenSafe { current_state, backfiller: our_backfiller });

        ctx.directory
            .run_until_satisfied(
                |snapshot| {
                    is_safe_for_us_to_be_nothing(snapshot, blueprint, region, ctx.connectivity.get_me())
                        .then_some(())
                },
                interruptor,
            )
            .await?;

        entry.set(Activity::NothingWhenDoneErasing);
        let token = interruptor.race(ctx.store.new_write_token()).await?;
        ctx.store.erase_region(token, region).await?;
        tracing::info!(%region, "erased local copy");
    }

    entry.set(Activity::Nothing);
    interruptor.wait().await;
    Ok(())
}
