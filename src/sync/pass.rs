use super::catchup::{catch_up, heal_ids, BackfillTally};
use super::context::ChainContext;
use super::error::SyncError;
use super::gaps::find_missing;
use super::logs::{sync_stream, StreamOutcome};
use crate::types::auction::StreamKey;

/// Summary of one chain pass.
#[derive(Debug, Default)]
pub struct PassReport {
    pub streams: Vec<(StreamKey, Result<StreamOutcome, SyncError>)>,
    /// Unclassified ids below the lowest classified id.
    pub leading_found: usize,
    pub gaps_found: usize,
    pub backfill: BackfillTally,
}

impl PassReport {
    pub fn stream_failures(&self) -> usize {
        self.streams.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Syncs both streams, repairs missing ids below the highest classified one,
/// then catches up to the newest settled auction. A failed stream does not
/// stop the remaining steps. Only a store failure during gap detection ends
/// the pass early.
///
/// Repair looks at no more ids than the backfill budget allows, oldest first.
/// Only ids that end up classified are charged, so a gap that keeps failing
/// cannot starve catch-up.
pub async fn run_chain_pass(ctx: &ChainContext) -> Result<PassReport, SyncError> {
    let mut report = PassReport::default();

    for stream in StreamKey::ALL {
        let result = sync_stream(ctx, stream).await;
        match &result {
            Ok(StreamOutcome::Applied {
                from_block,
                to_block,
                records,
                skipped,
            }) => tracing::info!(
                "Chain {} {}: blocks {}..={} applied, {} records, {} skipped",
                ctx.name(),
                stream,
                from_block,
                to_block,
                records,
                skipped
            ),
            Ok(StreamOutcome::UpToDate) => {}
            Err(e) if e.is_transient() => {
                tracing::warn!("Chain {} {}: sync aborted: {}", ctx.name(), stream, e)
            }
            Err(e) => tracing::error!("Chain {} {}: sync failed: {}", ctx.name(), stream, e),
        }
        report.streams.push((stream, result));
    }

    let mut budget = ctx.options.max_backfill_per_pass;

    let missing = find_missing(ctx).await?;
    report.leading_found = missing.leading.len();
    report.gaps_found = missing.gaps.len();
    if !missing.is_empty() {
        let mut ids = missing.into_ordered();
        tracing::warn!(
            "Chain {}: {} missing auction ids ({} before the first known), first {:?}",
            ctx.name(),
            ids.len(),
            report.leading_found,
            &ids[..ids.len().min(10)]
        );
        if let Some(limit) = budget {
            ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        let tally = heal_ids(ctx, &ids).await;
        budget = budget.map(|b| b.saturating_sub(tally.classified() as u64));
        report.backfill.merge(tally);
    }

    match catch_up(ctx, budget).await {
        Ok(tally) => report.backfill.merge(tally),
        Err(e) => tracing::warn!("Chain {}: catch-up aborted: {}", ctx.name(), e),
    }

    if report.backfill.attempted() > 0 {
        tracing::info!("Chain {}: backfill {}", ctx.name(), report.backfill);
    }
    Ok(report)
}
