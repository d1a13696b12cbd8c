//! Backfill drivers: heal a list of ids, and close the trailing range between
//! the highest classified id and the newest settled auction.

use std::fmt;

use super::context::ChainContext;
use super::error::SyncError;
use super::healer::{heal, HealOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillTally {
    pub healed: usize,
    pub no_winner: usize,
    pub pending: usize,
    pub failed: usize,
}

impl BackfillTally {
    pub fn attempted(&self) -> usize {
        self.healed + self.no_winner + self.pending + self.failed
    }

    /// Ids that ended up classified. Only these count against the backfill
    /// budget.
    pub fn classified(&self) -> usize {
        self.healed + self.no_winner
    }

    fn record(&mut self, outcome: &HealOutcome) {
        match outcome {
            HealOutcome::Healed(_) => self.healed += 1,
            HealOutcome::NoWinner => self.no_winner += 1,
            HealOutcome::StillPending => self.pending += 1,
            HealOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: BackfillTally) {
        self.healed += other.healed;
        self.no_winner += other.no_winner;
        self.pending += other.pending;
        self.failed += other.failed;
    }
}

impl fmt::Display for BackfillTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "healed={} no_winner={} pending={} failed={}",
            self.healed, self.no_winner, self.pending, self.failed
        )
    }
}

/// Heals ids one at a time in the given order. A failed id is logged and
/// counted; the rest still run.
pub async fn heal_ids(ctx: &ChainContext, ids: &[u64]) -> BackfillTally {
    let mut tally = BackfillTally::default();
    for &auction_id in ids {
        let outcome = heal(ctx, auction_id).await;
        match &outcome {
            HealOutcome::Healed(record) => tracing::info!(
                "Chain {}: healed auction {} (winner {})",
                ctx.name(),
                auction_id,
                record.winner
            ),
            HealOutcome::NoWinner => tracing::info!(
                "Chain {}: auction {} settled without a winner",
                ctx.name(),
                auction_id
            ),
            HealOutcome::StillPending => tracing::debug!(
                "Chain {}: auction {} not settled yet",
                ctx.name(),
                auction_id
            ),
            HealOutcome::Failed(e) => tracing::warn!(
                "Chain {}: failed to heal auction {}: {}",
                ctx.name(),
                auction_id,
                e
            ),
        }
        tally.record(&outcome);
    }
    tally
}

/// Heals every id from the highest classified id up to `currentAuctionId - 1`,
/// oldest first, at most `limit` of them. The live auction is never touched.
pub async fn catch_up(ctx: &ChainContext, limit: Option<u64>) -> Result<BackfillTally, SyncError> {
    let current = ctx.client.current_auction_id().await?;
    let target = current.saturating_sub(1);
    let max_known = ctx.store.max_classified_id(ctx.chain_id()).await?.unwrap_or(0);

    if target <= max_known {
        return Ok(BackfillTally::default());
    }

    let mut end = target;
    if let Some(limit) = limit {
        if limit == 0 {
            return Ok(BackfillTally::default());
        }
        end = end.min(max_known.saturating_add(limit));
    }

    tracing::info!(
        "Chain {}: catching up auctions {}..={} (target {})",
        ctx.name(),
        max_known + 1,
        end,
        target
    );
    let ids: Vec<u64> = (max_known + 1..=end).collect();
    Ok(heal_ids(ctx, &ids).await)
}
