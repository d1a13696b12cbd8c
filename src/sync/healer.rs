//! Backfills one auction id from a direct contract read.

use alloy::primitives::Address;

use super::context::ChainContext;
use super::error::SyncError;
use crate::decoding::WinnerEvent;
use crate::types::auction::{
    unix_now, EmptyAuctionRecord, WinnerRecord, NO_WINNER_REASON, UNKNOWN_BLOCK, UNKNOWN_TX_HASH,
};

#[derive(Debug)]
pub enum HealOutcome {
    Healed(WinnerRecord),
    /// Settled without bids; a tombstone was written.
    NoWinner,
    /// Not settled yet. Nothing written; the id stays a gap.
    StillPending,
    /// Nothing written; the id is retried on a later pass.
    Failed(SyncError),
}

pub async fn heal(ctx: &ChainContext, auction_id: u64) -> HealOutcome {
    match try_heal(ctx, auction_id).await {
        Ok(outcome) => outcome,
        Err(e) => HealOutcome::Failed(e),
    }
}

async fn try_heal(ctx: &ChainContext, auction_id: u64) -> Result<HealOutcome, SyncError> {
    let result = ctx.client.auction_result(auction_id).await?;

    if !result.settled {
        return Ok(HealOutcome::StillPending);
    }

    if !result.has_winner() {
        ctx.store
            .insert_empty_auction(&EmptyAuctionRecord {
                chain_id: ctx.chain_id(),
                auction_id,
                reason: NO_WINNER_REASON.to_string(),
                checked_at: unix_now(),
            })
            .await?;
        return Ok(HealOutcome::NoWinner);
    }

    let original = find_original_post(ctx, result.winner, auction_id).await?;

    if original.is_none() {
        tracing::warn!(
            "Chain {}: no NewWinner log found for auction {}, storing without post content",
            ctx.name(),
            auction_id
        );
    }
    let (text, image_cid, voice_cid) = match original {
        Some(event) => (event.text, event.image_cid, event.voice_cid),
        None => (String::new(), None, None),
    };

    let record = WinnerRecord {
        chain_id: ctx.chain_id(),
        auction_id,
        winner: result.winner,
        winning_bid: result.winning_bid,
        text,
        image_cid,
        voice_cid,
        block_number: UNKNOWN_BLOCK,
        tx_hash: UNKNOWN_TX_HASH,
        tips_received: alloy::primitives::U256::ZERO,
        created_at: unix_now(),
    };
    ctx.store.insert_healed_winner(&record).await?;
    Ok(HealOutcome::Healed(record))
}

/// Walks the winner's `NewWinner` history from the chain's start block to the
/// head in `max_block_range` windows, oldest first, stopping at the first log
/// for `auction_id`.
async fn find_original_post(
    ctx: &ChainContext,
    winner: Address,
    auction_id: u64,
) -> Result<Option<WinnerEvent>, SyncError> {
    let head = ctx.client.head_block().await?;
    let mut from_block = ctx.chain.start_block.unwrap_or(0);
    let span = ctx.options.max_block_range.unwrap_or(u64::MAX);

    while from_block <= head {
        let to_block = from_block.saturating_add(span - 1).min(head);
        let history = ctx.client.winner_history(winner, from_block, to_block).await?;
        let found = history
            .iter()
            .filter_map(|log| WinnerEvent::try_from(log).ok())
            .find(|event| event.auction_id == auction_id);
        if found.is_some() {
            return Ok(found);
        }
        if to_block == u64::MAX {
            break;
        }
        from_block = to_block + 1;
    }
    Ok(None)
}
