//! Event log syncer.
//!
//! Each stream moves from its cursor to the chain head in one window. The
//! window's rows and the new cursor value are committed together, so a pass
//! that fails anywhere leaves the cursor where it was and the next pass
//! re-fetches the same window.

use std::collections::BTreeSet;

use alloy::rpc::types::Log;

use super::context::ChainContext;
use super::error::SyncError;
use crate::decoding::{DecodeError, TipEvent, WinnerEvent};
use crate::types::auction::{unix_now, StreamKey, TipRecord, WinnerRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Head has not moved past the cursor; nothing was written.
    UpToDate,
    Applied {
        from_block: u64,
        to_block: u64,
        /// Rows offered to the store (duplicates are ignored there).
        records: usize,
        /// Logs dropped by the skip-and-log policy.
        skipped: usize,
    },
}

/// Syncs one stream for one chain.
pub async fn sync_stream(ctx: &ChainContext, stream: StreamKey) -> Result<StreamOutcome, SyncError> {
    let cursor = ctx
        .store
        .cursor(ctx.chain_id(), stream)
        .await?
        .unwrap_or_else(|| ctx.chain.initial_cursor());

    let head = ctx.client.head_block().await?;
    if head <= cursor {
        tracing::debug!(
            "Chain {} {}: head {} not past cursor {}",
            ctx.name(),
            stream,
            head,
            cursor
        );
        return Ok(StreamOutcome::UpToDate);
    }

    let from_block = cursor + 1;
    let to_block = match ctx.options.max_block_range {
        Some(range) => head.min(cursor.saturating_add(range)),
        None => head,
    };

    let logs = ctx.client.stream_logs(stream, from_block, to_block).await?;

    let (records, skipped) = match stream {
        StreamKey::Winners => apply_winners(ctx, &logs, to_block).await?,
        StreamKey::Tips => apply_tips(ctx, &logs, to_block).await?,
    };

    Ok(StreamOutcome::Applied {
        from_block,
        to_block,
        records,
        skipped,
    })
}

/// Decodes a batch in fetch order. Skippable logs are dropped with a warning;
/// anything else aborts the whole batch.
fn decode_batch<E>(ctx: &ChainContext, logs: &[Log]) -> Result<(Vec<E>, usize), DecodeError>
where
    E: for<'a> TryFrom<&'a Log, Error = DecodeError>,
{
    let mut events = Vec::with_capacity(logs.len());
    let mut skipped = 0;
    for log in logs {
        match E::try_from(log) {
            Ok(event) => events.push(event),
            Err(e) if e.is_skippable() => {
                tracing::warn!("Chain {}: skipping log: {}", ctx.name(), e);
                skipped += 1;
            }
            Err(e) => {
                tracing::error!(
                    "Chain {}: undecodable log, batch not applied: {}",
                    ctx.name(),
                    e
                );
                return Err(e);
            }
        }
    }
    Ok((events, skipped))
}

async fn apply_winners(
    ctx: &ChainContext,
    logs: &[Log],
    to_block: u64,
) -> Result<(usize, usize), SyncError> {
    let (events, skipped) = decode_batch::<WinnerEvent>(ctx, logs)?;

    let (events, empty): (Vec<WinnerEvent>, Vec<WinnerEvent>) =
        events.into_iter().partition(WinnerEvent::has_winner);
    for event in &empty {
        tracing::debug!(
            "Chain {}: auction {} settled without a winner",
            ctx.name(),
            event.auction_id
        );
    }

    let unresolved: Vec<u64> = events
        .iter()
        .filter(|e| e.block_timestamp.is_none())
        .map(|e| e.block_number)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let timestamps = if unresolved.is_empty() {
        Default::default()
    } else {
        ctx.client.block_timestamps(&unresolved).await
    };

    let now = unix_now();
    let records: Vec<WinnerRecord> = events
        .into_iter()
        .map(|event| {
            let created_at = event
                .block_timestamp
                .or_else(|| timestamps.get(&event.block_number).copied())
                .unwrap_or_else(|| {
                    tracing::warn!(
                        "Chain {}: no timestamp for block {}, using wall clock",
                        ctx.name(),
                        event.block_number
                    );
                    now
                });
            event.into_record(ctx.chain_id(), created_at)
        })
        .collect();

    ctx.store
        .apply_winner_batch(ctx.chain_id(), &records, to_block)
        .await?;
    Ok((records.len(), skipped))
}

async fn apply_tips(
    ctx: &ChainContext,
    logs: &[Log],
    to_block: u64,
) -> Result<(usize, usize), SyncError> {
    let (events, skipped) = decode_batch::<TipEvent>(ctx, logs)?;
    let records: Vec<TipRecord> = events
        .into_iter()
        .map(|e| e.into_record(ctx.chain_id()))
        .collect();

    ctx.store
        .apply_tip_batch(ctx.chain_id(), &records, to_block)
        .await?;
    Ok((records.len(), skipped))
}
