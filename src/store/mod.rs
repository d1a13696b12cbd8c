//! Persistent replica of auction outcomes.
//!
//! Four tables: winners, tips, empty-auction tombstones and per-stream sync
//! cursors. Every write path is insert-or-ignore, so replaying a batch is
//! harmless. Tip aggregates on winner rows are always recomputed from the tip
//! rows, never incremented.

#[cfg(test)]
pub mod memory;
mod postgres;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::db::DbError;
use crate::types::auction::{
    AddressStats, EmptyAuctionRecord, LeaderboardEntry, StreamKey, TipRecord, WinnerRecord,
};

pub use postgres::PgStore;

#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Last fully-processed block for a stream, `None` if never synced.
    async fn cursor(&self, chain_id: u64, stream: StreamKey) -> Result<Option<u64>, DbError>;

    /// Inserts winners (first writer wins), recomputes their tip aggregates and
    /// advances the winner cursor to `cursor`, all in one transaction.
    async fn apply_winner_batch(
        &self,
        chain_id: u64,
        winners: &[WinnerRecord],
        cursor: u64,
    ) -> Result<(), DbError>;

    /// Inserts tips keyed by tx hash, recomputes the aggregate of every touched
    /// auction and advances the tip cursor to `cursor`, all in one transaction.
    async fn apply_tip_batch(
        &self,
        chain_id: u64,
        tips: &[TipRecord],
        cursor: u64,
    ) -> Result<(), DbError>;

    /// Inserts a winner recovered outside the log stream. Cursors are untouched.
    async fn insert_healed_winner(&self, winner: &WinnerRecord) -> Result<(), DbError>;

    async fn insert_empty_auction(&self, record: &EmptyAuctionRecord) -> Result<(), DbError>;

    /// Ascending union of winner and tombstone auction ids.
    async fn classified_ids(&self, chain_id: u64) -> Result<Vec<u64>, DbError>;

    async fn max_classified_id(&self, chain_id: u64) -> Result<Option<u64>, DbError>;

    /// Drops both stream cursors for a chain so the next pass replays from the start block.
    async fn reset_cursors(&self, chain_id: u64) -> Result<(), DbError>;

    /// All winners for a chain, newest auction first.
    async fn winners(&self, chain_id: u64) -> Result<Vec<WinnerRecord>, DbError>;

    async fn winners_by_address(
        &self,
        chain_id: u64,
        winner: Address,
    ) -> Result<Vec<WinnerRecord>, DbError>;

    async fn tips_by_tipper(&self, chain_id: u64, tipper: Address)
        -> Result<Vec<TipRecord>, DbError>;

    async fn tips_by_auction(
        &self,
        chain_id: u64,
        auction_id: u64,
    ) -> Result<Vec<TipRecord>, DbError>;

    async fn address_stats(&self, chain_id: u64, address: Address)
        -> Result<AddressStats, DbError>;

    /// Top winners by win count, ties broken by tips received.
    async fn leaderboard(
        &self,
        chain_id: u64,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, DbError>;
}
