//! Rows of the auction replica.

use std::fmt;

use alloy::primitives::{Address, B256, U256};

/// Block number recorded for winners recovered through a direct contract read.
pub const UNKNOWN_BLOCK: u64 = 0;

/// Transaction hash recorded for winners recovered through a direct contract read.
pub const UNKNOWN_TX_HASH: B256 = B256::ZERO;

/// Reason stored on tombstones for auctions that settled without bids.
pub const NO_WINNER_REASON: &str = "no_winner";

/// The two event streams tracked per chain, each with its own cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Winners,
    Tips,
}

impl StreamKey {
    pub const ALL: [StreamKey; 2] = [StreamKey::Winners, StreamKey::Tips];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKey::Winners => "new_winner",
            StreamKey::Tips => "post_tipped",
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A settled auction that produced a winner, together with the post it paid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerRecord {
    pub chain_id: u64,
    pub auction_id: u64,
    pub winner: Address,
    pub winning_bid: U256,
    pub text: String,
    pub image_cid: Option<String>,
    pub voice_cid: Option<String>,
    pub block_number: u64,
    pub tx_hash: B256,
    /// Sum of all tips for this auction. Always recomputed from tip rows.
    pub tips_received: U256,
    /// Unix seconds.
    pub created_at: u64,
}

impl WinnerRecord {
    /// True when the row was backfilled from a contract read rather than an event log.
    pub fn is_healed(&self) -> bool {
        self.block_number == UNKNOWN_BLOCK && self.tx_hash == UNKNOWN_TX_HASH
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipRecord {
    pub chain_id: u64,
    pub auction_id: u64,
    pub tipper: Address,
    pub amount: U256,
    pub block_number: u64,
    pub tx_hash: B256,
}

/// Tombstone for an auction that settled without a winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyAuctionRecord {
    pub chain_id: u64,
    pub auction_id: u64,
    pub reason: String,
    /// Unix seconds.
    pub checked_at: u64,
}

/// Profile numbers for one address on one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressStats {
    pub total_wins: u64,
    pub total_winning_bids: U256,
    pub tips_received: U256,
    pub tips_given: U256,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub winner: Address,
    pub wins: u64,
    pub tips_received: U256,
}

/// Wall clock in unix seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
