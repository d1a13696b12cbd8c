//! In-process [`ReplicaStore`] with the same conflict rules as the Postgres one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use super::ReplicaStore;
use crate::db::DbError;
use crate::types::auction::{
    AddressStats, EmptyAuctionRecord, LeaderboardEntry, StreamKey, TipRecord, WinnerRecord,
};

#[derive(Default)]
struct Tables {
    winners: BTreeMap<(u64, u64), WinnerRecord>,
    tips: BTreeMap<(u64, B256), TipRecord>,
    empty: BTreeMap<(u64, u64), EmptyAuctionRecord>,
    cursors: HashMap<(u64, StreamKey), u64>,
}

impl Tables {
    fn insert_winner(&mut self, winner: &WinnerRecord) {
        self.winners
            .entry((winner.chain_id, winner.auction_id))
            .or_insert_with(|| winner.clone());
        self.recompute_tips(winner.chain_id, winner.auction_id);
    }

    fn recompute_tips(&mut self, chain_id: u64, auction_id: u64) {
        let total = self
            .tips
            .values()
            .filter(|t| t.chain_id == chain_id && t.auction_id == auction_id)
            .fold(U256::ZERO, |acc, t| acc + t.amount);
        if let Some(w) = self.winners.get_mut(&(chain_id, auction_id)) {
            w.tips_received = total;
        }
    }

    fn advance(&mut self, chain_id: u64, stream: StreamKey, block: u64) {
        let cursor = self.cursors.entry((chain_id, stream)).or_insert(block);
        *cursor = (*cursor).max(block);
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn winner_count(&self) -> usize {
        self.with(|t| t.winners.len())
    }

    pub fn tip_count(&self) -> usize {
        self.with(|t| t.tips.len())
    }

    pub fn empty_ids(&self, chain_id: u64) -> Vec<u64> {
        self.with(|t| {
            t.empty
                .keys()
                .filter(|(c, _)| *c == chain_id)
                .map(|(_, id)| *id)
                .collect()
        })
    }
}

#[async_trait]
impl ReplicaStore for MemoryStore {
    async fn cursor(&self, chain_id: u64, stream: StreamKey) -> Result<Option<u64>, DbError> {
        Ok(self.with(|t| t.cursors.get(&(chain_id, stream)).copied()))
    }

    async fn apply_winner_batch(
        &self,
        chain_id: u64,
        winners: &[WinnerRecord],
        cursor: u64,
    ) -> Result<(), DbError> {
        self.with(|t| {
            for w in winners {
                t.insert_winner(w);
            }
            t.advance(chain_id, StreamKey::Winners, cursor);
        });
        Ok(())
    }

    async fn apply_tip_batch(
        &self,
        chain_id: u64,
        tips: &[TipRecord],
        cursor: u64,
    ) -> Result<(), DbError> {
        self.with(|t| {
            for tip in tips {
                t.tips
                    .entry((tip.chain_id, tip.tx_hash))
                    .or_insert_with(|| tip.clone());
            }
            for tip in tips {
                t.recompute_tips(chain_id, tip.auction_id);
            }
            t.advance(chain_id, StreamKey::Tips, cursor);
        });
        Ok(())
    }

    async fn insert_healed_winner(&self, winner: &WinnerRecord) -> Result<(), DbError> {
        self.with(|t| t.insert_winner(winner));
        Ok(())
    }

    async fn insert_empty_auction(&self, record: &EmptyAuctionRecord) -> Result<(), DbError> {
        self.with(|t| {
            t.empty
                .entry((record.chain_id, record.auction_id))
                .or_insert_with(|| record.clone());
        });
        Ok(())
    }

    async fn classified_ids(&self, chain_id: u64) -> Result<Vec<u64>, DbError> {
        Ok(self.with(|t| {
            let mut ids: Vec<u64> = t
                .winners
                .keys()
                .chain(t.empty.keys())
                .filter(|(c, _)| *c == chain_id)
                .map(|(_, id)| *id)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        }))
    }

    async fn max_classified_id(&self, chain_id: u64) -> Result<Option<u64>, DbError> {
        Ok(self.classified_ids(chain_id).await?.last().copied())
    }

    async fn reset_cursors(&self, chain_id: u64) -> Result<(), DbError> {
        self.with(|t| t.cursors.retain(|(c, _), _| *c != chain_id));
        Ok(())
    }

    async fn winners(&self, chain_id: u64) -> Result<Vec<WinnerRecord>, DbError> {
        Ok(self.with(|t| {
            t.winners
                .values()
                .rev()
                .filter(|w| w.chain_id == chain_id)
                .cloned()
                .collect()
        }))
    }

    async fn winners_by_address(
        &self,
        chain_id: u64,
        winner: Address,
    ) -> Result<Vec<WinnerRecord>, DbError> {
        Ok(self
            .winners(chain_id)
            .await?
            .into_iter()
            .filter(|w| w.winner == winner)
            .collect())
    }

    async fn tips_by_tipper(
        &self,
        chain_id: u64,
        tipper: Address,
    ) -> Result<Vec<TipRecord>, DbError> {
        Ok(self.with(|t| {
            t.tips
                .values()
                .filter(|tip| tip.chain_id == chain_id && tip.tipper == tipper)
                .cloned()
                .collect()
        }))
    }

    async fn tips_by_auction(
        &self,
        chain_id: u64,
        auction_id: u64,
    ) -> Result<Vec<TipRecord>, DbError> {
        Ok(self.with(|t| {
            t.tips
                .values()
                .filter(|tip| tip.chain_id == chain_id && tip.auction_id == auction_id)
                .cloned()
                .collect()
        }))
    }

    async fn address_stats(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<AddressStats, DbError> {
        let mut stats = AddressStats::default();
        for w in self.winners_by_address(chain_id, address).await? {
            stats.total_wins += 1;
            stats.total_winning_bids += w.winning_bid;
            stats.tips_received += w.tips_received;
        }
        for tip in self.tips_by_tipper(chain_id, address).await? {
            stats.tips_given += tip.amount;
        }
        Ok(stats)
    }

    async fn leaderboard(
        &self,
        chain_id: u64,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, DbError> {
        let mut by_winner: BTreeMap<Address, LeaderboardEntry> = BTreeMap::new();
        for w in self.winners(chain_id).await? {
            let entry = by_winner.entry(w.winner).or_insert(LeaderboardEntry {
                winner: w.winner,
                wins: 0,
                tips_received: U256::ZERO,
            });
            entry.wins += 1;
            entry.tips_received += w.tips_received;
        }
        let mut board: Vec<LeaderboardEntry> = by_winner.into_values().collect();
        board.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then(b.tips_received.cmp(&a.tips_received))
                .then(a.winner.cmp(&b.winner))
        });
        board.truncate(limit);
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    const A: Address = address!("00000000000000000000000000000000000000a1");
    const B: Address = address!("00000000000000000000000000000000000000b2");

    fn winner(auction_id: u64, who: Address) -> WinnerRecord {
        WinnerRecord {
            chain_id: 1,
            auction_id,
            winner: who,
            winning_bid: U256::from(100u64),
            text: String::new(),
            image_cid: None,
            voice_cid: None,
            block_number: auction_id,
            tx_hash: B256::with_last_byte(auction_id as u8),
            tips_received: U256::ZERO,
            created_at: 0,
        }
    }

    fn tip(auction_id: u64, tx: u8, amount: u64) -> TipRecord {
        TipRecord {
            chain_id: 1,
            auction_id,
            tipper: B,
            amount: U256::from(amount),
            block_number: 50,
            tx_hash: B256::repeat_byte(tx),
        }
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let store = MemoryStore::new();
        let mut later = winner(1, A);
        later.text = "replayed".to_string();
        store.apply_winner_batch(1, &[winner(1, A)], 5).await.unwrap();
        store.insert_healed_winner(&later).await.unwrap();

        let rows = store.winners(1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "");
    }

    #[tokio::test]
    async fn test_stats_and_leaderboard() {
        let store = MemoryStore::new();
        store
            .apply_winner_batch(1, &[winner(1, A), winner(2, B), winner(3, A)], 10)
            .await
            .unwrap();
        store
            .apply_tip_batch(1, &[tip(2, 1, 40), tip(3, 2, 5)], 10)
            .await
            .unwrap();

        let stats = store.address_stats(1, A).await.unwrap();
        assert_eq!(stats.total_wins, 2);
        assert_eq!(stats.total_winning_bids, U256::from(200u64));
        assert_eq!(stats.tips_received, U256::from(5u64));
        assert_eq!(store.address_stats(1, B).await.unwrap().tips_given, U256::from(45u64));

        let board = store.leaderboard(1, 1).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].winner, A);
        assert_eq!(board[0].wins, 2);
    }
}
