use std::collections::BTreeSet;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use tokio_postgres::Row;

use super::ReplicaStore;
use crate::db::{DbError, DbOperation, DbPool, DbValue, WhereClause};
use crate::types::auction::{
    AddressStats, EmptyAuctionRecord, LeaderboardEntry, StreamKey, TipRecord, WinnerRecord,
};

const WINNER_COLUMNS: &str = "chain_id, auction_id, winner, winning_bid::text, text, image_cid, \
     voice_cid, block_number, tx_hash, tips_received::text, \
     EXTRACT(EPOCH FROM created_at)::BIGINT";

const TIP_COLUMNS: &str = "chain_id, auction_id, tipper, amount::text, block_number, tx_hash";

const RECOMPUTE_TIPS_SQL: &str = "UPDATE auction_winners SET tips_received = \
     COALESCE((SELECT SUM(amount) FROM auction_tips WHERE chain_id = $1 AND auction_id = $2), 0) \
     WHERE chain_id = $1 AND auction_id = $2";

// GREATEST keeps the cursor monotonic even if a stale pass commits late.
const ADVANCE_CURSOR_SQL: &str = "INSERT INTO sync_cursors (chain_id, stream, last_block, updated_at) \
     VALUES ($1, $2, $3, NOW()) \
     ON CONFLICT (chain_id, stream) DO UPDATE SET \
     last_block = GREATEST(sync_cursors.last_block, EXCLUDED.last_block), updated_at = NOW()";

/// [`ReplicaStore`] on the shared Postgres pool.
pub struct PgStore {
    pool: Arc<DbPool>,
}

impl PgStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn winner_rows(&self, sql: &str, params: &[DbValue]) -> Result<Vec<WinnerRecord>, DbError> {
        self.pool
            .query(sql, params)
            .await?
            .iter()
            .map(winner_from_row)
            .collect()
    }

    async fn tip_rows(&self, sql: &str, params: &[DbValue]) -> Result<Vec<TipRecord>, DbError> {
        self.pool
            .query(sql, params)
            .await?
            .iter()
            .map(tip_from_row)
            .collect()
    }
}

fn insert_winner_op(w: &WinnerRecord) -> DbOperation {
    DbOperation::Upsert {
        table: "auction_winners".to_string(),
        columns: vec![
            "chain_id".to_string(),
            "auction_id".to_string(),
            "winner".to_string(),
            "winning_bid".to_string(),
            "text".to_string(),
            "image_cid".to_string(),
            "voice_cid".to_string(),
            "block_number".to_string(),
            "tx_hash".to_string(),
            "tips_received".to_string(),
            "created_at".to_string(),
        ],
        values: vec![
            DbValue::id(w.chain_id),
            DbValue::id(w.auction_id),
            DbValue::address(&w.winner),
            DbValue::numeric(&w.winning_bid),
            DbValue::Text(w.text.clone()),
            DbValue::optional_text(&w.image_cid),
            DbValue::optional_text(&w.voice_cid),
            DbValue::id(w.block_number),
            DbValue::hash(&w.tx_hash),
            DbValue::numeric(&U256::ZERO),
            DbValue::timestamp(w.created_at),
        ],
        conflict_columns: vec!["chain_id".to_string(), "auction_id".to_string()],
        update_columns: vec![],
    }
}

fn insert_tip_op(t: &TipRecord) -> DbOperation {
    DbOperation::Upsert {
        table: "auction_tips".to_string(),
        columns: vec![
            "chain_id".to_string(),
            "tx_hash".to_string(),
            "auction_id".to_string(),
            "tipper".to_string(),
            "amount".to_string(),
            "block_number".to_string(),
        ],
        values: vec![
            DbValue::id(t.chain_id),
            DbValue::hash(&t.tx_hash),
            DbValue::id(t.auction_id),
            DbValue::address(&t.tipper),
            DbValue::numeric(&t.amount),
            DbValue::id(t.block_number),
        ],
        conflict_columns: vec!["chain_id".to_string(), "tx_hash".to_string()],
        update_columns: vec![],
    }
}

fn recompute_tips_op(chain_id: u64, auction_id: u64) -> DbOperation {
    DbOperation::RawSql {
        query: RECOMPUTE_TIPS_SQL.to_string(),
        params: vec![DbValue::id(chain_id), DbValue::id(auction_id)],
    }
}

fn advance_cursor_op(chain_id: u64, stream: StreamKey, block: u64) -> DbOperation {
    DbOperation::RawSql {
        query: ADVANCE_CURSOR_SQL.to_string(),
        params: vec![
            DbValue::id(chain_id),
            DbValue::Text(stream.as_str().to_string()),
            DbValue::id(block),
        ],
    }
}

fn u64_col(row: &Row, idx: usize, table: &'static str) -> Result<u64, DbError> {
    let value: i64 = row.try_get(idx)?;
    u64::try_from(value).map_err(|_| DbError::corrupt(table, format!("negative value {}", value)))
}

fn u256_col(row: &Row, idx: usize, table: &'static str) -> Result<U256, DbError> {
    let text: String = row.try_get(idx)?;
    text.parse::<U256>()
        .map_err(|e| DbError::corrupt(table, format!("bad numeric {}: {}", text, e)))
}

fn address_col(row: &Row, idx: usize, table: &'static str) -> Result<Address, DbError> {
    let bytes: Vec<u8> = row.try_get(idx)?;
    if bytes.len() != 20 {
        return Err(DbError::corrupt(
            table,
            format!("address has {} bytes", bytes.len()),
        ));
    }
    Ok(Address::from_slice(&bytes))
}

fn hash_col(row: &Row, idx: usize, table: &'static str) -> Result<B256, DbError> {
    let bytes: Vec<u8> = row.try_get(idx)?;
    if bytes.len() != 32 {
        return Err(DbError::corrupt(table, format!("hash has {} bytes", bytes.len())));
    }
    Ok(B256::from_slice(&bytes))
}

fn winner_from_row(row: &Row) -> Result<WinnerRecord, DbError> {
    const T: &str = "auction_winners";
    Ok(WinnerRecord {
        chain_id: u64_col(row, 0, T)?,
        auction_id: u64_col(row, 1, T)?,
        winner: address_col(row, 2, T)?,
        winning_bid: u256_col(row, 3, T)?,
        text: row.try_get(4)?,
        image_cid: row.try_get(5)?,
        voice_cid: row.try_get(6)?,
        block_number: u64_col(row, 7, T)?,
        tx_hash: hash_col(row, 8, T)?,
        tips_received: u256_col(row, 9, T)?,
        created_at: u64_col(row, 10, T)?,
    })
}

fn tip_from_row(row: &Row) -> Result<TipRecord, DbError> {
    const T: &str = "auction_tips";
    Ok(TipRecord {
        chain_id: u64_col(row, 0, T)?,
        auction_id: u64_col(row, 1, T)?,
        tipper: address_col(row, 2, T)?,
        amount: u256_col(row, 3, T)?,
        block_number: u64_col(row, 4, T)?,
        tx_hash: hash_col(row, 5, T)?,
    })
}

#[async_trait]
impl ReplicaStore for PgStore {
    async fn cursor(&self, chain_id: u64, stream: StreamKey) -> Result<Option<u64>, DbError> {
        let rows = self
            .pool
            .query(
                "SELECT last_block FROM sync_cursors WHERE chain_id = $1 AND stream = $2",
                &[DbValue::id(chain_id), DbValue::Text(stream.as_str().to_string())],
            )
            .await?;
        rows.first()
            .map(|row| u64_col(row, 0, "sync_cursors"))
            .transpose()
    }

    async fn apply_winner_batch(
        &self,
        chain_id: u64,
        winners: &[WinnerRecord],
        cursor: u64,
    ) -> Result<(), DbError> {
        let mut ops = Vec::with_capacity(winners.len() * 2 + 1);
        for w in winners {
            ops.push(insert_winner_op(w));
            ops.push(recompute_tips_op(chain_id, w.auction_id));
        }
        ops.push(advance_cursor_op(chain_id, StreamKey::Winners, cursor));
        self.pool.execute_transaction(ops).await
    }

    async fn apply_tip_batch(
        &self,
        chain_id: u64,
        tips: &[TipRecord],
        cursor: u64,
    ) -> Result<(), DbError> {
        let touched: BTreeSet<u64> = tips.iter().map(|t| t.auction_id).collect();
        let mut ops: Vec<DbOperation> = tips.iter().map(insert_tip_op).collect();
        ops.extend(touched.into_iter().map(|id| recompute_tips_op(chain_id, id)));
        ops.push(advance_cursor_op(chain_id, StreamKey::Tips, cursor));
        self.pool.execute_transaction(ops).await
    }

    async fn insert_healed_winner(&self, winner: &WinnerRecord) -> Result<(), DbError> {
        self.pool
            .execute_transaction(vec![
                insert_winner_op(winner),
                recompute_tips_op(winner.chain_id, winner.auction_id),
            ])
            .await
    }

    async fn insert_empty_auction(&self, record: &EmptyAuctionRecord) -> Result<(), DbError> {
        self.pool
            .execute_transaction(vec![DbOperation::Upsert {
                table: "empty_auctions".to_string(),
                columns: vec![
                    "chain_id".to_string(),
                    "auction_id".to_string(),
                    "reason".to_string(),
                    "checked_at".to_string(),
                ],
                values: vec![
                    DbValue::id(record.chain_id),
                    DbValue::id(record.auction_id),
                    DbValue::Text(record.reason.clone()),
                    DbValue::timestamp(record.checked_at),
                ],
                conflict_columns: vec!["chain_id".to_string(), "auction_id".to_string()],
                update_columns: vec![],
            }])
            .await
    }

    async fn classified_ids(&self, chain_id: u64) -> Result<Vec<u64>, DbError> {
        let rows = self
            .pool
            .query(
                "SELECT auction_id FROM auction_winners WHERE chain_id = $1 \
                 UNION \
                 SELECT auction_id FROM empty_auctions WHERE chain_id = $1 \
                 ORDER BY 1",
                &[DbValue::id(chain_id)],
            )
            .await?;
        rows.iter()
            .map(|row| u64_col(row, 0, "auction_winners"))
            .collect()
    }

    async fn max_classified_id(&self, chain_id: u64) -> Result<Option<u64>, DbError> {
        let rows = self
            .pool
            .query(
                "SELECT MAX(auction_id) FROM ( \
                 SELECT auction_id FROM auction_winners WHERE chain_id = $1 \
                 UNION ALL \
                 SELECT auction_id FROM empty_auctions WHERE chain_id = $1) ids",
                &[DbValue::id(chain_id)],
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let max: Option<i64> = row.try_get(0)?;
        max.map(|v| {
            u64::try_from(v)
                .map_err(|_| DbError::corrupt("auction_winners", format!("negative id {}", v)))
        })
        .transpose()
    }

    async fn reset_cursors(&self, chain_id: u64) -> Result<(), DbError> {
        self.pool
            .execute_transaction(vec![DbOperation::Delete {
                table: "sync_cursors".to_string(),
                where_clause: WhereClause::Eq("chain_id".to_string(), DbValue::id(chain_id)),
            }])
            .await
    }

    async fn winners(&self, chain_id: u64) -> Result<Vec<WinnerRecord>, DbError> {
        self.winner_rows(
            &format!(
                "SELECT {} FROM auction_winners WHERE chain_id = $1 ORDER BY auction_id DESC",
                WINNER_COLUMNS
            ),
            &[DbValue::id(chain_id)],
        )
        .await
    }

    async fn winners_by_address(
        &self,
        chain_id: u64,
        winner: Address,
    ) -> Result<Vec<WinnerRecord>, DbError> {
        self.winner_rows(
            &format!(
                "SELECT {} FROM auction_winners WHERE chain_id = $1 AND winner = $2 \
                 ORDER BY auction_id DESC",
                WINNER_COLUMNS
            ),
            &[DbValue::id(chain_id), DbValue::address(&winner)],
        )
        .await
    }

    async fn tips_by_tipper(
        &self,
        chain_id: u64,
        tipper: Address,
    ) -> Result<Vec<TipRecord>, DbError> {
        self.tip_rows(
            &format!(
                "SELECT {} FROM auction_tips WHERE chain_id = $1 AND tipper = $2 \
                 ORDER BY block_number DESC, tx_hash",
                TIP_COLUMNS
            ),
            &[DbValue::id(chain_id), DbValue::address(&tipper)],
        )
        .await
    }

    async fn tips_by_auction(
        &self,
        chain_id: u64,
        auction_id: u64,
    ) -> Result<Vec<TipRecord>, DbError> {
        self.tip_rows(
            &format!(
                "SELECT {} FROM auction_tips WHERE chain_id = $1 AND auction_id = $2 \
                 ORDER BY block_number DESC, tx_hash",
                TIP_COLUMNS
            ),
            &[DbValue::id(chain_id), DbValue::id(auction_id)],
        )
        .await
    }

    async fn address_stats(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<AddressStats, DbError> {
        const T: &str = "auction_winners";
        let rows = self
            .pool
            .query(
                "SELECT \
                 (SELECT COUNT(*) FROM auction_winners WHERE chain_id = $1 AND winner = $2), \
                 (SELECT COALESCE(SUM(winning_bid), 0)::text FROM auction_winners \
                  WHERE chain_id = $1 AND winner = $2), \
                 (SELECT COALESCE(SUM(tips_received), 0)::text FROM auction_winners \
                  WHERE chain_id = $1 AND winner = $2), \
                 (SELECT COALESCE(SUM(amount), 0)::text FROM auction_tips \
                  WHERE chain_id = $1 AND tipper = $2)",
                &[DbValue::id(chain_id), DbValue::address(&address)],
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(AddressStats::default());
        };
        Ok(AddressStats {
            total_wins: u64_col(row, 0, T)?,
            total_winning_bids: u256_col(row, 1, T)?,
            tips_received: u256_col(row, 2, T)?,
            tips_given: u256_col(row, 3, "auction_tips")?,
        })
    }

    async fn leaderboard(
        &self,
        chain_id: u64,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, DbError> {
        const T: &str = "auction_winners";
        let rows = self
            .pool
            .query(
                "SELECT winner, COUNT(*), SUM(tips_received)::text FROM auction_winners \
                 WHERE chain_id = $1 GROUP BY winner \
                 ORDER BY COUNT(*) DESC, SUM(tips_received) DESC, winner \
                 LIMIT $2",
                &[DbValue::id(chain_id), DbValue::Int64(limit as i64)],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(LeaderboardEntry {
                    winner: address_col(row, 0, T)?,
                    wins: u64_col(row, 1, T)?,
                    tips_received: u256_col(row, 2, T)?,
                })
            })
            .collect()
    }
}
