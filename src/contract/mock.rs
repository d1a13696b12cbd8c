//! Scripted [`AuctionChain`] and log builders for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;

use crate::contract::abi::AuctionHouse;
use crate::contract::client::{AuctionChain, AuctionResult};
use crate::rpc::RpcError;
use crate::types::auction::StreamKey;

fn rpc_log(contract: Address, block: u64, tx: B256, data: alloy::primitives::LogData) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: contract,
            data,
        },
        block_number: Some(block),
        transaction_hash: Some(tx),
        ..Default::default()
    }
}

#[allow(clippy::too_many_arguments)]
pub fn winner_log(
    contract: Address,
    block: u64,
    tx: B256,
    winner: Address,
    auction_id: u64,
    winning_bid: u64,
    text: &str,
    image_cid: &str,
    voice_cid: &str,
) -> Log {
    let event = AuctionHouse::NewWinner {
        winner,
        auctionId: U256::from(auction_id),
        winningBid: U256::from(winning_bid),
        text: text.to_string(),
        imageCid: image_cid.to_string(),
        voiceCid: voice_cid.to_string(),
    };
    rpc_log(contract, block, tx, event.encode_log_data())
}

pub fn tip_log(
    contract: Address,
    block: u64,
    tx: B256,
    auction_id: u64,
    tipper: Address,
    amount: u64,
) -> Log {
    tip_log_raw(
        contract,
        block,
        tx,
        U256::from(auction_id),
        tipper,
        U256::from(amount),
    )
}

pub fn tip_log_raw(
    contract: Address,
    block: u64,
    tx: B256,
    auction_id: U256,
    tipper: Address,
    amount: U256,
) -> Log {
    let event = AuctionHouse::PostTipped {
        auctionId: auction_id,
        tipper,
        amount,
    };
    rpc_log(contract, block, tx, event.encode_log_data())
}

#[derive(Default)]
struct MockState {
    head: u64,
    winner_logs: Vec<Log>,
    tip_logs: Vec<Log>,
    timestamps: HashMap<u64, u64>,
    current_auction_id: u64,
    results: HashMap<u64, AuctionResult>,
    failing_results: HashSet<u64>,
    fail_everything: bool,
    fail_history: bool,
    max_history_range: Option<u64>,
    result_reads: Vec<u64>,
    history_ranges: Vec<(u64, u64)>,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

fn unavailable(what: &str) -> RpcError {
    RpcError::Transport(format!("mock endpoint unavailable: {}", what))
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_head(&self, head: u64) {
        self.with_state(|s| s.head = head);
    }

    pub fn push_log(&self, stream: StreamKey, log: Log) {
        self.with_state(|s| match stream {
            StreamKey::Winners => s.winner_logs.push(log),
            StreamKey::Tips => s.tip_logs.push(log),
        });
    }

    pub fn set_timestamp(&self, block: u64, timestamp: u64) {
        self.with_state(|s| s.timestamps.insert(block, timestamp));
    }

    pub fn set_current_auction_id(&self, id: u64) {
        self.with_state(|s| s.current_auction_id = id);
    }

    pub fn set_result(&self, auction_id: u64, result: AuctionResult) {
        self.with_state(|s| s.results.insert(auction_id, result));
    }

    pub fn settle_with_winner(&self, auction_id: u64, winner: Address, winning_bid: u64) {
        self.set_result(
            auction_id,
            AuctionResult {
                settled: true,
                winner,
                winning_bid: U256::from(winning_bid),
                second_highest_bid: U256::from(winning_bid / 2),
            },
        );
    }

    pub fn settle_empty(&self, auction_id: u64) {
        self.set_result(
            auction_id,
            AuctionResult {
                settled: true,
                winner: Address::ZERO,
                winning_bid: U256::ZERO,
                second_highest_bid: U256::ZERO,
            },
        );
    }

    pub fn fail_result(&self, auction_id: u64) {
        self.with_state(|s| s.failing_results.insert(auction_id));
    }

    pub fn fail_everything(&self) {
        self.with_state(|s| s.fail_everything = true);
    }

    pub fn fail_history(&self) {
        self.with_state(|s| s.fail_history = true);
    }

    /// Rejects `winner_history` calls spanning more than `blocks` blocks, the
    /// way hosted providers cap `eth_getLogs`.
    pub fn reject_history_wider_than(&self, blocks: u64) {
        self.with_state(|s| s.max_history_range = Some(blocks));
    }

    /// Block ranges passed to `winner_history`, in call order.
    pub fn history_ranges(&self) -> Vec<(u64, u64)> {
        self.with_state(|s| s.history_ranges.clone())
    }

    /// Auction ids passed to `auction_result`, in call order.
    pub fn result_reads(&self) -> Vec<u64> {
        self.with_state(|s| s.result_reads.clone())
    }
}

#[async_trait]
impl AuctionChain for MockChain {
    async fn head_block(&self) -> Result<u64, RpcError> {
        self.with_state(|s| {
            if s.fail_everything {
                return Err(unavailable("eth_blockNumber"));
            }
            Ok(s.head)
        })
    }

    async fn stream_logs(
        &self,
        stream: StreamKey,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, RpcError> {
        self.with_state(|s| {
            if s.fail_everything {
                return Err(unavailable("eth_getLogs"));
            }
            let logs = match stream {
                StreamKey::Winners => &s.winner_logs,
                StreamKey::Tips => &s.tip_logs,
            };
            Ok(logs
                .iter()
                .filter(|log| {
                    log.block_number
                        .map_or(true, |b| b >= from_block && b <= to_block)
                })
                .cloned()
                .collect())
        })
    }

    async fn winner_history(
        &self,
        winner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, RpcError> {
        self.with_state(|s| {
            s.history_ranges.push((from_block, to_block));
            if s.fail_everything || s.fail_history {
                return Err(unavailable("eth_getLogs"));
            }
            if let Some(max) = s.max_history_range {
                if to_block.saturating_sub(from_block) + 1 > max {
                    return Err(RpcError::ProviderError(format!(
                        "block range {}..={} exceeds {} blocks",
                        from_block, to_block, max
                    )));
                }
            }
            Ok(s.winner_logs
                .iter()
                .filter(|log| log.topics().get(1) == Some(&winner.into_word()))
                .filter(|log| {
                    let block = log.block_number.unwrap_or_default();
                    block >= from_block && block <= to_block
                })
                .cloned()
                .collect())
        })
    }

    async fn block_timestamps(&self, blocks: &[u64]) -> HashMap<u64, u64> {
        self.with_state(|s| {
            if s.fail_everything {
                return HashMap::new();
            }
            blocks
                .iter()
                .filter_map(|b| s.timestamps.get(b).map(|ts| (*b, *ts)))
                .collect()
        })
    }

    async fn current_auction_id(&self) -> Result<u64, RpcError> {
        self.with_state(|s| {
            if s.fail_everything {
                return Err(unavailable("currentAuctionId"));
            }
            Ok(s.current_auction_id)
        })
    }

    async fn auction_result(&self, auction_id: u64) -> Result<AuctionResult, RpcError> {
        self.with_state(|s| {
            s.result_reads.push(auction_id);
            if s.fail_everything || s.failing_results.contains(&auction_id) {
                return Err(unavailable("getAuctionResult"));
            }
            Ok(s.results.get(&auction_id).cloned().unwrap_or(AuctionResult {
                settled: false,
                winner: Address::ZERO,
                winning_bid: U256::ZERO,
                second_highest_bid: U256::ZERO,
            }))
        })
    }
}
