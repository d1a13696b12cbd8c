use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::{Filter, Log, TransactionInput, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use crate::contract::abi::AuctionHouse;
use crate::rpc::{RpcClient, RpcError};
use crate::types::auction::StreamKey;

/// Settlement state of one auction as reported by the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionResult {
    pub settled: bool,
    pub winner: Address,
    pub winning_bid: U256,
    /// Second-highest bid, i.e. the price the winner actually paid.
    pub second_highest_bid: U256,
}

impl AuctionResult {
    pub fn has_winner(&self) -> bool {
        self.winner != Address::ZERO
    }
}

/// Read-only view of one chain's auction contract.
///
/// Everything here is a network call; implementations bound each call with a
/// timeout and surface it as [`RpcError`].
#[async_trait]
pub trait AuctionChain: Send + Sync {
    async fn head_block(&self) -> Result<u64, RpcError>;

    /// Raw logs of one stream in the inclusive block range, in chain order.
    async fn stream_logs(
        &self,
        stream: StreamKey,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, RpcError>;

    /// `NewWinner` logs for one winner address in the inclusive block range.
    async fn winner_history(
        &self,
        winner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, RpcError>;

    /// Best-effort block timestamps; blocks that could not be resolved are absent.
    async fn block_timestamps(&self, blocks: &[u64]) -> HashMap<u64, u64>;

    async fn current_auction_id(&self) -> Result<u64, RpcError>;

    async fn auction_result(&self, auction_id: u64) -> Result<AuctionResult, RpcError>;
}

/// [`AuctionChain`] backed by a JSON-RPC endpoint.
#[derive(Debug)]
pub struct ContractClient {
    rpc: RpcClient,
    address: Address,
}

impl ContractClient {
    pub fn new(rpc: RpcClient, address: Address) -> Self {
        Self { rpc, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read<C: SolCall>(&self, call: C) -> Result<C::Return, RpcError> {
        let tx = TransactionRequest::default()
            .to(self.address)
            .input(TransactionInput::new(Bytes::from(call.abi_encode())));
        let output = self.rpc.call(&tx).await?;
        C::abi_decode_returns(&output).map_err(|e| RpcError::ReturnDecode(e.to_string()))
    }
}

#[async_trait]
impl AuctionChain for ContractClient {
    async fn head_block(&self) -> Result<u64, RpcError> {
        self.rpc.get_block_number().await
    }

    async fn stream_logs(
        &self,
        stream: StreamKey,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, RpcError> {
        let signature = match stream {
            StreamKey::Winners => AuctionHouse::NewWinner::SIGNATURE_HASH,
            StreamKey::Tips => AuctionHouse::PostTipped::SIGNATURE_HASH,
        };
        let filter = Filter::new()
            .address(self.address)
            .event_signature(signature)
            .from_block(from_block)
            .to_block(to_block);
        self.rpc.get_logs(&filter).await
    }

    async fn winner_history(
        &self,
        winner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, RpcError> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(AuctionHouse::NewWinner::SIGNATURE_HASH)
            .topic1(winner.into_word())
            .from_block(from_block)
            .to_block(to_block);
        self.rpc.get_logs(&filter).await
    }

    async fn block_timestamps(&self, blocks: &[u64]) -> HashMap<u64, u64> {
        self.rpc.get_block_timestamps(blocks).await
    }

    async fn current_auction_id(&self) -> Result<u64, RpcError> {
        let id = self.read(AuctionHouse::currentAuctionIdCall {}).await?;
        u64::try_from(id)
            .map_err(|_| RpcError::ReturnDecode(format!("currentAuctionId {} exceeds u64", id)))
    }

    async fn auction_result(&self, auction_id: u64) -> Result<AuctionResult, RpcError> {
        let result = self
            .read(AuctionHouse::getAuctionResultCall {
                auctionId: U256::from(auction_id),
            })
            .await?;
        Ok(AuctionResult {
            settled: result.settled,
            winner: result.winner,
            winning_bid: result.winningBid,
            second_highest_bid: result.secondHighestBid,
        })
    }
}
