//! Per-chain execution context.
//!
//! Every sync step receives the chain it works on explicitly; there is no
//! process-wide chain state.

use std::sync::Arc;

use crate::contract::AuctionChain;
use crate::store::ReplicaStore;
use crate::types::config::chain::ChainConfig;
use crate::types::config::indexer::SyncConfig;

/// Tunables that bound how much work one pass does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum blocks fetched per stream per pass. `None` fetches up to the head.
    pub max_block_range: Option<u64>,
    /// Maximum heal calls per pass across gap repair and catch-up.
    pub max_backfill_per_pass: Option<u64>,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_block_range: config.max_block_range.filter(|r| *r > 0),
            max_backfill_per_pass: config.max_backfill_per_pass,
        }
    }
}

#[derive(Clone)]
pub struct ChainContext {
    pub chain: Arc<ChainConfig>,
    pub client: Arc<dyn AuctionChain>,
    pub store: Arc<dyn ReplicaStore>,
    pub options: SyncOptions,
}

impl ChainContext {
    pub fn new(
        chain: ChainConfig,
        client: Arc<dyn AuctionChain>,
        store: Arc<dyn ReplicaStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            chain: Arc::new(chain),
            client,
            store,
            options,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id
    }

    pub fn name(&self) -> &str {
        &self.chain.name
    }
}

#[cfg(test)]
pub(crate) fn test_context(
    chain_id: u64,
    client: Arc<dyn AuctionChain>,
    store: Arc<dyn ReplicaStore>,
) -> ChainContext {
    ChainContext::new(
        ChainConfig {
            name: format!("test-{}", chain_id),
            chain_id,
            rpc_url_env_var: "UNUSED_RPC_URL".to_string(),
            contract_address: Some(alloy::primitives::Address::repeat_byte(0xcc)),
            start_block: None,
        },
        client,
        store,
        SyncOptions::default(),
    )
}
