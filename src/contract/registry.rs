//! Chain client factory.
//!
//! Resolves a chain id from the configured allow-list into a read-only
//! contract client. A chain without a contract address is disabled, which is
//! reported as `Ok(None)` rather than an error.

use std::env;
use std::num::NonZeroU32;

use thiserror::Error;
use url::Url;

use crate::contract::client::ContractClient;
use crate::rpc::{RateLimitConfig, RetryConfig, RpcClient, RpcClientConfig};
use crate::types::config::chain::ChainConfig;
use crate::types::config::indexer::SyncConfig;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("chain {0} is not in the configured chain list")]
    UnknownChain(u64),

    #[error("env var {var} not set for chain {chain}")]
    MissingRpcUrl { chain: String, var: String },

    #[error("invalid RPC url for chain {chain}: {message}")]
    InvalidRpcUrl { chain: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainConfig>,
    sync: SyncConfig,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainConfig>, sync: SyncConfig) -> Self {
        Self { chains, sync }
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn chain(&self, chain_id: u64) -> Result<&ChainConfig, RegistryError> {
        self.chains
            .iter()
            .find(|c| c.chain_id == chain_id)
            .ok_or(RegistryError::UnknownChain(chain_id))
    }

    /// Builds the client for a chain. No network traffic happens here.
    pub fn client(&self, chain_id: u64) -> Result<Option<ContractClient>, RegistryError> {
        let chain = self.chain(chain_id)?;
        let Some(address) = chain.contract_address else {
            return Ok(None);
        };

        let rpc_url = env::var(&chain.rpc_url_env_var).map_err(|_| RegistryError::MissingRpcUrl {
            chain: chain.name.clone(),
            var: chain.rpc_url_env_var.clone(),
        })?;
        let rpc_url = Url::parse(&rpc_url).map_err(|e| RegistryError::InvalidRpcUrl {
            chain: chain.name.clone(),
            message: e.to_string(),
        })?;

        Ok(Some(ContractClient::new(
            RpcClient::new(self.rpc_config(rpc_url)),
            address,
        )))
    }

    fn rpc_config(&self, url: Url) -> RpcClientConfig {
        let mut config = RpcClientConfig::new(url)
            .with_timeout(self.sync.rpc_timeout())
            .with_retry(RetryConfig::new(self.sync.max_retries));
        if let Some(rps) = self.sync.requests_per_second.and_then(NonZeroU32::new) {
            config = config.with_rate_limit(RateLimitConfig::per_second(rps));
        }
        config
    }
}
