use std::env;
use std::str::FromStr;

use alloy::primitives::Address;
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfigRaw {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    /// Inline contract address. Takes precedence over `contract_address_env_var`.
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub contract_address_env_var: Option<String>,
    /// Deployment block of the auction contract.
    #[serde(default)]
    pub start_block: Option<u64>,
}

/// Per-chain settings, resolved once at startup and passed explicitly into
/// every sync operation for that chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    /// `None` means the chain is disabled.
    pub contract_address: Option<Address>,
    pub start_block: Option<u64>,
}

impl ChainConfig {
    /// Cursor value used when nothing has been recorded for a stream yet.
    pub fn initial_cursor(&self) -> u64 {
        self.start_block.map(|b| b.saturating_sub(1)).unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.contract_address.is_some()
    }
}

pub fn resolve_chain_config(raw: ChainConfigRaw) -> anyhow::Result<ChainConfig> {
    let address_text = match raw.contract_address {
        Some(inline) => Some(inline),
        None => raw
            .contract_address_env_var
            .as_deref()
            .and_then(|var| env::var(var).ok()),
    };

    let contract_address = match address_text.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(Address::from_str(text).with_context(|| {
            format!("invalid contract address {:?} for chain {}", text, raw.name)
        })?),
    };

    Ok(ChainConfig {
        name: raw.name,
        chain_id: raw.chain_id,
        rpc_url_env_var: raw.rpc_url_env_var,
        contract_address,
        start_block: raw.start_block,
    })
}
