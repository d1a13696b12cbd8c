use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::types::config::chain::{resolve_chain_config, ChainConfig, ChainConfigRaw};

fn default_database_url_env_var() -> String {
    "DATABASE_URL".to_string()
}

#[derive(Debug, Deserialize)]
pub struct IndexerConfigRaw {
    #[serde(default = "default_database_url_env_var")]
    pub database_url_env_var: String,
    #[serde(default)]
    pub sync: SyncConfig,
    pub chains: Vec<ChainConfigRaw>,
}

/// Timing and batching knobs shared by every chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub rpc_timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_second: Option<u32>,
    /// Upper bound on blocks fetched per stream per pass.
    pub max_block_range: Option<u64>,
    /// Upper bound on heal calls per pass.
    pub max_backfill_per_pass: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            rpc_timeout_secs: 20,
            max_retries: 3,
            requests_per_second: None,
            max_block_range: None,
            max_backfill_per_pass: None,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.max(1))
    }
}

#[derive(Debug)]
pub struct IndexerConfig {
    pub database_url_env_var: String,
    pub sync: SyncConfig,
    pub chains: Vec<ChainConfig>,
}

impl IndexerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to load config file at {}", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let raw: IndexerConfigRaw =
            serde_json::from_str(content).context("Failed to parse config")?;

        let mut seen = HashSet::new();
        let mut chains = Vec::with_capacity(raw.chains.len());
        for chain in raw.chains {
            anyhow::ensure!(
                seen.insert(chain.chain_id),
                "chain_id {} is configured more than once",
                chain.chain_id
            );
            chains.push(resolve_chain_config(chain)?);
        }

        Ok(IndexerConfig {
            database_url_env_var: raw.database_url_env_var,
            sync: raw.sync,
            chains,
        })
    }

    /// Env vars that must be present before the indexer can start. RPC urls
    /// are not among them: a chain without one is left out of the schedule.
    pub fn required_env_vars(&self) -> Vec<&str> {
        vec![self.database_url_env_var.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let json = r#"{
            "chains": [
                {
                    "name": "base",
                    "chain_id": 8453,
                    "rpc_url_env_var": "BASE_RPC_URL",
                    "contract_address": "0x00000000000000000000000000000000000000aa",
                    "start_block": 1000
                },
                {
                    "name": "base-sepolia",
                    "chain_id": 84532,
                    "rpc_url_env_var": "BASE_SEPOLIA_RPC_URL"
                }
            ]
        }"#;

        let config = IndexerConfig::from_json(json).unwrap();
        assert_eq!(config.database_url_env_var, "DATABASE_URL");
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.chains.len(), 2);
        assert!(config.chains[0].is_enabled());
        assert!(!config.chains[1].is_enabled());
        assert_eq!(config.required_env_vars(), vec!["DATABASE_URL"]);
    }

    #[test]
    fn test_partial_sync_section_keeps_defaults() {
        let json = r#"{
            "sync": { "interval_secs": 5, "max_block_range": 2000 },
            "chains": []
        }"#;

        let config = IndexerConfig::from_json(json).unwrap();
        assert_eq!(config.sync.interval(), Duration::from_secs(5));
        assert_eq!(config.sync.max_block_range, Some(2000));
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.rpc_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let json = r#"{
            "chains": [
                { "name": "a", "chain_id": 1, "rpc_url_env_var": "A" },
                { "name": "b", "chain_id": 1, "rpc_url_env_var": "B" }
            ]
        }"#;

        assert!(IndexerConfig::from_json(json).is_err());
    }
}
