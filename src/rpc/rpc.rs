use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{BlockNumber, Bytes};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{BlockId, BlockNumberOrTag, Filter, Log, TransactionRequest};
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("RPC call '{0}' timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Failed to decode contract return data: {0}")]
    ReturnDecode(String),
}

impl RpcError {
    /// Check if this error is likely transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::RateLimitExceeded => true,
            RpcError::Timeout(..) => true,
            RpcError::ReturnDecode(_) => false,
            RpcError::ProviderError(msg) => Self::is_retryable_message(msg),
        }
    }

    fn is_retryable_message(msg: &str) -> bool {
        let msg_lower = msg.to_lowercase();
        msg_lower.contains("connection")
            || msg_lower.contains("timeout")
            || msg_lower.contains("timed out")
            || msg_lower.contains("reset")
            || msg_lower.contains("broken pipe")
            || msg_lower.contains("eof")
            || msg_lower.contains("sending request")
            || msg_lower.contains("rate limit")
            || msg_lower.contains("too many requests")
            || msg_lower.contains("429")
            || msg_lower.contains("502")
            || msg_lower.contains("503")
            || msg_lower.contains("504")
            || msg_lower.contains("service unavailable")
            || msg_lower.contains("bad gateway")
            || msg_lower.contains("temporarily")
            || msg_lower.contains("try again")
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before the given attempt (0-indexed). The first attempt never waits.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_millis(delay_ms as u64);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Execute an async operation with a per-attempt timeout and retry on transient errors.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    timeout: Duration,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            tracing::warn!(
                "RPC retry {}/{} for '{}' in {:?}",
                attempt,
                config.max_retries,
                operation_name,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        let result = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout(operation_name.to_string(), timeout)),
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        "RPC '{}' succeeded after {} retries",
                        operation_name,
                        attempt
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                tracing::warn!(
                    "RPC '{}' failed (attempt {}/{}): {}",
                    operation_name,
                    attempt + 1,
                    config.max_retries + 1,
                    e
                );
                attempt += 1;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!(
                        "RPC '{}' failed after {} attempts: {}",
                        operation_name,
                        attempt + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: NonZeroU32,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl RateLimitConfig {
    pub fn per_second(requests_per_second: NonZeroU32) -> Self {
        Self {
            requests_per_second,
            jitter_min_ms: 5,
            jitter_max_ms: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub url: Url,
    pub timeout: Duration,
    pub rate_limit: Option<RateLimitConfig>,
    pub retry: RetryConfig,
}

impl RpcClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(20),
            rate_limit: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }
}

/// Read-only JSON-RPC client. Construction does not touch the network.
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
    config: RpcClientConfig,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
    jitter: Option<Jitter>,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Self {
        let provider = RootProvider::<Ethereum>::new_http(config.url.clone());

        let (rate_limiter, jitter) = match config.rate_limit {
            Some(ref rate_config) => {
                let limiter = RateLimiter::direct(Quota::per_second(rate_config.requests_per_second));
                let jitter = Jitter::new(
                    Duration::from_millis(rate_config.jitter_min_ms),
                    Duration::from_millis(rate_config.jitter_max_ms),
                );
                (Some(Arc::new(limiter)), Some(jitter))
            }
            None => (None, None),
        };

        Self {
            provider,
            config,
            rate_limiter,
            jitter,
        }
    }

    async fn wait_for_rate_limit(&self) {
        if let (Some(limiter), Some(jitter)) = (&self.rate_limiter, &self.jitter) {
            limiter.until_ready_with_jitter(*jitter).await;
        }
    }

    pub async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
        with_retry(&self.config.retry, self.config.timeout, "eth_blockNumber", || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_block_number()
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }

    pub async fn get_block_timestamp(&self, number: u64) -> Result<Option<u64>, RpcError> {
        let op_name = format!("eth_getBlockByNumber({})", number);
        let block = with_retry(&self.config.retry, self.config.timeout, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_block(BlockId::Number(BlockNumberOrTag::Number(number)))
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await?;

        Ok(block.map(|b| b.header.timestamp))
    }

    /// Timestamps for a set of blocks, fetched concurrently. Blocks whose lookup
    /// fails are left out of the result instead of failing the whole batch.
    pub async fn get_block_timestamps(&self, numbers: &[u64]) -> HashMap<u64, u64> {
        let lookups = numbers.iter().map(|&number| async move {
            (number, self.get_block_timestamp(number).await)
        });

        let mut timestamps = HashMap::with_capacity(numbers.len());
        for (number, result) in futures::future::join_all(lookups).await {
            match result {
                Ok(Some(ts)) => {
                    timestamps.insert(number, ts);
                }
                Ok(None) => {
                    tracing::warn!("Block {} not found while resolving timestamps", number);
                }
                Err(e) => {
                    tracing::warn!("Failed to resolve timestamp for block {}: {}", number, e);
                }
            }
        }
        timestamps
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        let op_name = format!(
            "eth_getLogs(blocks {:?}-{:?})",
            filter.get_from_block(),
            filter.get_to_block()
        );
        with_retry(&self.config.retry, self.config.timeout, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_logs(filter)
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }

    pub async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, RpcError> {
        let op_name = format!("eth_call(to={:?})", tx.to);
        with_retry(&self.config.retry, self.config.timeout, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .call(tx.clone())
                .block(BlockId::latest())
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}
