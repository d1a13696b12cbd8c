mod rpc;

pub use rpc::{with_retry, RateLimitConfig, RetryConfig, RpcClient, RpcClientConfig, RpcError};
