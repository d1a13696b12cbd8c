//! The auction contract as seen from the indexer: ABI bindings, the
//! [`AuctionChain`] read interface and the per-chain client factory.

pub mod abi;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod registry;

pub use client::{AuctionChain, AuctionResult, ContractClient};
pub use registry::{ChainRegistry, RegistryError};
