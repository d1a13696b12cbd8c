pub mod contract;
pub mod db;
pub mod decoding;
pub mod rpc;
pub mod store;
pub mod sync;
pub mod types;
