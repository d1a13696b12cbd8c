use thiserror::Error;

use crate::db::DbError;
use crate::decoding::DecodeError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl SyncError {
    /// Transient faults are expected to clear on a later pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Rpc(_))
    }
}
