//! Error types for block fetching, assembly, and streaming.

use chainflow_core::{ConversionError, NormalizeError};
use thiserror::Error;

/// Message the access API returns while a block's collections are not yet
/// indexed. The block becomes readable shortly after.
pub const COLLECTION_NOT_FOUND: &str = "could not retrieve collection: key not found";

/// Errors reported by a [`FlowClient`](crate::client::FlowClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("{what} not found")]
    NotFound { what: String },
}

impl ClientError {
    /// Returns `true` for the transient gap between a block being sealed
    /// and its collections becoming available.
    pub fn is_collection_not_found(&self) -> bool {
        matches!(self, Self::Rpc(msg) if msg.contains(COLLECTION_NOT_FOUND))
    }
}

/// Errors assembling a [`BlockResult`](crate::assembler::BlockResult).
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("getting transactions: {0}")]
    Client(#[from] ClientError),

    #[error("block at height {height} not found")]
    BlockNotFound { height: u64 },

    #[error("block {block_id} returned {transactions} transactions but {results} results")]
    Misaligned {
        block_id: String,
        transactions: usize,
        results: usize,
    },

    #[error("decoding system chunk events: {0}")]
    SystemChunk(#[source] ConversionError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl AssembleError {
    /// Returns `true` if retrying the same height is expected to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_collection_not_found())
    }
}

/// Reasons a block stream stops.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream cancelled")]
    Cancelled,

    #[error("block result receiver dropped")]
    Closed,

    #[error("no sealed block available to start from")]
    NoHead,

    #[error(transparent)]
    Client(#[from] ClientError),
}
