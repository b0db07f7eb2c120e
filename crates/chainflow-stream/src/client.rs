//! Access API abstraction.
//!
//! The stream and assembler only talk to the network through [`FlowClient`],
//! so any transport (gRPC, REST, an in-memory fake) can drive them.

use std::sync::Arc;

use async_trait::async_trait;
use chainflow_core::{RawTransaction, RawTransactionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A sealed block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub parent_id: String,
    pub height: u64,
    pub timestamp: DateTime<Utc>,
}

/// Trait for reading blocks and transactions from a Flow access node.
#[async_trait]
pub trait FlowClient: Send + Sync {
    /// The latest sealed block, if the node knows one.
    async fn latest_block(&self) -> Result<Option<Block>, ClientError>;

    async fn block_at_height(&self, height: u64) -> Result<Option<Block>, ClientError>;

    /// A transaction together with its result.
    async fn transaction_by_id(
        &self,
        id: &str,
    ) -> Result<(RawTransaction, RawTransactionResult), ClientError>;

    /// Every transaction of a block and its results, index-aligned. The
    /// system chunk transaction comes last.
    async fn transactions_for_block(
        &self,
        block_id: &str,
    ) -> Result<(Vec<RawTransaction>, Vec<RawTransactionResult>), ClientError>;
}

#[async_trait]
impl<C: FlowClient + ?Sized> FlowClient for Arc<C> {
    async fn latest_block(&self) -> Result<Option<Block>, ClientError> {
        (**self).latest_block().await
    }

    async fn block_at_height(&self, height: u64) -> Result<Option<Block>, ClientError> {
        (**self).block_at_height(height).await
    }

    async fn transaction_by_id(
        &self,
        id: &str,
    ) -> Result<(RawTransaction, RawTransactionResult), ClientError> {
        (**self).transaction_by_id(id).await
    }

    async fn transactions_for_block(
        &self,
        block_id: &str,
    ) -> Result<(Vec<RawTransaction>, Vec<RawTransactionResult>), ClientError> {
        (**self).transactions_for_block(block_id).await
    }
}
