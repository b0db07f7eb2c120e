//! Turns a block's transactions and results into a [`BlockResult`].
//!
//! On every network except the emulator the last result of a block belongs
//! to the system chunk: its events are kept apart and it is not reported as
//! a transaction. Entries without envelope signatures are skipped. A
//! transaction that fails to normalize is recorded in
//! [`BlockResult::failures`] without affecting the rest of the block.

use chainflow_core::{
    Event, NormalizeError, NormalizedTransaction, NormalizerConfig, RawTransaction,
    RawTransactionResult, TransactionNormalizer,
};
use chrono::{DateTime, Utc};

use crate::client::{Block, FlowClient};
use crate::error::AssembleError;

/// A transaction of a block that could not be normalized.
#[derive(Debug)]
pub struct EntryFailure {
    /// Position of the entry within the block.
    pub index: usize,
    pub transaction_id: String,
    pub error: NormalizeError,
}

/// The normalized contents of one block.
#[derive(Debug, Default)]
pub struct BlockTransactions {
    pub transactions: Vec<NormalizedTransaction>,
    pub system_chunk_events: Vec<Event>,
    pub failures: Vec<EntryFailure>,
}

/// Everything the stream produces for one height.
#[derive(Debug)]
pub struct BlockResult {
    pub block: Block,
    pub transactions: Vec<NormalizedTransaction>,
    pub system_chunk_events: Vec<Event>,
    pub failures: Vec<EntryFailure>,
    /// Set when the block's transactions could not be fetched or assembled.
    pub error: Option<AssembleError>,
    pub start_time: DateTime<Utc>,
}

impl BlockResult {
    pub fn new(block: Block, contents: BlockTransactions, start_time: DateTime<Utc>) -> Self {
        Self {
            block,
            transactions: contents.transactions,
            system_chunk_events: contents.system_chunk_events,
            failures: contents.failures,
            error: None,
            start_time,
        }
    }

    /// A result for a block whose contents could not be assembled.
    pub fn failed(block: Block, error: AssembleError, start_time: DateTime<Utc>) -> Self {
        Self {
            block,
            transactions: Vec::new(),
            system_chunk_events: Vec::new(),
            failures: Vec::new(),
            error: Some(error),
            start_time,
        }
    }

    pub fn height(&self) -> u64 {
        self.block.height
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Normalize index-aligned transactions and results of one block.
pub fn assemble_entries(
    normalizer: &TransactionNormalizer,
    block_id: &str,
    transactions: &[RawTransaction],
    results: &[RawTransactionResult],
) -> Result<BlockTransactions, AssembleError> {
    if transactions.len() != results.len() {
        return Err(AssembleError::Misaligned {
            block_id: block_id.to_string(),
            transactions: transactions.len(),
            results: results.len(),
        });
    }

    let config = normalizer.config();
    let mut contents = BlockTransactions::default();
    let mut entries = transactions.iter().zip(results).enumerate().peekable();

    while let Some((index, (tx, result))) = entries.next() {
        let is_last = entries.peek().is_none();
        if is_last && !config.network.is_local() {
            contents.system_chunk_events = result
                .events
                .iter()
                .map(|raw| Event::decode(raw, &config.conversion))
                .collect::<Result<_, _>>()
                .map_err(AssembleError::SystemChunk)?;
            if !contents.system_chunk_events.is_empty() {
                tracing::debug!(
                    block = block_id,
                    events = contents.system_chunk_events.len(),
                    "system chunk events"
                );
            }
            continue;
        }

        // Epoch heartbeats and similar service entries carry no envelope.
        if tx.envelope_signatures.is_empty() {
            continue;
        }

        match normalizer.normalize(block_id, result, tx, index) {
            Ok(normalized) => contents.transactions.push(normalized),
            Err(error) => {
                tracing::warn!(
                    block = block_id,
                    index,
                    transaction = %result.transaction_id,
                    %error,
                    "failed to normalize transaction"
                );
                contents.failures.push(EntryFailure {
                    index,
                    transaction_id: result.transaction_id.clone(),
                    error,
                });
            }
        }
    }
    Ok(contents)
}

/// Fetches blocks through a [`FlowClient`] and assembles their results.
pub struct BlockAssembler<C> {
    client: C,
    normalizer: TransactionNormalizer,
}

impl<C: FlowClient> BlockAssembler<C> {
    pub fn new(client: C, config: NormalizerConfig) -> Self {
        Self {
            client,
            normalizer: TransactionNormalizer::new(config),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn normalizer(&self) -> &TransactionNormalizer {
        &self.normalizer
    }

    /// Fetch and normalize every transaction of `block`.
    pub async fn transactions_for_block(
        &self,
        block: &Block,
    ) -> Result<BlockTransactions, AssembleError> {
        let (transactions, results) = self.client.transactions_for_block(&block.id).await?;
        tracing::debug!(
            block = %block.id,
            height = block.height,
            transactions = transactions.len(),
            results = results.len(),
            "fetched block transactions"
        );
        assemble_entries(&self.normalizer, &block.id, &transactions, &results)
    }

    /// Assemble the result for an already fetched block.
    pub async fn assemble(
        &self,
        block: Block,
        start_time: DateTime<Utc>,
    ) -> Result<BlockResult, AssembleError> {
        let contents = self.transactions_for_block(&block).await?;
        Ok(BlockResult::new(block, contents, start_time))
    }

    /// Fetch the block at `height` and assemble its result.
    pub async fn assemble_block(&self, height: u64) -> Result<BlockResult, AssembleError> {
        let start_time = Utc::now();
        let block = self
            .client
            .block_at_height(height)
            .await?
            .ok_or(AssembleError::BlockNotFound { height })?;
        self.assemble(block, start_time).await
    }

    /// Fetch and normalize a single transaction. Its index is taken from its
    /// first event, or 0 when it emitted none.
    pub async fn transaction_by_id(&self, id: &str) -> Result<NormalizedTransaction, AssembleError> {
        let (tx, result) = self.client.transaction_by_id(id).await?;
        let index = result
            .events
            .first()
            .map_or(0, |event| event.transaction_index as usize);
        Ok(self.normalizer.normalize(&result.block_id, &result, &tx, index)?)
    }
}
