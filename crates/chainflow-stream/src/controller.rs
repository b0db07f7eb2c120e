//! The block stream loop.
//!
//! # Ticks
//! Each tick wakes after the current sleep (the poll interval unless the
//! previous tick shortened it) and does one of:
//!
//! - **Catching up**: the next height is below the known head. Fetch that
//!   block and process it; a failed fetch retries the same height.
//! - **Observing**: the next height is above the known head. Re-query the
//!   head. Nothing new shortens the sleep to the retry interval; a new head
//!   is only recorded, and processed on a later tick.
//! - **Tailing**: the next height is the known head. Process it.
//!
//! Processing a block emits exactly one [`BlockResult`], unless the access
//! node has not indexed the block's collections yet, in which case the same
//! height is retried. Cancellation is observed while sleeping, fetching, and
//! sending; results not yet sent are dropped.

use std::future::Future;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::assembler::{BlockAssembler, BlockResult};
use crate::client::{Block, FlowClient};
use crate::config::StreamConfig;
use crate::cursor::{HeadObservation, StreamCursor, TickPlan};
use crate::error::StreamError;

/// Resolves once `cancel` carries `true`. A dropped sender never cancels.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Drive `fut` to completion unless `cancel` fires first.
pub async fn until_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Result<F::Output, StreamError> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(StreamError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Polls a Flow access node and emits one [`BlockResult`] per height.
pub struct StreamController<C> {
    assembler: BlockAssembler<C>,
    config: StreamConfig,
}

impl<C: FlowClient> StreamController<C> {
    pub fn new(client: C, config: StreamConfig) -> Self {
        Self {
            assembler: BlockAssembler::new(client, config.normalizer_config()),
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn assembler(&self) -> &BlockAssembler<C> {
        &self.assembler
    }

    /// Run until cancelled or until `tx` is closed.
    ///
    /// Heights are emitted in strictly increasing order, each at most once.
    pub async fn stream(
        &self,
        mut cancel: watch::Receiver<bool>,
        tx: mpsc::Sender<BlockResult>,
    ) -> Result<(), StreamError> {
        let client = self.assembler.client();
        let mut latest = until_cancelled(&mut cancel, client.latest_block())
            .await??
            .ok_or(StreamError::NoHead)?;
        let mut cursor = StreamCursor::new(self.config.start_height, latest.height);

        tracing::info!(
            latest = latest.height,
            next = cursor.next_height(),
            network = %self.config.network,
            "starting block stream"
        );

        let poll = self.config.poll_interval();
        let mut sleep = poll;

        loop {
            until_cancelled(&mut cancel, tokio::time::sleep(sleep)).await?;
            sleep = poll;

            let plan = cursor.plan();
            tracing::debug!(
                next = cursor.next_height(),
                latest = cursor.latest_height(),
                phase = %cursor.phase(),
                "tick"
            );

            match plan {
                TickPlan::FetchHistorical(height) => {
                    let fetched = until_cancelled(&mut cancel, client.block_at_height(height)).await?;
                    match fetched {
                        Ok(Some(block)) => {
                            self.process(block, &mut cursor, &mut cancel, &tx).await?;
                        }
                        Ok(None) => {
                            tracing::warn!(height, "block not available yet, retrying");
                            cursor.retry();
                        }
                        Err(error) => {
                            tracing::warn!(height, %error, "error fetching block, retrying");
                            cursor.retry();
                        }
                    }
                }
                TickPlan::ObserveHead => {
                    let head = match until_cancelled(&mut cancel, client.latest_block()).await? {
                        Ok(head) => head,
                        Err(error) => {
                            tracing::warn!(%error, "error fetching latest block, retrying");
                            None
                        }
                    };
                    let observed = cursor.observe_head(head.as_ref().map(|b| b.height));
                    match (observed, head) {
                        (HeadObservation::Advanced, Some(block)) => {
                            tracing::debug!(latest = block.height, "head advanced");
                            latest = block;
                        }
                        _ => sleep = self.config.retry_interval(),
                    }
                }
                TickPlan::ProcessHead(_) => {
                    self.process(latest.clone(), &mut cursor, &mut cancel, &tx).await?;
                }
            }
        }
    }

    /// Assemble and emit `block`, advancing the cursor unless the failure
    /// is transient.
    async fn process(
        &self,
        block: Block,
        cursor: &mut StreamCursor,
        cancel: &mut watch::Receiver<bool>,
        tx: &mpsc::Sender<BlockResult>,
    ) -> Result<(), StreamError> {
        let start_time = Utc::now();
        let height = block.height;
        let assembled = until_cancelled(cancel, self.assembler.assemble(block.clone(), start_time)).await?;

        let result = match assembled {
            Ok(result) => {
                tracing::info!(
                    height,
                    transactions = result.transactions.len(),
                    failures = result.failures.len(),
                    latest = cursor.latest_height(),
                    "block read"
                );
                result
            }
            Err(error) if error.is_transient() => {
                tracing::debug!(height, %error, "collections not indexed yet, retrying");
                cursor.retry();
                return Ok(());
            }
            Err(error) => {
                tracing::warn!(height, %error, "failed to assemble block");
                BlockResult::failed(block, error, start_time)
            }
        };

        until_cancelled(cancel, tx.send(result))
            .await?
            .map_err(|_| StreamError::Closed)?;
        cursor.advance();
        Ok(())
    }
}

impl<C: FlowClient + 'static> StreamController<C> {
    /// Run the stream on a new task, returning its handle and the receiving
    /// end of a channel of `channel_capacity` results.
    pub fn spawn(
        self,
        cancel: watch::Receiver<bool>,
    ) -> (JoinHandle<Result<(), StreamError>>, mpsc::Receiver<BlockResult>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let handle = tokio::spawn(async move { self.stream(cancel, tx).await });
        (handle, rx)
    }
}
