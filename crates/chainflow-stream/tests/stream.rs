//! Block assembly and stream integration tests against an in-memory chain.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainflow_core::{
    Address, Network, NormalizerConfig, ProposalKey, RawEvent, RawTransaction,
    RawTransactionResult, Signature, TransactionStatus,
};
use chainflow_stream::error::COLLECTION_NOT_FOUND;
use chainflow_stream::{
    AssembleError, Block, BlockAssembler, BlockResult, ClientError, FlowClient, StreamBuilder,
    StreamController, StreamError,
};
use chrono::Utc;
use serde_json::json;
use tokio::sync::{mpsc, watch};

// ─── In-memory chain ──────────────────────────────────────────────────────────

type Entries = (Vec<RawTransaction>, Vec<RawTransactionResult>);

#[derive(Default)]
struct MockChain {
    /// Sealed head; `0` means the node knows no block.
    head: Mutex<u64>,
    /// Remaining "collection not found" failures per height.
    transient: Mutex<HashMap<u64, u32>>,
    /// Heights whose transactions always fail to load.
    broken: Mutex<HashSet<u64>>,
    /// Explicit block contents; other heights get `default_entries`.
    entries: Mutex<HashMap<u64, Entries>>,
}

impl MockChain {
    fn at_head(head: u64) -> Arc<Self> {
        let chain = Self::default();
        *chain.head.lock().unwrap() = head;
        Arc::new(chain)
    }

    fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }
}

fn block(height: u64) -> Block {
    Block {
        id: format!("block-{height}"),
        parent_id: format!("block-{}", height.saturating_sub(1)),
        height,
        timestamp: Utc::now(),
    }
}

fn height_of(block_id: &str) -> u64 {
    block_id.trim_start_matches("block-").parse().unwrap()
}

#[async_trait]
impl FlowClient for MockChain {
    async fn latest_block(&self) -> Result<Option<Block>, ClientError> {
        let head = *self.head.lock().unwrap();
        Ok((head > 0).then(|| block(head)))
    }

    async fn block_at_height(&self, height: u64) -> Result<Option<Block>, ClientError> {
        let head = *self.head.lock().unwrap();
        Ok((height <= head).then(|| block(height)))
    }

    async fn transaction_by_id(
        &self,
        id: &str,
    ) -> Result<(RawTransaction, RawTransactionResult), ClientError> {
        let mut events = vec![system_event(4)];
        events[0].transaction_index = 5;
        Ok((raw_tx(id, true), raw_result(id, events)))
    }

    async fn transactions_for_block(&self, block_id: &str) -> Result<Entries, ClientError> {
        let height = height_of(block_id);
        if self.broken.lock().unwrap().contains(&height) {
            return Err(ClientError::Rpc("rpc error: code = Internal desc = boom".into()));
        }
        if let Some(remaining) = self.transient.lock().unwrap().get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClientError::Rpc(format!(
                    "rpc error: code = NotFound desc = {COLLECTION_NOT_FOUND}"
                )));
            }
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .unwrap_or_else(|| default_entries(height)))
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

const PAYER: &str = "0x01cf0e2f2f715450";

const SCRIPT: &str = r#"
import FlowToken from 0x1654653399040a61

transaction(greeting: String) {
    prepare(signer: &Account) {}
}
"#;

fn raw_tx(id: &str, signed: bool) -> RawTransaction {
    let payer = Address::from_hex(PAYER).unwrap();
    RawTransaction {
        id: id.to_string(),
        script: SCRIPT.as_bytes().to_vec(),
        arguments: vec![serde_json::to_vec(&json!({"type": "String", "value": "hi"})).unwrap()],
        reference_block_id: "ref".into(),
        gas_limit: 1000,
        proposal_key: ProposalKey {
            address: payer,
            key_index: 0,
            sequence_number: 1,
        },
        payer,
        authorizers: vec![payer],
        payload_signatures: Vec::new(),
        envelope_signatures: if signed {
            vec![Signature {
                address: payer,
                key_index: 0,
                signature: vec![1; 64],
            }]
        } else {
            Vec::new()
        },
    }
}

/// A transaction none of whose arguments decode.
fn broken_tx(id: &str) -> RawTransaction {
    let mut tx = raw_tx(id, true);
    tx.arguments = vec![b"{not json".to_vec()];
    tx
}

fn raw_result(id: &str, events: Vec<RawEvent>) -> RawTransactionResult {
    RawTransactionResult {
        transaction_id: id.to_string(),
        status: TransactionStatus::Sealed,
        error: None,
        events,
        block_id: "block-1".into(),
        block_height: 1,
    }
}

fn system_event(index: u32) -> RawEvent {
    let event_type = "A.e467b9dd11fa00df.FlowEpoch.EpochHeartbeat";
    let payload = json!({
        "type": "Event",
        "value": {
            "id": event_type,
            "fields": [{"name": "counter", "value": {"type": "UInt64", "value": index.to_string()}}]
        }
    });
    RawEvent {
        event_type: event_type.into(),
        transaction_id: "system".into(),
        transaction_index: 0,
        event_index: index,
        payload: serde_json::to_vec(&payload).unwrap(),
    }
}

/// One user transaction followed by the system chunk.
fn default_entries(height: u64) -> Entries {
    let id = format!("tx-{height}");
    (
        vec![raw_tx(&id, true), raw_tx("system", true)],
        vec![raw_result(&id, Vec::new()), raw_result("system", vec![system_event(0)])],
    )
}

fn entries(txs: Vec<RawTransaction>, system_events: usize) -> Entries {
    let mut results: Vec<_> = txs.iter().map(|t| raw_result(&t.id, Vec::new())).collect();
    let events = (0..system_events as u32).map(system_event).collect();
    results.push(raw_result("system", events));
    let mut txs = txs;
    txs.push(raw_tx("system", true));
    (txs, results)
}

fn assembler(chain: Arc<MockChain>, network: Network) -> BlockAssembler<Arc<MockChain>> {
    BlockAssembler::new(chain, NormalizerConfig::new(network))
}

fn controller(chain: Arc<MockChain>, start_height: u64) -> StreamController<Arc<MockChain>> {
    StreamBuilder::new()
        .network(Network::Testnet)
        .start_height(start_height)
        .poll_interval_ms(2)
        .retry_interval_ms(1)
        .build(chain)
}

async fn recv(rx: &mut mpsc::Receiver<BlockResult>) -> BlockResult {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a block result")
        .expect("stream closed")
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn last_result_is_the_system_chunk() {
    let chain = MockChain::at_head(10);
    chain
        .entries
        .lock()
        .unwrap()
        .insert(7, entries(vec![raw_tx("a", true), raw_tx("b", true)], 2));

    let result = assembler(chain, Network::Mainnet).assemble_block(7).await.unwrap();
    assert!(result.is_ok());
    assert_eq!(result.height(), 7);
    let ids: Vec<_> = result.transactions.iter().map(|t| t.id()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(result.transactions[1].index(), 1);
    assert_eq!(result.system_chunk_events.len(), 2);
    assert_eq!(result.system_chunk_events[1].event_index, 1);
}

#[tokio::test]
async fn emulator_has_no_system_chunk() {
    let chain = MockChain::at_head(10);
    chain
        .entries
        .lock()
        .unwrap()
        .insert(7, entries(vec![raw_tx("a", true), raw_tx("b", true)], 2));

    let result = assembler(chain, Network::Emulator).assemble_block(7).await.unwrap();
    assert_eq!(result.transactions.len(), 3);
    assert!(result.system_chunk_events.is_empty());
}

#[tokio::test]
async fn unsigned_entries_are_skipped() {
    let chain = MockChain::at_head(10);
    chain
        .entries
        .lock()
        .unwrap()
        .insert(7, entries(vec![raw_tx("heartbeat", false), raw_tx("a", true)], 0));

    let result = assembler(chain, Network::Mainnet).assemble_block(7).await.unwrap();
    assert_eq!(result.transactions.len(), 1);
    assert_eq!(result.transactions[0].id(), "a");
    assert_eq!(result.transactions[0].index(), 1);
}

#[tokio::test]
async fn one_bad_entry_does_not_sink_the_block() {
    let chain = MockChain::at_head(10);
    chain.entries.lock().unwrap().insert(
        7,
        entries(vec![raw_tx("a", true), broken_tx("bad"), raw_tx("c", true)], 1),
    );

    let result = assembler(chain, Network::Mainnet).assemble_block(7).await.unwrap();
    let ids: Vec<_> = result.transactions.iter().map(|t| t.id()).collect();
    assert_eq!(ids, ["a", "c"]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 1);
    assert_eq!(result.failures[0].transaction_id, "bad");
    assert_eq!(result.system_chunk_events.len(), 1);

    let mut positions: Vec<usize> = result.transactions.iter().map(|t| t.index()).collect();
    positions.extend(result.failures.iter().map(|f| f.index));
    positions.sort_unstable();
    assert_eq!(positions, [0, 1, 2]);
}

#[tokio::test]
async fn misaligned_arrays_are_rejected() {
    let chain = MockChain::at_head(10);
    let (txs, mut results) = entries(vec![raw_tx("a", true)], 0);
    results.push(raw_result("extra", Vec::new()));
    chain.entries.lock().unwrap().insert(7, (txs, results));

    let err = assembler(chain, Network::Mainnet).assemble_block(7).await.unwrap_err();
    assert!(matches!(
        err,
        AssembleError::Misaligned {
            transactions: 2,
            results: 3,
            ..
        }
    ));
}

#[tokio::test]
async fn missing_block_is_reported() {
    let chain = MockChain::at_head(10);
    let err = assembler(chain, Network::Mainnet).assemble_block(11).await.unwrap_err();
    assert!(matches!(err, AssembleError::BlockNotFound { height: 11 }));
}

#[tokio::test]
async fn transaction_by_id_takes_index_from_first_event() {
    let chain = MockChain::at_head(10);
    let tx = assembler(chain, Network::Mainnet)
        .transaction_by_id("lookup")
        .await
        .unwrap();
    assert_eq!(tx.id(), "lookup");
    assert_eq!(tx.index(), 5);
    assert_eq!(tx.arguments()[0].key, "greeting");
}

// ─── Streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn catches_up_in_order() {
    let chain = MockChain::at_head(10);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (_handle, mut rx) = controller(chain, 6).spawn(cancel_rx);

    for expected in 7..=10 {
        let result = recv(&mut rx).await;
        assert_eq!(result.height(), expected);
        assert!(result.is_ok());
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.system_chunk_events.len(), 1);
    }
}

#[tokio::test]
async fn zero_start_begins_at_head() {
    let chain = MockChain::at_head(10);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (_handle, mut rx) = controller(chain, 0).spawn(cancel_rx);
    assert_eq!(recv(&mut rx).await.height(), 10);
}

#[tokio::test]
async fn follows_the_head() {
    let chain = MockChain::at_head(10);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (_handle, mut rx) = controller(chain.clone(), 0).spawn(cancel_rx);

    assert_eq!(recv(&mut rx).await.height(), 10);
    chain.set_head(12);
    assert_eq!(recv(&mut rx).await.height(), 11);
    assert_eq!(recv(&mut rx).await.height(), 12);
}

#[tokio::test]
async fn transient_gaps_are_retried_silently() {
    let chain = MockChain::at_head(9);
    chain.transient.lock().unwrap().insert(8, 3);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (_handle, mut rx) = controller(chain, 6).spawn(cancel_rx);

    for expected in 7..=9 {
        let result = recv(&mut rx).await;
        assert_eq!(result.height(), expected);
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn terminal_errors_are_emitted_once() {
    let chain = MockChain::at_head(9);
    chain.broken.lock().unwrap().insert(8);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (_handle, mut rx) = controller(chain, 7).spawn(cancel_rx);

    let failed = recv(&mut rx).await;
    assert_eq!(failed.height(), 8);
    assert!(matches!(failed.error, Some(AssembleError::Client(_))));
    assert!(failed.transactions.is_empty());

    let next = recv(&mut rx).await;
    assert_eq!(next.height(), 9);
    assert!(next.is_ok());
}

#[tokio::test]
async fn cancellation_stops_the_stream() {
    let chain = MockChain::at_head(10);
    let (cancel, cancel_rx) = watch::channel(false);
    let (handle, mut rx) = controller(chain, 0).spawn(cancel_rx);

    assert_eq!(recv(&mut rx).await.height(), 10);
    cancel.send(true).unwrap();

    let out = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("stream did not stop")
        .unwrap();
    assert!(matches!(out, Err(StreamError::Cancelled)));
}

#[tokio::test]
async fn cancellation_while_blocked_on_send() {
    let chain = MockChain::at_head(20);
    let (cancel, cancel_rx) = watch::channel(false);
    let (tx, _rx) = mpsc::channel(1);
    let controller = controller(chain, 10);

    let stream = tokio::spawn(async move { controller.stream(cancel_rx, tx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.send(true).unwrap();

    let out = tokio::time::timeout(Duration::from_secs(5), stream)
        .await
        .expect("stream did not stop")
        .unwrap();
    assert!(matches!(out, Err(StreamError::Cancelled)));
}

#[tokio::test]
async fn dropped_receiver_closes_the_stream() {
    let chain = MockChain::at_head(10);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (handle, rx) = controller(chain, 0).spawn(cancel_rx);
    drop(rx);

    let out = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("stream did not stop")
        .unwrap();
    assert!(matches!(out, Err(StreamError::Closed)));
}

#[tokio::test]
async fn no_head_fails_to_start() {
    let chain = MockChain::at_head(0);
    let (_cancel, cancel_rx) = watch::channel(false);
    let (tx, _rx) = mpsc::channel(1);
    let out = controller(chain, 0).stream(cancel_rx, tx).await;
    assert!(matches!(out, Err(StreamError::NoHead)));
}
