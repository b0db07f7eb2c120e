//! Raw transactions and results, and their normalization into
//! [`NormalizedTransaction`]s.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec;
use crate::config::{ConversionOptions, NormalizerConfig};
use crate::error::{ConversionError, NormalizeError};
use crate::event::{Event, Events, RawEvent, Stakeholders};
use crate::imports::Import;
use crate::parser::{parse_program, DeclarationInfo};
use crate::types::{Address, TypeAnnotation, Value};

/// Execution effort is reported in units of 10^-8 gas.
const GAS_FACTOR: f64 = 100_000_000.0;

/// Key given to positional arguments beyond the declared parameter list.
pub const INVALID_ARGUMENT_KEY: &str = "invalid";

// ─── Raw input ────────────────────────────────────────────────────────────────

/// Lifecycle status reported by the access API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Unknown,
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Pending => "PENDING",
            Self::Finalized => "FINALIZED",
            Self::Executed => "EXECUTED",
            Self::Sealed => "SEALED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalKey {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub address: Address,
    pub key_index: u32,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// A transaction body as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub id: String,
    pub script: Vec<u8>,
    /// Positional JSON-Cadence encoded arguments.
    pub arguments: Vec<Vec<u8>>,
    pub reference_block_id: String,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: Address,
    pub authorizers: Vec<Address>,
    #[serde(default)]
    pub payload_signatures: Vec<Signature>,
    #[serde(default)]
    pub envelope_signatures: Vec<Signature>,
}

impl RawTransaction {
    /// Decode the positional argument at `index`.
    pub fn argument(
        &self,
        index: usize,
        options: &ConversionOptions,
    ) -> Result<Value, ConversionError> {
        let raw = self
            .arguments
            .get(index)
            .ok_or(ConversionError::ArgumentIndex {
                index,
                count: self.arguments.len(),
            })?;
        codec::decode(raw, options)
    }
}

/// The execution result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransactionResult {
    pub transaction_id: String,
    pub status: TransactionStatus,
    /// Execution error message, when the transaction reverted.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub block_height: u64,
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// A positional argument together with the parameter name it binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub key: String,
    pub value: Value,
}

/// A transaction with its result, decoded and enriched for indexing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTransaction {
    id: String,
    block_id: String,
    index: usize,
    status: String,
    authorizers: Vec<Address>,
    payer: Address,
    proposal_key: ProposalKey,
    fee: f64,
    gas_limit: u64,
    gas_used: u64,
    execution_effort: f64,
    events: Vec<Event>,
    imports: Vec<Import>,
    arguments: Vec<Argument>,
    authorizer_types: Vec<TypeAnnotation>,
    stakeholders: Stakeholders,
    error: Option<String>,
    #[serde(with = "hex_bytes")]
    script: Vec<u8>,
}

impl NormalizedTransaction {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    /// Position of the transaction within its block.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Result status, with any normalization annotations appended.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn authorizers(&self) -> &[Address] {
        &self.authorizers
    }

    pub fn payer(&self) -> &Address {
        &self.payer
    }

    pub fn proposal_key(&self) -> &ProposalKey {
        &self.proposal_key
    }

    pub fn fee(&self) -> f64 {
        self.fee
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub fn execution_effort(&self) -> f64 {
        self.execution_effort
    }

    /// Events with the fee event and fee transfer removed.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Declared types of the `prepare` parameters, one per authorizer.
    pub fn authorizer_types(&self) -> &[TypeAnnotation] {
        &self.authorizer_types
    }

    pub fn stakeholders(&self) -> &Stakeholders {
        &self.stakeholders
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }
}

// ─── TransactionNormalizer ────────────────────────────────────────────────────

/// Turns raw transactions and results into [`NormalizedTransaction`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionNormalizer {
    config: NormalizerConfig,
}

impl TransactionNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one transaction.
    ///
    /// Undecodable arguments and unparsable imports only annotate the status.
    /// A malformed fee event, or a transaction none of whose arguments decode,
    /// is an error.
    pub fn normalize(
        &self,
        block_id: &str,
        result: &RawTransactionResult,
        tx: &RawTransaction,
        index: usize,
    ) -> Result<NormalizedTransaction, NormalizeError> {
        let options = &self.config.conversion;
        let events = Events::decode(&result.events, options)?;

        let (fee, execution_effort) = match events.fee() {
            Some(fee_event) => (
                fee_event.numeric_field("amount")?.unwrap_or(0.0),
                fee_event.numeric_field("executionEffort")?.unwrap_or(0.0),
            ),
            None => (0.0, 0.0),
        };
        let gas_used = (execution_effort * GAS_FACTOR).round() as u64;

        let mut status = result.status.to_string();
        let program = parse_program(&tx.script);
        let info = program
            .as_ref()
            .map(|p| p.declaration_info())
            .unwrap_or_default();

        let arguments = self.arguments(tx, &info, &mut status)?;

        let imports = match &program {
            Ok(p) => p.address_imports(),
            Err(e) => {
                tracing::debug!(transaction = %tx.id, error = %e, "failed to parse transaction imports");
                status.push_str(" failed getting imports");
                Vec::new()
            }
        };

        let mut seed = Stakeholders::new();
        for authorizer in &tx.authorizers {
            seed.add(authorizer, "authorizer");
        }
        seed.add(&tx.payer, "payer");
        seed.add(&tx.proposal_key.address, "proposer");

        let without_fees = events.without_fees(fee, &tx.payer, &self.config.network.fee_receiver());
        let stakeholders = without_fees.stakeholders(seed);

        Ok(NormalizedTransaction {
            id: result.transaction_id.clone(),
            block_id: block_id.to_string(),
            index,
            status,
            authorizers: tx.authorizers.clone(),
            payer: tx.payer,
            proposal_key: tx.proposal_key,
            fee,
            gas_limit: tx.gas_limit,
            gas_used,
            execution_effort,
            events: without_fees.flatten(),
            imports,
            arguments,
            authorizer_types: info.authorizers,
            stakeholders,
            error: result.error.clone(),
            script: tx.script.clone(),
        })
    }

    fn arguments(
        &self,
        tx: &RawTransaction,
        info: &DeclarationInfo,
        status: &mut String,
    ) -> Result<Vec<Argument>, NormalizeError> {
        let mut arguments = Vec::with_capacity(tx.arguments.len());
        let mut failed = 0;
        for i in 0..tx.arguments.len() {
            let value = match tx.argument(i, &self.config.conversion) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(transaction = %tx.id, index = i, error = %e, "failed to decode argument");
                    status.push_str(&format!(" failed getting argument at index {i}"));
                    failed += 1;
                    Value::Null
                }
            };
            let key = info
                .parameter_order
                .get(i)
                .map_or(INVALID_ARGUMENT_KEY, String::as_str);
            arguments.push(Argument {
                key: key.to_string(),
                value,
            });
        }
        if failed > 0 && failed == tx.arguments.len() {
            return Err(NormalizeError::Arguments { count: failed });
        }
        Ok(arguments)
    }
}

/// Normalize one transaction with `config`.
pub fn normalize_transaction(
    config: &NormalizerConfig,
    block_id: &str,
    result: &RawTransactionResult,
    tx: &RawTransaction,
    index: usize,
) -> Result<NormalizedTransaction, NormalizeError> {
    TransactionNormalizer::new(*config).normalize(block_id, result, tx, index)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
