//! # chainflow-core
//!
//! Pure building blocks for indexing Flow transactions: binding named
//! arguments to a Cadence program's parameters, extracting its address
//! imports, decoding JSON-Cadence values, and normalizing a transaction and
//! its execution result into a [`NormalizedTransaction`].
//!
//! ```text
//!   source ──► parser ──► Program ──┬──► arguments (bind_arguments)
//!                                   └──► imports   (address_imports)
//!
//!   RawTransaction + RawTransactionResult
//!        │  codec / event
//!        ▼
//!   TransactionNormalizer ──► NormalizedTransaction
//! ```
//!
//! Nothing here performs I/O; block fetching and streaming live in
//! `chainflow-stream`.

pub mod arguments;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod imports;
pub mod parser;
pub mod transaction;
pub mod types;

pub use arguments::{bind_arguments, bind_source, BoundArgument, BoundArgumentList};
pub use config::{ConversionOptions, Network, NormalizerConfig};
pub use error::{BindError, ConversionError, NormalizeError, ParseError, ValidationError};
pub use event::{Event, Events, RawEvent, Stakeholders};
pub use imports::{address_imports, Import};
pub use parser::{parse_program, DeclarationInfo, Parameter, Program};
pub use transaction::{
    normalize_transaction, Argument, NormalizedTransaction, ProposalKey, RawTransaction,
    RawTransactionResult, Signature, TransactionNormalizer, TransactionStatus,
};
pub use types::{Address, Composite, TypeAnnotation, Value};
