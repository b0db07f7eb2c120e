//! # chainflow-stream
//!
//! Block result assembly and the polling block stream, built on the
//! `FlowClient` access trait.

pub mod assembler;
pub mod builder;
pub mod client;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod error;

pub use assembler::{assemble_entries, BlockAssembler, BlockResult, BlockTransactions, EntryFailure};
pub use builder::StreamBuilder;
pub use client::{Block, FlowClient};
pub use config::StreamConfig;
pub use controller::StreamController;
pub use cursor::{StreamCursor, StreamPhase, TickPlan};
pub use error::{AssembleError, ClientError, StreamError};
