//! Fluent builder API for block streams.
//!
//! # Example
//!
//! ```rust,ignore
//! use chainflow_core::Network;
//! use chainflow_stream::StreamBuilder;
//!
//! let controller = StreamBuilder::new()
//!     .network(Network::Testnet)
//!     .start_height(185_000_000)
//!     .poll_interval_ms(500)
//!     .build(client);
//! ```

use chainflow_core::{ConversionOptions, Network};

use crate::client::FlowClient;
use crate::config::StreamConfig;
use crate::controller::StreamController;

/// Fluent builder for `StreamConfig` and `StreamController`.
#[derive(Default)]
pub struct StreamBuilder {
    config: StreamConfig,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self {
            config: StreamConfig::default(),
        }
    }

    /// Set the network being streamed.
    pub fn network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    /// Set the height to resume after (`0` = start at head).
    pub fn start_height(mut self, height: u64) -> Self {
        self.config.start_height = height;
        self
    }

    /// Set the tick interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the wait after an unchanged head, in milliseconds.
    pub fn retry_interval_ms(mut self, ms: u64) -> Self {
        self.config.retry_interval_ms = ms;
        self
    }

    /// Set the result channel capacity used by `spawn`.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set JSON-Cadence conversion options.
    pub fn conversion(mut self, options: ConversionOptions) -> Self {
        self.config.conversion = options;
        self
    }

    /// Build the `StreamConfig`.
    pub fn build_config(self) -> StreamConfig {
        self.config
    }

    /// Build a controller reading from `client`.
    pub fn build<C: FlowClient>(self, client: C) -> StreamController<C> {
        StreamController::new(client, self.config)
    }
}
