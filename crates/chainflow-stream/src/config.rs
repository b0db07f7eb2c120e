//! Stream configuration.

use chainflow_core::{ConversionOptions, Network, NormalizerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`StreamController`](crate::controller::StreamController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Network being streamed; decides system chunk handling and the fee vault.
    #[serde(default = "default_network")]
    pub network: Network,
    #[serde(default)]
    pub conversion: ConversionOptions,
    /// Height to resume after. `0` starts at the current head.
    #[serde(default)]
    pub start_height: u64,
    /// Delay between ticks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay after a head query that found nothing new, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Capacity of the result channel created by `spawn`.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_network() -> Network { Network::Mainnet }
fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_retry_interval_ms() -> u64 { 50 }
fn default_channel_capacity() -> usize { 1 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            conversion: ConversionOptions::default(),
            start_height: 0,
            poll_interval_ms: default_poll_interval_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Normalizer settings derived from this config.
    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            network: self.network,
            conversion: self.conversion,
        }
    }
}
