//! Network identity and conversion options, threaded explicitly through
//! normalization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::Address;

/// The network a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Local emulator. Blocks carry no system chunk entry.
    Emulator,
    Testnet,
    Mainnet,
}

impl Network {
    /// Returns `true` for the local emulator.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Emulator)
    }

    /// Address of the `FlowFees` contract, whose vault receives transaction fees.
    pub fn fee_receiver(&self) -> Address {
        match self {
            Self::Emulator => Address::new([0xe5, 0xa8, 0xb7, 0xf2, 0x3e, 0x8b, 0x54, 0x8f]),
            Self::Testnet => Address::new([0x91, 0x2d, 0x54, 0x40, 0xf7, 0xe3, 0x76, 0x9e]),
            Self::Mainnet => Address::new([0xf9, 0x19, 0xee, 0x77, 0x44, 0x7b, 0x74, 0x97]),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emulator => write!(f, "emulator"),
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emulator" | "local" => Ok(Self::Emulator),
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Options for converting JSON-Cadence values into host [`Value`](crate::types::Value)s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Replace `Optional(Some(v))` with `v` and `Optional(None)` with `Null`.
    #[serde(default = "bool_true")]
    pub unwrap_optionals: bool,
    /// Decode non-empty `[UInt8]` arrays as `Value::Bytes`.
    #[serde(default = "bool_true")]
    pub collapse_byte_arrays: bool,
}

fn bool_true() -> bool {
    true
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            unwrap_optionals: true,
            collapse_byte_arrays: true,
        }
    }
}

/// Everything transaction normalization depends on besides its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub network: Network,
    #[serde(default)]
    pub conversion: ConversionOptions,
}

impl NormalizerConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            conversion: ConversionOptions::default(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_from_str() {
        assert_eq!("Mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("local".parse::<Network>().unwrap(), Network::Emulator);
        assert!("devnet".parse::<Network>().is_err());
    }

    #[test]
    fn fee_receivers() {
        assert_eq!(Network::Mainnet.fee_receiver().to_string(), "0xf919ee77447b7497");
        assert_eq!(Network::Testnet.fee_receiver().to_string(), "0x912d5440f7e3769e");
        assert!(Network::Emulator.is_local());
        assert!(!Network::Testnet.is_local());
    }

    #[test]
    fn config_serde_defaults() {
        let cfg: NormalizerConfig = serde_json::from_str(r#"{"network":"testnet"}"#).unwrap();
        assert_eq!(cfg.network, Network::Testnet);
        assert!(cfg.conversion.unwrap_optionals);
    }
}
