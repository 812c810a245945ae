//! Type-safe identifier wrappers.
//!
//! A [`Network`] is the chain id of the remote chain a dataset instance
//! belongs to. Wrapping it prevents accidentally passing a block number
//! where a chain id is expected.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::enums::ParseError;

/// Chain id of a logical network (e.g. `1` for Ethereum mainnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network(pub u64);

impl Network {
    /// Ethereum mainnet.
    pub const MAINNET: Self = Self(1);

    /// Create a network identifier from a chain id.
    pub const fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    /// Return the chain id.
    pub const fn chain_id(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Network {
    fn from(chain_id: u64) -> Self {
        Self(chain_id)
    }
}

impl From<Network> for u64 {
    fn from(network: Network) -> Self {
        network.0
    }
}

impl FromStr for Network {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| ParseError::Network(format!("{s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parses_and_displays_chain_id() {
        let network: Network = " 10 ".parse().unwrap();
        assert_eq!(network, Network::new(10));
        assert_eq!(network.to_string(), "10");
    }

    #[test]
    fn network_rejects_non_numeric() {
        assert!("mainnet".parse::<Network>().is_err());
    }

    #[test]
    fn network_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Network::new(137)).unwrap();
        assert_eq!(json, "137");
    }
}
