//! Enumeration types shared across the workspace.
//!
//! [`DatasetKind`] names each category of cacheable chain fact and owns the
//! constants that describe its storage layout (table name, schema version).
//! [`BlockReference`] is the caller-facing way to name a block before it is
//! normalized to a concrete block number.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing identifiers and references from strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The string is not a known dataset kind.
    #[error("unknown dataset kind: {0}")]
    DatasetKind(String),

    /// The string is not a block number or a known block tag.
    #[error("invalid block reference: {0}")]
    BlockReference(String),

    /// The string is not a numeric chain id.
    #[error("invalid network: {0}")]
    Network(String),
}

// ---------------------------------------------------------------------------
// Dataset kinds
// ---------------------------------------------------------------------------

/// A named category of cacheable chain fact.
///
/// Each kind is backed by exactly one data table in a store and is tracked
/// per network in the schema version registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Block number to block timestamp (seconds since the Unix epoch).
    BlockTimestamps,
    /// Contract address to the block number in which it was deployed.
    ContractCreationBlocks,
}

impl DatasetKind {
    /// Every dataset kind, in a stable order.
    pub const ALL: [Self; 2] = [Self::BlockTimestamps, Self::ContractCreationBlocks];

    /// The name used in configuration files and the schema version registry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockTimestamps => "block_timestamps",
            Self::ContractCreationBlocks => "contract_creation_blocks",
        }
    }

    /// The data table holding this dataset's rows.
    pub const fn table_name(self) -> &'static str {
        self.as_str()
    }

    /// The structural version of this dataset's current storage layout.
    ///
    /// Bump this whenever the table definition changes so stores created
    /// under an older layout are recognizable.
    pub const fn current_version(self) -> &'static str {
        match self {
            Self::BlockTimestamps | Self::ContractCreationBlocks => "1",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseError::DatasetKind(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Block references
// ---------------------------------------------------------------------------

/// A symbolic block name understood by Ethereum JSON-RPC nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTag {
    /// The most recent block.
    Latest,
    /// The genesis block.
    Earliest,
    /// The pending block being built.
    Pending,
    /// The latest block considered safe by the consensus layer.
    Safe,
    /// The latest finalized block.
    Finalized,
}

impl BlockTag {
    /// The JSON-RPC spelling of this tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Earliest => "earliest",
            Self::Pending => "pending",
            Self::Safe => "safe",
            Self::Finalized => "finalized",
        }
    }
}

/// A caller-supplied reference to a block.
///
/// Numeric references are already canonical. Tags must be resolved against a
/// node before they can be used as cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockReference {
    /// A concrete block number.
    Number(u64),
    /// A symbolic block tag.
    Tag(BlockTag),
}

impl BlockReference {
    /// Return the block number if this reference is already numeric.
    pub const fn as_number(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Tag(_) => None,
        }
    }

    /// Render as a JSON-RPC block parameter (`0x`-prefixed hex or tag).
    pub fn to_rpc_param(self) -> String {
        match self {
            Self::Number(n) => format!("{n:#x}"),
            Self::Tag(tag) => tag.as_str().to_owned(),
        }
    }
}

impl From<u64> for BlockReference {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<BlockTag> for BlockReference {
    fn from(tag: BlockTag) -> Self {
        Self::Tag(tag)
    }
}

impl fmt::Display for BlockReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Tag(tag) => f.write_str(tag.as_str()),
        }
    }
}

impl FromStr for BlockReference {
    type Err = ParseError;

    /// Accepts a decimal number, a `0x`-prefixed hex number, or a tag name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let tag = match trimmed.to_ascii_lowercase().as_str() {
            "latest" => Some(BlockTag::Latest),
            "earliest" => Some(BlockTag::Earliest),
            "pending" => Some(BlockTag::Pending),
            "safe" => Some(BlockTag::Safe),
            "finalized" => Some(BlockTag::Finalized),
            _ => None,
        };
        if let Some(tag) = tag {
            return Ok(Self::Tag(tag));
        }

        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.replace('_', "").parse::<u64>(),
        };
        parsed
            .map(Self::Number)
            .map_err(|e| ParseError::BlockReference(format!("{s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_kind_round_trips_through_str() {
        for kind in DatasetKind::ALL {
            assert_eq!(kind.as_str().parse::<DatasetKind>().unwrap(), kind);
        }
        assert!("block_times".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn dataset_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&DatasetKind::ContractCreationBlocks).unwrap();
        assert_eq!(json, "\"contract_creation_blocks\"");
    }

    #[test]
    fn block_reference_parses_decimal_hex_and_tags() {
        assert_eq!(
            "14000000".parse::<BlockReference>().unwrap(),
            BlockReference::Number(14_000_000)
        );
        assert_eq!(
            "14_000_000".parse::<BlockReference>().unwrap(),
            BlockReference::Number(14_000_000)
        );
        assert_eq!(
            "0x10".parse::<BlockReference>().unwrap(),
            BlockReference::Number(16)
        );
        assert_eq!(
            "Latest".parse::<BlockReference>().unwrap(),
            BlockReference::Tag(BlockTag::Latest)
        );
        assert!("yesterday".parse::<BlockReference>().is_err());
    }

    #[test]
    fn block_reference_rpc_param() {
        assert_eq!(BlockReference::Number(255).to_rpc_param(), "0xff");
        assert_eq!(BlockReference::Tag(BlockTag::Finalized).to_rpc_param(), "finalized");
    }

    #[test]
    fn block_reference_deserializes_untagged() {
        let refs: Vec<BlockReference> = serde_json::from_str(r#"[7, "latest"]"#).unwrap();
        assert_eq!(
            refs,
            vec![BlockReference::Number(7), BlockReference::Tag(BlockTag::Latest)]
        );
    }
}
