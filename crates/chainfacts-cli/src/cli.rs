//! Command-line definitions.

use std::path::PathBuf;

use alloy_primitives::Address;
use chainfacts_types::{BlockReference, DatasetKind};
use clap::{Parser, Subcommand};

/// Cache-or-fetch lookups of blockchain facts.
#[derive(Debug, Parser)]
#[command(name = "chainfacts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to `$CHAINFACTS_CONFIG` or
    /// `~/.config/chainfacts/config.yaml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a summary of the current configuration.
    Config {
        /// Show provider URLs, which may embed API keys.
        #[arg(long)]
        reveal: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Look up block timestamps.
    BlockTimestamps {
        /// Block numbers (decimal or 0x hex) or tags such as `latest`.
        #[arg(required = true)]
        blocks: Vec<BlockReference>,

        /// Network name or chain id.
        #[arg(short, long)]
        network: Option<String>,

        /// Skip the local store and fetch everything from the node.
        #[arg(long)]
        no_cache: bool,
    },

    /// Look up the block in which contracts were deployed.
    CreationBlock {
        /// Contract addresses.
        #[arg(required = true)]
        addresses: Vec<Address>,

        /// Network name or chain id.
        #[arg(short, long)]
        network: Option<String>,

        /// Skip the local store and fetch everything from the node.
        #[arg(long)]
        no_cache: bool,
    },

    /// Fetch and store the timestamps of an inclusive block range.
    BackfillTimestamps {
        /// First block.
        start: u64,

        /// Last block.
        end: u64,

        /// Network name or chain id.
        #[arg(short, long)]
        network: Option<String>,
    },

    /// List schema versions recorded in configured stores.
    SchemaVersions {
        /// Network name or chain id.
        #[arg(short, long)]
        network: Option<String>,

        /// Only this dataset (`block_timestamps`, `contract_creation_blocks`).
        #[arg(short, long)]
        dataset: Option<DatasetKind>,
    },
}
