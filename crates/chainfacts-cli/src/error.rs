//! Error types for the `chainfacts` binary.
//!
//! [`CliError`] is the top-level error type that wraps every failure a
//! command can hit, so `main` can propagate with `?`.

use chainfacts_types::Network;

/// Top-level error for the `chainfacts` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: chainfacts_core::ConfigError,
    },

    /// A lookup or backfill failed.
    #[error("{source}")]
    Cache {
        /// The underlying cache error.
        #[from]
        source: chainfacts_core::CacheError,
    },

    /// Inspecting a store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: chainfacts_db::DbError,
    },

    /// The JSON-RPC client could not be created.
    #[error("rpc error: {source}")]
    Rpc {
        /// The underlying RPC error.
        #[from]
        source: chainfacts_rpc::RpcError,
    },

    /// No provider is configured for the network.
    #[error("no provider configured for network {network} (set CHAINFACTS_RPC_URL or add one to the config)")]
    NoProvider {
        /// Network without a provider.
        network: Network,
    },

    /// A block range was given with its end before its start.
    #[error("invalid block range {start}..={end}")]
    InvalidRange {
        /// First block.
        start: u64,
        /// Last block.
        end: u64,
    },

    /// JSON output could not be rendered.
    #[error("json error: {source}")]
    Json {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
