//! JSON-RPC remote source for chainfacts.
//!
//! Connects the cache-or-fetch orchestrator to an Ethereum JSON-RPC node
//! over HTTP (`reqwest`). Numeric quantities and bytecode are decoded with
//! `alloy-primitives`.
//!
//! # Modules
//!
//! - [`client`] -- [`JsonRpcClient`]: single and batched calls
//! - [`eth`] -- Typed `eth_*` methods
//! - [`source`] -- [`NodeSource`]: normalizer and remote source impls
//! - [`error`] -- [`RpcError`]

pub mod client;
pub mod error;
pub mod eth;
pub mod source;

pub use client::JsonRpcClient;
pub use error::RpcError;
pub use eth::BlockHeader;
pub use source::NodeSource;
