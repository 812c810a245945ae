//! Shared type definitions for the chainfacts workspace.
//!
//! This crate is the single source of truth for the vocabulary used by the
//! store layer, the cache-or-fetch orchestrator, and the remote sources.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers ([`Network`])
//! - [`enums`] -- Dataset kinds and block references
//! - [`datasource`] -- Per-dataset, per-network backend configuration

pub mod datasource;
pub mod enums;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use datasource::{DataSourceError, DataSourceSpec, DataSources, LeafDataSource, StoreConfig};
pub use enums::{BlockReference, BlockTag, DatasetKind, ParseError};
pub use ids::Network;
