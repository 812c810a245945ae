//! Store layer for chainfacts (`SQLite` or `PostgreSQL` through `sqlx`).
//!
//! Chain facts such as block timestamps are expensive to fetch from a node
//! but never change once final, so they are persisted in a local store and
//! read back on later lookups. This crate opens those stores, keeps their
//! schemas self-describing through a version registry, and runs the batched
//! point lookups the orchestrator needs.
//!
//! # Architecture
//!
//! ```text
//! StoreProvisioner::resolve_and_open(dataset, network)
//!     |
//!     +-- DataSources lookup --> store / remote / hybrid
//!     +-- StorePool::open ------> SQLite file or PostgreSQL server
//!     +-- initialize_schema ----> one transaction:
//!         |-- schema_versions         (registry table)
//!         |-- dataset tables          (block_timestamps, ...)
//!         +-- version row             (dataset, network, version)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- Connection pool handle, options, and dialect helpers
//! - [`schema_versions`] -- Schema version registry
//! - [`schemas`] -- Dataset table DDL and schema initialization
//! - [`block_timestamp_store`] -- Batched block timestamp lookups and inserts
//! - [`contract_creation_store`] -- Batched contract creation block lookups and inserts
//! - [`provisioner`] -- Resolve configuration to shared, initialized stores
//! - [`error`] -- Shared error types

pub mod block_timestamp_store;
pub mod contract_creation_store;
pub mod error;
pub mod provisioner;
pub mod schema_versions;
pub mod schemas;
pub mod store;

// Re-export primary types for convenience.
pub use block_timestamp_store::BlockTimestampStore;
pub use contract_creation_store::ContractCreationStore;
pub use error::DbError;
pub use provisioner::StoreProvisioner;
pub use schema_versions::SchemaVersion;
pub use schemas::SchemaStatus;
pub use store::{Dialect, StoreOptions, StorePool};
