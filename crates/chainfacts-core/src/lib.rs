//! Cache-or-fetch orchestration for chainfacts.
//!
//! Given a batch of references for one dataset on one network, this crate
//! answers from the local store where it can and from a remote node where
//! it must, returning one value per reference in input order.
//!
//! # Modules
//!
//! - [`dataset`] -- [`Dataset`] trait and the block timestamp / contract
//!   creation block datasets.
//! - [`source`] -- [`Normalizer`] and [`RemoteSource`] collaborator traits.
//! - [`fetcher`] -- [`BatchedFetcher`]: chunked, bounded-concurrency remote
//!   fetches.
//! - [`cache`] -- [`FactCache`]: the orchestrator.
//! - [`config`] -- Configuration loading from YAML into typed structs.
//! - [`error`] -- [`CacheError`] and [`RemoteError`].

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod source;

pub use cache::FactCache;
pub use config::{ChainfactsConfig, ConfigError};
pub use dataset::{BlockTimestamps, ContractCreationBlocks, Dataset, LookupKey};
pub use error::{CacheError, RemoteError};
pub use fetcher::BatchedFetcher;
pub use source::{Canonical, Normalizer, RemoteSource};
