//! Dataset descriptions: what a cached fact is keyed by and where it lives.
//!
//! A [`Dataset`] ties a [`DatasetKind`] to its key and value types and to
//! the store queries that read and write it. The orchestrator is generic
//! over this trait, so adding a dataset means adding a table, a store, and
//! one impl here.

use std::fmt;
use std::future::Future;
use std::hash::Hash;

use alloy_primitives::Address;
use chainfacts_db::{BlockTimestampStore, ContractCreationStore, DbError, StorePool};
use chainfacts_types::{BlockReference, DatasetKind, Network};

/// Requirements on a canonical lookup key.
///
/// Keys are compared and hashed to build the miss-set and the merge
/// mapping, and rendered as text in [`CacheError::IncompleteResult`].
///
/// [`CacheError::IncompleteResult`]: crate::error::CacheError::IncompleteResult
pub trait LookupKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> LookupKey for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// A category of cacheable chain fact.
pub trait Dataset: Send + Sync + 'static {
    /// What callers ask for. May be symbolic (e.g. `latest`).
    type Reference: Clone + fmt::Display + Send + Sync;

    /// Canonical, comparable form of a reference.
    type Key: LookupKey;

    /// The cached fact.
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    /// Registry and configuration name of the dataset.
    const KIND: DatasetKind;

    /// Batched point lookup; the result is parallel to `keys`.
    fn query_store(
        store: &StorePool,
        network: Network,
        keys: &[Self::Key],
    ) -> impl Future<Output = Result<Vec<Option<Self::Value>>, DbError>> + Send;

    /// Insert entries, ignoring keys already stored. Returns rows written.
    fn write_store(
        store: &StorePool,
        network: Network,
        entries: &[(Self::Key, Self::Value)],
    ) -> impl Future<Output = Result<u64, DbError>> + Send;
}

/// Unix timestamp (seconds) of each block, keyed by block number.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTimestamps;

impl Dataset for BlockTimestamps {
    type Reference = BlockReference;
    type Key = u64;
    type Value = u64;

    const KIND: DatasetKind = DatasetKind::BlockTimestamps;

    async fn query_store(
        store: &StorePool,
        network: Network,
        keys: &[u64],
    ) -> Result<Vec<Option<u64>>, DbError> {
        BlockTimestampStore::new(store)
            .query_timestamps(network, keys)
            .await
    }

    async fn write_store(
        store: &StorePool,
        network: Network,
        entries: &[(u64, u64)],
    ) -> Result<u64, DbError> {
        BlockTimestampStore::new(store)
            .insert_timestamps(network, entries)
            .await
    }
}

/// Block number in which each contract was deployed, keyed by address.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractCreationBlocks;

impl Dataset for ContractCreationBlocks {
    type Reference = Address;
    type Key = Address;
    type Value = u64;

    const KIND: DatasetKind = DatasetKind::ContractCreationBlocks;

    async fn query_store(
        store: &StorePool,
        network: Network,
        keys: &[Address],
    ) -> Result<Vec<Option<u64>>, DbError> {
        ContractCreationStore::new(store)
            .query_creation_blocks(network, keys)
            .await
    }

    async fn write_store(
        store: &StorePool,
        network: Network,
        entries: &[(Address, u64)],
    ) -> Result<u64, DbError> {
        ContractCreationStore::new(store)
            .insert_creation_blocks(network, entries)
            .await
    }
}
