//! Cache-or-fetch orchestrator.
//!
//! [`FactCache::lookup_batch`] answers a batch of references for one
//! dataset on one network:
//!
//! 1. Normalize references to canonical keys while the store opens.
//! 2. Read every key from the store in one batched query.
//! 3. Send the miss-set to the [`BatchedFetcher`].
//! 4. Merge store hits and fetched values, re-emitted in input order.
//!
//! Lookups never write. Persisting fetched facts is the job of
//! [`FactCache::backfill`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chainfacts_db::{StorePool, StoreProvisioner};
use chainfacts_types::Network;

use crate::dataset::Dataset;
use crate::error::{CacheError, RemoteError};
use crate::fetcher::BatchedFetcher;
use crate::source::{Normalizer, RemoteSource};

/// Looks up chain facts in the local store, falling back to a remote node.
pub struct FactCache {
    provisioner: Arc<StoreProvisioner>,
    fetcher: BatchedFetcher,
}

impl FactCache {
    /// Create an orchestrator over a provisioner and a fetch policy.
    pub const fn new(provisioner: Arc<StoreProvisioner>, fetcher: BatchedFetcher) -> Self {
        Self {
            provisioner,
            fetcher,
        }
    }

    /// The provisioner stores are opened through.
    pub fn provisioner(&self) -> &StoreProvisioner {
        &self.provisioner
    }

    /// The fetch policy for cache misses.
    pub const fn fetcher(&self) -> &BatchedFetcher {
        &self.fetcher
    }

    /// Look up one value per reference, in input order.
    ///
    /// With `use_cache` false, or when no store is configured for the
    /// pair, every key is fetched remotely. Duplicate references are
    /// answered from one lookup.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Configuration`] for a malformed data source spec
    /// - [`CacheError::StoreOpen`] / [`CacheError::Store`] for store failures
    /// - [`CacheError::RemoteFetch`] if normalization or a chunk fetch fails
    /// - [`CacheError::IncompleteResult`] naming the first key left without
    ///   a value
    pub async fn lookup_batch<D, N, S>(
        &self,
        normalizer: &N,
        source: &S,
        network: Network,
        references: &[D::Reference],
        use_cache: bool,
    ) -> Result<Vec<D::Value>, CacheError>
    where
        D: Dataset,
        N: Normalizer<D>,
        S: RemoteSource<D>,
    {
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let (keys, store) = tokio::try_join!(
            normalize::<D, N>(normalizer, references),
            self.open_cache::<D>(network, use_cache),
        )?;

        let cached = match &store {
            Some(store) => D::query_store(store, network, &keys).await?,
            None => vec![None; keys.len()],
        };

        let misses = miss_set(&keys, &cached);
        tracing::debug!(
            dataset = D::KIND.as_str(),
            network = network.chain_id(),
            requested = keys.len(),
            hits = cached.iter().filter(|hit| hit.is_some()).count(),
            misses = misses.len(),
            "Store lookup complete"
        );

        let mut resolved = if misses.is_empty() {
            HashMap::new()
        } else {
            self.fetcher.fetch_remaining::<D, S>(source, &misses).await?
        };
        for (key, hit) in keys.iter().zip(cached) {
            if let Some(value) = hit {
                resolved.entry(key.clone()).or_insert(value);
            }
        }

        keys.iter()
            .map(|key| {
                resolved
                    .get(key)
                    .cloned()
                    .ok_or_else(|| incomplete::<D>(network, key))
            })
            .collect()
    }

    /// Look up a single reference.
    ///
    /// # Errors
    ///
    /// Same as [`Self::lookup_batch`].
    pub async fn lookup_one<D, N, S>(
        &self,
        normalizer: &N,
        source: &S,
        network: Network,
        reference: D::Reference,
        use_cache: bool,
    ) -> Result<D::Value, CacheError>
    where
        D: Dataset,
        N: Normalizer<D>,
        S: RemoteSource<D>,
    {
        let values = self
            .lookup_batch::<D, N, S>(
                normalizer,
                source,
                network,
                std::slice::from_ref(&reference),
                use_cache,
            )
            .await?;
        values
            .into_iter()
            .next()
            .ok_or_else(|| incomplete::<D>(network, &reference))
    }

    /// Fetch the keys missing from the store and persist them.
    ///
    /// Only keys absent from the store are requested. Every fetched entry
    /// is written in one transaction with insert-or-ignore semantics.
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if no store backs the pair,
    /// [`CacheError::IncompleteResult`] if the remote has no value for a
    /// missing key (nothing is written), and the store and remote errors
    /// of [`Self::lookup_batch`].
    pub async fn backfill<D, S>(
        &self,
        source: &S,
        network: Network,
        keys: &[D::Key],
    ) -> Result<u64, CacheError>
    where
        D: Dataset,
        S: RemoteSource<D>,
    {
        let store = self.provisioner.require_store(D::KIND, network).await?;
        let cached = D::query_store(&store, network, keys).await?;
        let misses = miss_set(keys, &cached);
        if misses.is_empty() {
            tracing::info!(
                dataset = D::KIND.as_str(),
                network = network.chain_id(),
                requested = keys.len(),
                "Nothing to backfill"
            );
            return Ok(0);
        }

        let mut fetched = self.fetcher.fetch_remaining::<D, S>(source, &misses).await?;
        let mut entries = Vec::with_capacity(misses.len());
        for key in misses {
            let value = fetched
                .remove(&key)
                .ok_or_else(|| incomplete::<D>(network, &key))?;
            entries.push((key, value));
        }

        let written = D::write_store(&store, network, &entries).await?;
        tracing::info!(
            dataset = D::KIND.as_str(),
            network = network.chain_id(),
            requested = keys.len(),
            fetched = entries.len(),
            written,
            "Backfill complete"
        );
        Ok(written)
    }

    async fn open_cache<D: Dataset>(
        &self,
        network: Network,
        use_cache: bool,
    ) -> Result<Option<StorePool>, CacheError> {
        if !use_cache {
            return Ok(None);
        }
        Ok(self
            .provisioner
            .resolve_and_open(D::KIND, network, true)
            .await?)
    }
}

/// Normalize references, checking the result is parallel to the input.
async fn normalize<D, N>(
    normalizer: &N,
    references: &[D::Reference],
) -> Result<Vec<D::Key>, CacheError>
where
    D: Dataset,
    N: Normalizer<D>,
{
    let keys = normalizer.normalize(references).await?;
    if keys.len() != references.len() {
        return Err(RemoteError::decode(format!(
            "normalizer returned {} keys for {} references",
            keys.len(),
            references.len()
        ))
        .into());
    }
    Ok(keys)
}

/// Keys without a store value, deduplicated, in first-seen order.
fn miss_set<K, V>(keys: &[K], cached: &[Option<V>]) -> Vec<K>
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut seen = HashSet::new();
    keys.iter()
        .zip(cached)
        .filter(|(key, hit)| hit.is_none() && seen.insert(*key))
        .map(|(key, _)| key.clone())
        .collect()
}

fn incomplete<D: Dataset>(network: Network, key: &impl std::fmt::Display) -> CacheError {
    CacheError::IncompleteResult {
        dataset: D::KIND,
        network,
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_set_keeps_first_occurrence_order() {
        let keys = [100_u64, 205, 100, 7, 205];
        let cached = [None, Some(1_u64), None, None, Some(1)];
        assert_eq!(miss_set(&keys, &cached), vec![100, 7]);
    }

    #[test]
    fn miss_set_of_full_hits_is_empty() {
        let keys = [1_u64, 2];
        let cached = [Some(10_u64), Some(20)];
        assert!(miss_set(&keys, &cached).is_empty());
    }
}
