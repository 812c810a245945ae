//! Batched remote fetcher.
//!
//! Splits a set of missing keys into chunks no larger than the remote's
//! batch limit and requests them with bounded concurrency. Chunks may
//! complete in any order; results are indexed by the key each returned
//! item carries, never by request position.

use std::collections::{HashMap, HashSet};

use futures::{StreamExt, TryStreamExt, stream};

use crate::dataset::Dataset;
use crate::error::RemoteError;
use crate::source::RemoteSource;

/// Default number of keys per remote request.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of chunk requests in flight at once.
pub const DEFAULT_MAX_CONCURRENT_CHUNKS: usize = 4;

/// Chunking and concurrency policy for remote fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchedFetcher {
    chunk_size: usize,
    max_concurrent_chunks: usize,
}

impl Default for BatchedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchedFetcher {
    /// Create a fetcher with the default policy.
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_chunks: DEFAULT_MAX_CONCURRENT_CHUNKS,
        }
    }

    /// Set the maximum number of keys per request (minimum 1).
    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the maximum number of requests in flight (minimum 1).
    #[must_use]
    pub const fn with_max_concurrent_chunks(mut self, max: usize) -> Self {
        self.max_concurrent_chunks = if max == 0 { 1 } else { max };
        self
    }

    /// Maximum number of keys per request.
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maximum number of requests in flight.
    pub const fn max_concurrent_chunks(&self) -> usize {
        self.max_concurrent_chunks
    }

    /// Fetch values for `keys` from `source`.
    ///
    /// Duplicate keys are requested once. Keys the remote has no value for
    /// are absent from the returned map, and items for keys that were not
    /// requested are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first chunk failure. Requests still in flight are
    /// cancelled and no partial map is returned.
    pub async fn fetch_remaining<D, S>(
        &self,
        source: &S,
        keys: &[D::Key],
    ) -> Result<HashMap<D::Key, D::Value>, RemoteError>
    where
        D: Dataset,
        S: RemoteSource<D>,
    {
        let mut requested: HashSet<D::Key> = HashSet::with_capacity(keys.len());
        let unique: Vec<D::Key> = keys
            .iter()
            .filter(|key| requested.insert((*key).clone()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::debug!(
            dataset = D::KIND.as_str(),
            keys = unique.len(),
            chunks = unique.len().div_ceil(self.chunk_size),
            chunk_size = self.chunk_size,
            "Fetching missing keys from remote"
        );

        let mut responses = stream::iter(unique.chunks(self.chunk_size))
            .map(|chunk| RemoteSource::<D>::fetch_chunk(source, chunk))
            .buffer_unordered(self.max_concurrent_chunks);

        let mut fetched: HashMap<D::Key, D::Value> = HashMap::with_capacity(unique.len());
        while let Some(items) = responses.try_next().await? {
            for (key, value) in items {
                if requested.contains(&key) {
                    fetched.insert(key, value);
                } else {
                    tracing::debug!(
                        dataset = D::KIND.as_str(),
                        key = %key,
                        "Ignoring remote item for a key that was not requested"
                    );
                }
            }
        }

        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::dataset::BlockTimestamps;

    /// Remote that answers `block * 10`, records every chunk, and finishes
    /// larger-keyed chunks first.
    #[derive(Default)]
    struct RecordingSource {
        chunks: Mutex<Vec<Vec<u64>>>,
        fail_on: Option<u64>,
        omit: Option<u64>,
        extra: Option<u64>,
    }

    impl RemoteSource<BlockTimestamps> for RecordingSource {
        async fn fetch_chunk(&self, keys: &[u64]) -> Result<Vec<(u64, u64)>, RemoteError> {
            self.chunks.lock().unwrap().push(keys.to_vec());
            let first = keys.first().copied().unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(50_u64.saturating_sub(first))).await;
            if self.fail_on.is_some_and(|bad| keys.contains(&bad)) {
                return Err(RemoteError::Transport {
                    message: "connection reset".to_owned(),
                });
            }
            let mut items: Vec<(u64, u64)> = keys
                .iter()
                .filter(|key| Some(**key) != self.omit)
                .map(|key| (*key, key * 10))
                .rev()
                .collect();
            items.extend(self.extra.map(|key| (key, 0)));
            Ok(items)
        }
    }

    #[tokio::test]
    async fn issues_ceil_n_over_c_chunks() {
        let source = RecordingSource::default();
        let fetcher = BatchedFetcher::new().with_chunk_size(3);
        let keys: Vec<u64> = (1..=10).collect();

        let fetched = fetcher
            .fetch_remaining::<BlockTimestamps, _>(&source, &keys)
            .await
            .unwrap();

        let chunks = source.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 3));
        assert_eq!(fetched.len(), 10);
        assert_eq!(fetched[&7], 70);
    }

    #[tokio::test]
    async fn tolerates_out_of_order_completion() {
        let source = RecordingSource::default();
        let fetcher = BatchedFetcher::new()
            .with_chunk_size(2)
            .with_max_concurrent_chunks(8);
        let keys = [1, 2, 30, 31, 45, 46];

        let fetched = fetcher
            .fetch_remaining::<BlockTimestamps, _>(&source, &keys)
            .await
            .unwrap();

        for key in keys {
            assert_eq!(fetched[&key], key * 10);
        }
    }

    #[tokio::test]
    async fn duplicate_keys_are_requested_once() {
        let source = RecordingSource::default();
        let fetcher = BatchedFetcher::new();

        fetcher
            .fetch_remaining::<BlockTimestamps, _>(&source, &[5, 5, 6, 5])
            .await
            .unwrap();

        assert_eq!(*source.chunks.lock().unwrap(), vec![vec![5, 6]]);
    }

    #[tokio::test]
    async fn empty_input_makes_no_requests() {
        let source = RecordingSource::default();
        let fetched = BatchedFetcher::new()
            .fetch_remaining::<BlockTimestamps, _>(&source, &[])
            .await
            .unwrap();
        assert!(fetched.is_empty());
        assert!(source.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failed_chunk_fails_the_fetch() {
        let source = RecordingSource {
            fail_on: Some(4),
            ..RecordingSource::default()
        };
        let fetcher = BatchedFetcher::new().with_chunk_size(2);

        let err = fetcher
            .fetch_remaining::<BlockTimestamps, _>(&source, &[1, 2, 3, 4, 5, 6])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport { .. }));
    }

    #[tokio::test]
    async fn omitted_and_unrequested_items() {
        let source = RecordingSource {
            omit: Some(2),
            extra: Some(99),
            ..RecordingSource::default()
        };

        let fetched = BatchedFetcher::new()
            .fetch_remaining::<BlockTimestamps, _>(&source, &[1, 2, 3])
            .await
            .unwrap();

        assert_eq!(fetched.len(), 2);
        assert!(!fetched.contains_key(&2));
        assert!(!fetched.contains_key(&99));
    }

    #[test]
    fn zero_policy_values_are_clamped() {
        let fetcher = BatchedFetcher::new()
            .with_chunk_size(0)
            .with_max_concurrent_chunks(0);
        assert_eq!(fetcher.chunk_size(), 1);
        assert_eq!(fetcher.max_concurrent_chunks(), 1);
    }
}
