//! Chain node collaborators for the cache-or-fetch orchestrator.
//!
//! [`NodeSource`] wraps one [`JsonRpcClient`] and implements the core's
//! collaborator traits for every dataset:
//!
//! - block references are normalized by resolving each distinct tag once,
//!   all in one batch
//! - block timestamps come from batched `eth_getBlockByNumber`
//! - contract creation blocks come from a binary search over
//!   `eth_getCode`, which needs an archive node

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use alloy_primitives::Address;
use chainfacts_core::{
    BlockTimestamps, ContractCreationBlocks, Normalizer, RemoteError, RemoteSource,
};
use chainfacts_types::{BlockReference, BlockTag};
use futures::{StreamExt, TryStreamExt, stream};

use crate::client::JsonRpcClient;
use crate::error::RpcError;

/// Default number of addresses searched concurrently within one chunk.
pub const DEFAULT_CREATION_CONCURRENCY: usize = 8;

/// Remote source and normalizer backed by a JSON-RPC node.
#[derive(Clone)]
pub struct NodeSource {
    client: Arc<JsonRpcClient>,
    creation_concurrency: usize,
}

impl NodeSource {
    /// Create a source over a client.
    pub const fn new(client: Arc<JsonRpcClient>) -> Self {
        Self {
            client,
            creation_concurrency: DEFAULT_CREATION_CONCURRENCY,
        }
    }

    /// Set how many addresses are searched at once (minimum 1).
    #[must_use]
    pub const fn with_creation_concurrency(mut self, max: usize) -> Self {
        self.creation_concurrency = if max == 0 { 1 } else { max };
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &JsonRpcClient {
        &self.client
    }

    /// Block in which `address` got its code, or `None` if it has none
    /// at `latest`.
    async fn creation_block(
        &self,
        address: Address,
        latest: u64,
    ) -> Result<Option<u64>, RpcError> {
        first_block_with_code(latest, |block| async move {
            let code = self
                .client
                .code_at(address, BlockReference::Number(block))
                .await?;
            Ok::<_, RpcError>(!code.is_empty())
        })
        .await
    }
}

impl Normalizer<BlockTimestamps> for NodeSource {
    async fn normalize(&self, references: &[BlockReference]) -> Result<Vec<u64>, RemoteError> {
        let tags: BTreeSet<BlockTag> = references
            .iter()
            .filter_map(|reference| match reference {
                BlockReference::Tag(tag) => Some(*tag),
                BlockReference::Number(_) => None,
            })
            .collect();

        let mut resolved: HashMap<BlockTag, u64> = HashMap::with_capacity(tags.len());
        if !tags.is_empty() {
            let queries: Vec<BlockReference> = tags.iter().copied().map(BlockReference::Tag).collect();
            let headers = self.client.block_headers(&queries).await?;
            for (tag, header) in tags.iter().zip(headers) {
                let header = header.ok_or_else(|| {
                    RemoteError::decode(format!("node has no {} block", tag.as_str()))
                })?;
                tracing::debug!(tag = tag.as_str(), block = header.number(), "Resolved block tag");
                resolved.insert(*tag, header.number());
            }
        }

        references
            .iter()
            .map(|reference| match reference {
                BlockReference::Number(number) => Ok(*number),
                BlockReference::Tag(tag) => resolved.get(tag).copied().ok_or_else(|| {
                    RemoteError::decode(format!("tag {} was not resolved", tag.as_str()))
                }),
            })
            .collect()
    }
}

impl RemoteSource<BlockTimestamps> for NodeSource {
    async fn fetch_chunk(&self, keys: &[u64]) -> Result<Vec<(u64, u64)>, RemoteError> {
        let blocks: Vec<BlockReference> = keys.iter().copied().map(BlockReference::from).collect();
        let headers = self.client.block_headers(&blocks).await?;
        Ok(headers
            .into_iter()
            .flatten()
            .map(|header| (header.number(), header.timestamp()))
            .collect())
    }
}

impl RemoteSource<ContractCreationBlocks> for NodeSource {
    async fn fetch_chunk(&self, keys: &[Address]) -> Result<Vec<(Address, u64)>, RemoteError> {
        let latest = self.client.block_number().await?;
        let found: Vec<Option<(Address, u64)>> = stream::iter(keys.iter().copied())
            .map(|address| async move {
                let block = self.creation_block(address, latest).await?;
                Ok::<_, RpcError>(block.map(|block| (address, block)))
            })
            .buffer_unordered(self.creation_concurrency)
            .try_collect()
            .await?;
        Ok(found.into_iter().flatten().collect())
    }
}

/// Binary search for the first block at which `has_code` holds.
///
/// Assumes code, once deployed, stays deployed up to `latest`. Returns
/// `None` if there is no code at `latest`.
pub(crate) async fn first_block_with_code<F, Fut>(
    latest: u64,
    mut has_code: F,
) -> Result<Option<u64>, RpcError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<bool, RpcError>>,
{
    if !has_code(latest).await? {
        return Ok(None);
    }

    let (mut low, mut high) = (0_u64, latest);
    while low < high {
        let mid = low.saturating_add(high.saturating_sub(low) / 2);
        if has_code(mid).await? {
            high = mid;
        } else {
            low = mid.saturating_add(1);
        }
    }
    Ok(Some(low))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn finds_deployment_block() {
        let calls = AtomicUsize::new(0);
        let found = first_block_with_code(18_000_000, |block| {
            calls.fetch_add(1, Ordering::Relaxed);
            async move { Ok(block >= 4_719_568) }
        })
        .await
        .unwrap();

        assert_eq!(found, Some(4_719_568));
        // One probe at latest plus at most ceil(log2(18M)) = 25 probes.
        assert!(calls.load(Ordering::Relaxed) <= 26);
    }

    #[tokio::test]
    async fn genesis_contract() {
        let found = first_block_with_code(100, |_| async { Ok(true) }).await.unwrap();
        assert_eq!(found, Some(0));
    }

    #[tokio::test]
    async fn no_code_at_latest_is_absent() {
        let found = first_block_with_code(100, |_| async { Ok(false) }).await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn probe_failure_propagates() {
        let err = first_block_with_code(100, |block| async move {
            if block == 100 {
                Ok(true)
            } else {
                Err(RpcError::Transport("timeout".to_owned()))
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
