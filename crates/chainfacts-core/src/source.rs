//! Collaborator traits for the remote side of a lookup.
//!
//! The orchestrator never talks to a node directly. It is handed a
//! [`Normalizer`] that turns caller references into canonical keys and a
//! [`RemoteSource`] that fetches values for keys the store does not have.
//! Both are bound to a single network by whoever constructs them.

use std::future::Future;

use alloy_primitives::Address;

use crate::dataset::{ContractCreationBlocks, Dataset};
use crate::error::RemoteError;

/// Resolves caller references to canonical keys.
pub trait Normalizer<D: Dataset>: Send + Sync {
    /// Resolve `references` to keys.
    ///
    /// The result must be parallel to `references`: one key per reference,
    /// in the same order.
    fn normalize(
        &self,
        references: &[D::Reference],
    ) -> impl Future<Output = Result<Vec<D::Key>, RemoteError>> + Send;
}

/// Fetches values for canonical keys from a remote node.
pub trait RemoteSource<D: Dataset>: Send + Sync {
    /// Fetch one chunk of keys.
    ///
    /// Each returned pair carries its own key. Pairs may come back in any
    /// order, and keys the remote has no value for are simply left out.
    fn fetch_chunk(
        &self,
        keys: &[D::Key],
    ) -> impl Future<Output = Result<Vec<(D::Key, D::Value)>, RemoteError>> + Send;
}

/// A normalizer for datasets whose references already are their keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonical;

impl Normalizer<ContractCreationBlocks> for Canonical {
    async fn normalize(&self, references: &[Address]) -> Result<Vec<Address>, RemoteError> {
        Ok(references.to_vec())
    }
}
