//! Error types for the cache-or-fetch layer.
//!
//! [`CacheError`] is what callers of [`FactCache`] see. It sorts every
//! failure into the four outcomes a caller can act on: fix the
//! configuration, fix the store, retry the remote, or accept that a fact
//! does not exist. Store errors are classified on the way in so a
//! misconfigured data source is never reported as a query failure.
//!
//! [`FactCache`]: crate::cache::FactCache

use chainfacts_db::DbError;
use chainfacts_types::{DatasetKind, Network};

/// Errors raised by a remote source or normalizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a response (connection, timeout, HTTP status).
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// A response arrived but could not be understood.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the failure.
        message: String,
    },

    /// The remote node answered with an error object.
    #[error("remote node error {code}: {message}")]
    Rpc {
        /// Error code reported by the node.
        code: i64,
        /// Error message reported by the node.
        message: String,
    },
}

impl RemoteError {
    /// Shorthand for a [`RemoteError::Decode`].
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Errors returned by [`FactCache`](crate::cache::FactCache) operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The data source configuration is missing or malformed. Not retried.
    #[error("configuration error: {0}")]
    Configuration(#[source] chainfacts_types::DataSourceError),

    /// The store could not be opened.
    #[error("store unavailable: {0}")]
    StoreOpen(#[source] DbError),

    /// A query against an opened store failed.
    #[error("store error: {0}")]
    Store(#[source] DbError),

    /// Fetching from the remote source failed.
    #[error("remote fetch failed: {0}")]
    RemoteFetch(#[from] RemoteError),

    /// A requested key had no value after merging store and remote results.
    #[error("no {dataset} value for key {key} on network {network}")]
    IncompleteResult {
        /// Dataset that was being looked up.
        dataset: DatasetKind,
        /// Network that was being looked up.
        network: Network,
        /// The first key left unresolved, rendered as text.
        key: String,
    },
}

impl From<DbError> for CacheError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Configuration(source) => Self::Configuration(source),
            err if err.is_store_open() => Self::StoreOpen(err),
            err => Self::Store(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use chainfacts_types::DataSourceError;

    use super::*;

    #[test]
    fn db_errors_are_classified() {
        let configuration = DbError::Configuration(DataSourceError::Unconfigured {
            dataset: DatasetKind::BlockTimestamps,
            network: Network::MAINNET,
        });
        assert!(matches!(
            CacheError::from(configuration),
            CacheError::Configuration(DataSourceError::Unconfigured { .. })
        ));

        let open = DbError::CreateDir {
            path: "/readonly/chainfacts".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(matches!(CacheError::from(open), CacheError::StoreOpen(_)));

        let query = DbError::Corrupt {
            column: "block_timestamps.block_timestamp",
            message: "negative".to_owned(),
        };
        assert!(matches!(CacheError::from(query), CacheError::Store(_)));
    }

    #[test]
    fn incomplete_result_names_key() {
        let err = CacheError::IncompleteResult {
            dataset: DatasetKind::BlockTimestamps,
            network: Network::MAINNET,
            key: "205".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "no block_timestamps value for key 205 on network 1"
        );
    }
}
