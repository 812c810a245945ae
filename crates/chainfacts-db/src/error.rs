//! Error types for the store layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with additional context about which step failed. The
//! variants map onto the taxonomy the orchestrator exposes: configuration
//! problems, failures to open a store, and failures of individual queries.

use std::path::PathBuf;

use chainfacts_types::DataSourceError;

/// Errors that can occur in the store layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The data source configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(#[from] DataSourceError),

    /// The store could not be opened (unreachable, corrupt, bad URL).
    #[error("failed to open {dbms} store: {source}")]
    StoreOpen {
        /// Database engine that was being opened.
        dbms: &'static str,
        /// The underlying connection error.
        #[source]
        source: sqlx::Error,
    },

    /// The directory holding a `SQLite` file could not be created.
    #[error("failed to create store directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A query or transaction against an open store failed.
    #[error("store query error: {0}")]
    Query(#[from] sqlx::Error),

    /// A value does not fit the store's integer representation.
    #[error("value out of range for store column {column}: {value}")]
    OutOfRange {
        /// Column the value was destined for or read from.
        column: &'static str,
        /// The offending value, rendered as text.
        value: String,
    },

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt value in store column {column}: {message}")]
    Corrupt {
        /// Column the value was read from.
        column: &'static str,
        /// What went wrong.
        message: String,
    },
}

impl DbError {
    /// Whether this error means the store could not be opened at all.
    pub const fn is_store_open(&self) -> bool {
        matches!(self, Self::StoreOpen { .. } | Self::CreateDir { .. })
    }
}
