//! Store connection pools.
//!
//! A [`StorePool`] is the reusable, shareable handle for one opened store.
//! It wraps a [`sqlx::AnyPool`] so the same queries run against `SQLite`
//! files and `PostgreSQL` servers; the few statements that differ between
//! the two (catalog lookups) branch on [`Dialect`].
//!
//! Uses runtime query construction (not compile-time checked) to avoid
//! requiring a live database at build time. All values are bound as
//! parameters; only placeholder lists are generated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chainfacts_types::StoreConfig;
use sqlx::{AnyConnection, AnyPool};
use sqlx::any::AnyPoolOptions;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::DbError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// SQL dialect of an opened store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `SQLite` file database.
    Sqlite,
    /// `PostgreSQL` server.
    Postgres,
}

/// Pool settings applied to every store the provisioner opens.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl StoreOptions {
    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Connection pool handle to one store.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone, Debug)]
pub struct StorePool {
    pool: AnyPool,
    dialect: Dialect,
    writes: Arc<Mutex<()>>,
}

impl StorePool {
    /// Open a store described by `config`.
    ///
    /// For `SQLite` the parent directory of the database file is created if
    /// it does not exist, and the file itself is created on first connect.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::CreateDir`] if the `SQLite` directory cannot be
    /// created, and [`DbError::StoreOpen`] if the connection fails.
    pub async fn open(config: &StoreConfig, options: &StoreOptions) -> Result<Self, DbError> {
        sqlx::any::install_default_drivers();

        let (url, dialect) = match config {
            StoreConfig::Sqlite { path } => {
                let path = prepare_sqlite_path(path).await?;
                (format!("sqlite://{}?mode=rwc", path.display()), Dialect::Sqlite)
            }
            StoreConfig::Postgres { url } => (url.clone(), Dialect::Postgres),
        };

        let pool = AnyPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.connect_timeout)
            .idle_timeout(options.idle_timeout)
            .connect(&url)
            .await
            .map_err(|source| DbError::StoreOpen {
                dbms: config.dbms(),
                source,
            })?;

        tracing::info!(
            dbms = config.dbms(),
            max_connections = options.max_connections,
            "Opened store"
        );

        Ok(Self {
            pool,
            dialect,
            writes: Arc::new(Mutex::new(())),
        })
    }

    /// Return a reference to the underlying [`AnyPool`].
    pub const fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Return the SQL dialect of this store.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Serialize a write transaction against every other one on this handle.
    ///
    /// A `SQLite` file admits one writer at a time, and a transaction that
    /// reads before writing fails with `SQLITE_BUSY` instead of waiting when
    /// another connection is writing. Hold the guard until commit.
    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Store pool closed");
    }
}

/// Make a `SQLite` path absolute and ensure its directory exists.
async fn prepare_sqlite_path(path: &Path) -> Result<PathBuf, DbError> {
    let absolute = std::path::absolute(path).map_err(|source| DbError::CreateDir {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = absolute.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| DbError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(absolute)
}

/// Check whether a table exists in the store.
///
/// # Errors
///
/// Returns [`DbError::Query`] if the catalog query fails.
pub async fn table_exists(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &str,
) -> Result<bool, DbError> {
    let sql = match dialect {
        Dialect::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        Dialect::Postgres => {
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1"
        }
    };
    let count: i64 = sqlx::query_scalar(sql)
        .bind(table)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Render `count` positional placeholders starting at `$first`.
///
/// `placeholders(2, 3)` yields `"$2, $3, $4"`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first.saturating_add(count))
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render `rows` tuples of `width` placeholders each, numbered from `$1`.
///
/// `value_tuples(2, 2)` yields `"($1, $2), ($3, $4)"`.
pub(crate) fn value_tuples(rows: usize, width: usize) -> String {
    (0..rows)
        .map(|row| {
            let first = row.saturating_mul(width).saturating_add(1);
            format!("({})", placeholders(first, width))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convert an unsigned domain value to the store's signed integer column.
pub(crate) fn to_db_int(column: &'static str, value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_e| DbError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

/// Convert a stored signed integer back to its unsigned domain value.
pub(crate) fn from_db_int(column: &'static str, value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_e| DbError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_lists() {
        assert_eq!(placeholders(1, 1), "$1");
        assert_eq!(placeholders(2, 3), "$2, $3, $4");
        assert_eq!(placeholders(5, 0), "");
    }

    #[test]
    fn value_tuple_lists() {
        assert_eq!(value_tuples(1, 3), "($1, $2, $3)");
        assert_eq!(value_tuples(2, 2), "($1, $2), ($3, $4)");
    }

    #[test]
    fn db_int_conversion_rejects_out_of_range() {
        assert_eq!(to_db_int("block_number", 42).unwrap(), 42);
        assert!(to_db_int("block_number", u64::MAX).is_err());
        assert!(from_db_int("block_number", -1).is_err());
    }

    #[test]
    fn default_options() {
        let options = StoreOptions::default().with_max_connections(1);
        assert_eq!(options.max_connections, 1);
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn open_sqlite_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("facts.db");
        let config = StoreConfig::Sqlite { path: path.clone() };

        let store = StorePool::open(&config, &StoreOptions::default()).await.unwrap();
        assert_eq!(store.dialect(), Dialect::Sqlite);
        assert!(path.parent().unwrap().is_dir());

        let mut conn = store.pool().acquire().await.unwrap();
        assert!(!table_exists(&mut conn, Dialect::Sqlite, "schema_versions").await.unwrap());
        drop(conn);
        store.close().await;
    }
}
