//! Schema version registry.
//!
//! The registry records, per `(dataset kind, network)`, which structural
//! version of the dataset's tables exists in a store and when it was
//! created. It lives in the reserved `schema_versions` table.
//!
//! Every function here runs on a connection supplied by the caller and never
//! commits on its own, so the provisioner can wrap registry checks, table
//! creation, and version recording in one transaction.
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | `dataset` | TEXT | [`DatasetKind::as_str`] |
//! | `network` | BIGINT | Chain id |
//! | `version` | TEXT | Structural version identifier |
//! | `created_at` | TEXT | RFC 3339 creation timestamp |

use chainfacts_types::{DatasetKind, Network};
use chrono::{DateTime, Utc};
use sqlx::AnyConnection;

use crate::error::DbError;
use crate::store::{Dialect, from_db_int, table_exists, to_db_int};

/// Name of the registry table.
pub const REGISTRY_TABLE: &str = "schema_versions";

/// A registry entry: one dataset's storage layout on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion {
    /// The dataset the tables belong to.
    pub dataset: DatasetKind,
    /// The network the dataset instance belongs to.
    pub network: Network,
    /// Structural version identifier.
    pub version: String,
    /// When the dataset's tables were created.
    pub created_at: DateTime<Utc>,
}

/// A raw row from the `schema_versions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SchemaVersionRow {
    dataset: String,
    network: i64,
    version: String,
    created_at: String,
}

impl TryFrom<SchemaVersionRow> for SchemaVersion {
    type Error = DbError;

    fn try_from(row: SchemaVersionRow) -> Result<Self, Self::Error> {
        let dataset = row.dataset.parse().map_err(|e| DbError::Corrupt {
            column: "schema_versions.dataset",
            message: format!("{e}"),
        })?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| DbError::Corrupt {
                column: "schema_versions.created_at",
                message: format!("{:?}: {e}", row.created_at),
            })?
            .with_timezone(&Utc);
        Ok(Self {
            dataset,
            network: Network::new(from_db_int("schema_versions.network", row.network)?),
            version: row.version,
            created_at,
        })
    }
}

/// Whether the registry table itself exists.
///
/// This is distinct from [`get_version`] returning `None`, which means the
/// registry exists but the dataset has not been initialized.
///
/// # Errors
///
/// Returns [`DbError::Query`] if the catalog query fails.
pub async fn is_initialized(conn: &mut AnyConnection, dialect: Dialect) -> Result<bool, DbError> {
    table_exists(conn, dialect, REGISTRY_TABLE).await
}

/// Create the registry table if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Query`] if the DDL fails.
pub async fn initialize_registry(conn: &mut AnyConnection) -> Result<(), DbError> {
    sqlx::query(
        r"CREATE TABLE IF NOT EXISTS schema_versions (
              dataset TEXT NOT NULL,
              network BIGINT NOT NULL,
              version TEXT NOT NULL,
              created_at TEXT NOT NULL,
              PRIMARY KEY (dataset, network)
          )",
    )
    .execute(&mut *conn)
    .await?;

    tracing::debug!("Initialized schema version registry");
    Ok(())
}

/// Look up the recorded version of a dataset on a network.
///
/// Returns `None` if the dataset has never been initialized there. The
/// registry table must already exist (see [`is_initialized`]).
///
/// # Errors
///
/// Returns [`DbError::Query`] if the query fails, or [`DbError::Corrupt`]
/// if the stored row cannot be decoded.
pub async fn get_version(
    conn: &mut AnyConnection,
    dataset: DatasetKind,
    network: Network,
) -> Result<Option<SchemaVersion>, DbError> {
    let row = sqlx::query_as::<_, SchemaVersionRow>(
        r"SELECT dataset, network, version, created_at
          FROM schema_versions
          WHERE dataset = $1 AND network = $2",
    )
    .bind(dataset.as_str())
    .bind(to_db_int("schema_versions.network", network.chain_id())?)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(SchemaVersion::try_from).transpose()
}

/// Record that a dataset's tables now exist on a network at `version`.
///
/// An existing row is left untouched: versions are written once at
/// initialization and never rewritten.
///
/// # Errors
///
/// Returns [`DbError::Query`] if the insert fails.
pub async fn record_schema(
    conn: &mut AnyConnection,
    dataset: DatasetKind,
    network: Network,
    version: &str,
) -> Result<(), DbError> {
    let created_at = Utc::now().to_rfc3339();
    sqlx::query(
        r"INSERT INTO schema_versions (dataset, network, version, created_at)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (dataset, network) DO NOTHING",
    )
    .bind(dataset.as_str())
    .bind(to_db_int("schema_versions.network", network.chain_id())?)
    .bind(version)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        dataset = dataset.as_str(),
        network = network.chain_id(),
        version,
        "Recorded schema version"
    );
    Ok(())
}

/// List every registry entry, ordered by dataset then network.
///
/// Returns an empty list if the registry has not been initialized.
///
/// # Errors
///
/// Returns [`DbError::Query`] if the query fails, or [`DbError::Corrupt`]
/// if a stored row cannot be decoded.
pub async fn list_versions(
    conn: &mut AnyConnection,
    dialect: Dialect,
) -> Result<Vec<SchemaVersion>, DbError> {
    if !is_initialized(conn, dialect).await? {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, SchemaVersionRow>(
        r"SELECT dataset, network, version, created_at
          FROM schema_versions
          ORDER BY dataset, network",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(SchemaVersion::try_from).collect()
}

#[cfg(test)]
mod tests {
    use chainfacts_types::StoreConfig;

    use super::*;
    use crate::store::{StoreOptions, StorePool};

    async fn open_temp_store(dir: &tempfile::TempDir) -> StorePool {
        let config = StoreConfig::Sqlite {
            path: dir.path().join("registry.db"),
        };
        StorePool::open(&config, &StoreOptions::default()).await.unwrap()
    }

    #[tokio::test]
    async fn registry_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_temp_store(&dir).await;
        let mut conn = store.pool().acquire().await.unwrap();

        assert!(!is_initialized(&mut conn, Dialect::Sqlite).await.unwrap());
        assert!(list_versions(&mut conn, Dialect::Sqlite).await.unwrap().is_empty());

        initialize_registry(&mut conn).await.unwrap();
        assert!(is_initialized(&mut conn, Dialect::Sqlite).await.unwrap());

        let network = Network::new(10);
        assert!(
            get_version(&mut conn, DatasetKind::BlockTimestamps, network)
                .await
                .unwrap()
                .is_none()
        );

        record_schema(&mut conn, DatasetKind::BlockTimestamps, network, "1")
            .await
            .unwrap();
        let version = get_version(&mut conn, DatasetKind::BlockTimestamps, network)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(version.version, "1");
        assert_eq!(version.dataset, DatasetKind::BlockTimestamps);
        assert_eq!(version.network, network);

        // Other networks and datasets stay uninitialized.
        assert!(
            get_version(&mut conn, DatasetKind::BlockTimestamps, Network::MAINNET)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            get_version(&mut conn, DatasetKind::ContractCreationBlocks, network)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn record_schema_never_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_temp_store(&dir).await;
        let mut conn = store.pool().acquire().await.unwrap();
        initialize_registry(&mut conn).await.unwrap();

        record_schema(&mut conn, DatasetKind::BlockTimestamps, Network::MAINNET, "1")
            .await
            .unwrap();
        record_schema(&mut conn, DatasetKind::BlockTimestamps, Network::MAINNET, "2")
            .await
            .unwrap();

        let versions = list_versions(&mut conn, Dialect::Sqlite).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, "1");
    }

    #[tokio::test]
    async fn uncommitted_registry_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_temp_store(&dir).await;

        let mut tx = store.pool().begin().await.unwrap();
        initialize_registry(&mut tx).await.unwrap();
        record_schema(&mut tx, DatasetKind::BlockTimestamps, Network::MAINNET, "1")
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let mut conn = store.pool().acquire().await.unwrap();
        assert!(!is_initialized(&mut conn, Dialect::Sqlite).await.unwrap());
    }
}
