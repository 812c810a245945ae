//! Dataset table definitions and schema initialization.
//!
//! Each [`DatasetKind`] owns one data table keyed by `(network, natural
//! key)`. The DDL is portable between `SQLite` and `PostgreSQL`.
//!
//! | Dataset | Table | Key | Value |
//! |---------|-------|-----|-------|
//! | `block_timestamps` | `block_timestamps` | `block_number` | `block_timestamp` |
//! | `contract_creation_blocks` | `contract_creation_blocks` | `address` | `block_number` |

use chainfacts_types::{DatasetKind, Network};
use sqlx::AnyConnection;

use crate::error::DbError;
use crate::schema_versions::{self, SchemaVersion};
use crate::store::Dialect;

/// DDL statements creating a dataset's tables and indexes.
const fn dataset_ddl(dataset: DatasetKind) -> &'static [&'static str] {
    match dataset {
        DatasetKind::BlockTimestamps => &[
            r"CREATE TABLE IF NOT EXISTS block_timestamps (
                  network BIGINT NOT NULL,
                  block_number BIGINT NOT NULL,
                  block_timestamp BIGINT NOT NULL,
                  PRIMARY KEY (network, block_number)
              )",
            r"CREATE INDEX IF NOT EXISTS block_timestamps_by_timestamp
                  ON block_timestamps (network, block_timestamp)",
        ],
        DatasetKind::ContractCreationBlocks => &[
            r"CREATE TABLE IF NOT EXISTS contract_creation_blocks (
                  network BIGINT NOT NULL,
                  address TEXT NOT NULL,
                  block_number BIGINT NOT NULL,
                  PRIMARY KEY (network, address)
              )",
        ],
    }
}

/// Create a dataset's tables if they do not exist.
///
/// Tables are shared by every network stored in the same database, so a
/// second network initializing the same dataset finds them already present.
///
/// # Errors
///
/// Returns [`DbError::Query`] if any statement fails.
pub async fn create_dataset_tables(
    conn: &mut AnyConnection,
    dataset: DatasetKind,
) -> Result<(), DbError> {
    for statement in dataset_ddl(dataset) {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Outcome of [`initialize_schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// The dataset was already recorded in the registry.
    Existing(SchemaVersion),
    /// The dataset's tables were created and recorded by this call.
    Created(SchemaVersion),
}

impl SchemaStatus {
    /// The registry entry, whether pre-existing or new.
    pub const fn version(&self) -> &SchemaVersion {
        match self {
            Self::Existing(v) | Self::Created(v) => v,
        }
    }

    /// Consume the status, keeping the registry entry.
    pub fn into_version(self) -> SchemaVersion {
        match self {
            Self::Existing(v) | Self::Created(v) => v,
        }
    }
}

/// Ensure a dataset's schema exists on a network.
///
/// Steps, all on the caller's connection:
/// 1. Create the registry table if [`schema_versions::is_initialized`] is false.
/// 2. Return early if [`schema_versions::get_version`] finds an entry.
/// 3. Otherwise create the dataset tables and record the current version.
///
/// Run this inside a transaction so a failure at any step leaves neither
/// tables nor a registry row behind.
///
/// # Errors
///
/// Returns [`DbError::Query`] if any statement fails, or
/// [`DbError::Corrupt`] if the newly written row cannot be read back.
pub async fn initialize_schema(
    conn: &mut AnyConnection,
    dialect: Dialect,
    dataset: DatasetKind,
    network: Network,
) -> Result<SchemaStatus, DbError> {
    if !schema_versions::is_initialized(conn, dialect).await? {
        schema_versions::initialize_registry(conn).await?;
    }

    if let Some(existing) = schema_versions::get_version(conn, dataset, network).await? {
        return Ok(SchemaStatus::Existing(existing));
    }

    create_dataset_tables(conn, dataset).await?;
    schema_versions::record_schema(conn, dataset, network, dataset.current_version()).await?;

    let created = schema_versions::get_version(conn, dataset, network)
        .await?
        .ok_or_else(|| DbError::Corrupt {
            column: "schema_versions",
            message: format!("row for {dataset} on network {network} missing after insert"),
        })?;

    tracing::info!(
        dataset = dataset.as_str(),
        network = network.chain_id(),
        version = created.version,
        "Initialized dataset schema"
    );

    Ok(SchemaStatus::Created(created))
}

#[cfg(test)]
mod tests {
    use chainfacts_types::StoreConfig;

    use super::*;
    use crate::store::{StoreOptions, StorePool, table_exists};

    #[tokio::test]
    async fn initialize_schema_creates_then_finds_existing() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::Sqlite {
            path: dir.path().join("schemas.db"),
        };
        let store = StorePool::open(&config, &StoreOptions::default()).await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();

        let first = initialize_schema(
            &mut conn,
            Dialect::Sqlite,
            DatasetKind::BlockTimestamps,
            Network::MAINNET,
        )
        .await
        .unwrap();
        assert!(matches!(first, SchemaStatus::Created(_)));
        assert!(table_exists(&mut conn, Dialect::Sqlite, "block_timestamps").await.unwrap());
        assert!(
            !table_exists(&mut conn, Dialect::Sqlite, "contract_creation_blocks")
                .await
                .unwrap()
        );

        let second = initialize_schema(
            &mut conn,
            Dialect::Sqlite,
            DatasetKind::BlockTimestamps,
            Network::MAINNET,
        )
        .await
        .unwrap();
        assert_eq!(second, SchemaStatus::Existing(first.version().clone()));
    }

    #[tokio::test]
    async fn second_network_reuses_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::Sqlite {
            path: dir.path().join("schemas.db"),
        };
        let store = StorePool::open(&config, &StoreOptions::default()).await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();

        for network in [Network::MAINNET, Network::new(10)] {
            let status = initialize_schema(
                &mut conn,
                Dialect::Sqlite,
                DatasetKind::ContractCreationBlocks,
                network,
            )
            .await
            .unwrap();
            assert!(matches!(status, SchemaStatus::Created(_)));
        }

        let versions = schema_versions::list_versions(&mut conn, Dialect::Sqlite)
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
    }
}
