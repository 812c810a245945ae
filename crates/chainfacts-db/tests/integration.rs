//! Integration tests for the `chainfacts-db` store layer.
//!
//! Every test provisions real `SQLite` stores inside a temporary directory,
//! so no external services are required.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::path::Path;

use chainfacts_db::schema_versions;
use chainfacts_db::{
    BlockTimestampStore, DbError, Dialect, StoreOptions, StorePool, StoreProvisioner,
};
use chainfacts_types::{
    DataSourceError, DataSourceSpec, DataSources, DatasetKind, LeafDataSource, Network,
    StoreConfig,
};

const TS: DatasetKind = DatasetKind::BlockTimestamps;
const MAINNET: Network = Network::MAINNET;

fn sqlite(path: &Path) -> StoreConfig {
    StoreConfig::Sqlite {
        path: path.to_path_buf(),
    }
}

fn new_provisioner(sources: DataSources) -> StoreProvisioner {
    StoreProvisioner::new(sources, StoreOptions::default())
}

async fn registry_rows(store: &StorePool) -> Vec<schema_versions::SchemaVersion> {
    let mut conn = store.pool().acquire().await.expect("acquire connection");
    schema_versions::list_versions(&mut conn, Dialect::Sqlite)
        .await
        .expect("list schema versions")
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn unconfigured_pair_has_no_store() {
    let provisioner = new_provisioner(DataSources::new());
    let store = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap();
    assert!(store.is_none());
}

#[tokio::test]
async fn remote_spec_has_no_store() {
    let sources = DataSources::new().with_default(TS, DataSourceSpec::remote());
    let provisioner = new_provisioner(sources);
    assert!(provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap().is_none());
}

#[tokio::test]
async fn hybrid_opens_first_store_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hybrid").join("facts.db");
    let sources = DataSources::new().with_default(
        TS,
        DataSourceSpec::Hybrid {
            hybrid_order: vec![
                LeafDataSource::Remote { provider: None },
                LeafDataSource::Store {
                    store_config: Some(sqlite(&path)),
                },
            ],
        },
    );
    let provisioner = new_provisioner(sources);

    let store = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap();
    assert!(store.is_some());
    assert!(path.exists(), "sqlite file should be created");
}

#[tokio::test]
async fn store_without_config_is_configuration_error() {
    let sources = DataSources::new().with_default(TS, DataSourceSpec::Store { store_config: None });
    let provisioner = new_provisioner(sources);

    let err = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Configuration(DataSourceError::MissingStoreConfig { .. })
    ));
}

#[tokio::test]
async fn require_store_rejects_unconfigured_and_remote() {
    let sources = DataSources::new()
        .with_network(Network::new(10), TS, DataSourceSpec::remote());
    let provisioner = new_provisioner(sources);

    let err = provisioner.require_store(TS, MAINNET).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Configuration(DataSourceError::Unconfigured { .. })
    ));

    let err = provisioner.require_store(TS, Network::new(10)).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Configuration(DataSourceError::NotStoreBacked { .. })
    ));
}

#[tokio::test]
async fn unreachable_postgres_is_store_open_error() {
    let sources = DataSources::new().with_default(
        TS,
        DataSourceSpec::store(StoreConfig::Postgres {
            url: "postgresql://nobody@127.0.0.1:1/nothing".to_owned(),
        }),
    );
    let provisioner = StoreProvisioner::new(
        sources,
        StoreOptions::default().with_connect_timeout(std::time::Duration::from_millis(500)),
    );

    let err = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap_err();
    assert!(err.is_store_open(), "unexpected error: {err}");
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn provisioning_twice_records_one_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let sources =
        DataSources::new().with_default(TS, DataSourceSpec::store(sqlite(&dir.path().join("a.db"))));
    let provisioner = new_provisioner(sources);

    let first = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap().unwrap();
    let second = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap().unwrap();
    assert!(provisioner.is_open(TS, MAINNET));

    let rows = registry_rows(&first).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].dataset, TS);
    assert_eq!(rows[0].network, MAINNET);
    assert_eq!(rows[0].version, TS.current_version());

    // Both handles see the same data.
    BlockTimestampStore::new(&first)
        .insert_timestamps(MAINNET, &[(1, 10)])
        .await
        .unwrap();
    assert_eq!(
        BlockTimestampStore::new(&second)
            .query_timestamp(MAINNET, 1)
            .await
            .unwrap(),
        Some(10)
    );
}

#[tokio::test]
async fn concurrent_provisioning_initializes_once() {
    let dir = tempfile::tempdir().unwrap();
    let sources =
        DataSources::new().with_default(TS, DataSourceSpec::store(sqlite(&dir.path().join("c.db"))));
    let provisioner = new_provisioner(sources);

    let results = futures::future::join_all(
        (0..8).map(|_| provisioner.resolve_and_open(TS, MAINNET, true)),
    )
    .await;
    for result in &results {
        assert!(result.as_ref().unwrap().is_some());
    }

    let store = results.into_iter().next().unwrap().unwrap().unwrap();
    assert_eq!(registry_rows(&store).await.len(), 1);
}

#[tokio::test]
async fn reopening_existing_store_keeps_original_version_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restart.db");
    let sources = DataSources::new().with_default(TS, DataSourceSpec::store(sqlite(&path)));

    let before = {
        let provisioner = new_provisioner(sources.clone());
        let store = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap().unwrap();
        let rows = registry_rows(&store).await;
        provisioner.close_all().await;
        rows
    };

    let provisioner = new_provisioner(sources);
    let store = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap().unwrap();
    let after = registry_rows(&store).await;

    assert_eq!(before, after);
}

#[tokio::test]
async fn allow_create_false_leaves_store_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    let sources =
        DataSources::new().with_default(TS, DataSourceSpec::store(sqlite(&dir.path().join("n.db"))));
    let provisioner = new_provisioner(sources);

    let store = provisioner.resolve_and_open(TS, MAINNET, false).await.unwrap().unwrap();
    let mut conn = store.pool().acquire().await.unwrap();
    assert!(!schema_versions::is_initialized(&mut conn, Dialect::Sqlite).await.unwrap());
    drop(conn);

    // A later call that may create does initialize the same handle's store.
    let store = provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap().unwrap();
    assert_eq!(registry_rows(&store).await.len(), 1);
}

#[tokio::test]
async fn datasets_and_networks_sharing_a_file_each_get_a_row() {
    let dir = tempfile::tempdir().unwrap();
    let shared = DataSourceSpec::store(sqlite(&dir.path().join("shared.db")));
    let sources = DataSources::new()
        .with_default(TS, shared.clone())
        .with_default(DatasetKind::ContractCreationBlocks, shared);
    let provisioner = new_provisioner(sources);

    for network in [MAINNET, Network::new(10)] {
        for dataset in DatasetKind::ALL {
            provisioner.resolve_and_open(dataset, network, true).await.unwrap();
        }
    }

    let store = provisioner.require_store(TS, MAINNET).await.unwrap();
    let rows = registry_rows(&store).await;
    assert_eq!(rows.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_opens_on_a_shared_file_all_succeed() {
    let networks = [MAINNET, Network::new(10), Network::new(137), Network::new(8453)];

    for round in 0..5 {
        let dir = tempfile::tempdir().unwrap();
        let shared = DataSourceSpec::store(sqlite(&dir.path().join("shared.db")));
        let sources = DataSources::new()
            .with_default(TS, shared.clone())
            .with_default(DatasetKind::ContractCreationBlocks, shared);
        let provisioner = new_provisioner(sources);

        let opens = networks.iter().flat_map(|&network| {
            DatasetKind::ALL
                .into_iter()
                .map(move |dataset| (dataset, network))
        });
        let results = futures::future::join_all(
            opens.map(|(dataset, network)| provisioner.resolve_and_open(dataset, network, true)),
        )
        .await;

        for result in results {
            assert!(result.unwrap().is_some(), "round {round}");
        }
        let store = provisioner.require_store(TS, MAINNET).await.unwrap();
        assert_eq!(registry_rows(&store).await.len(), 8);
    }
}

#[tokio::test]
async fn pairs_on_one_file_share_a_pool() {
    let dir = tempfile::tempdir().unwrap();
    let shared = DataSourceSpec::store(sqlite(&dir.path().join("shared.db")));
    let sources = DataSources::new()
        .with_default(TS, shared.clone())
        .with_default(DatasetKind::ContractCreationBlocks, shared);
    let provisioner = new_provisioner(sources);

    assert!(!provisioner.is_open(DatasetKind::ContractCreationBlocks, Network::new(10)));
    provisioner.resolve_and_open(TS, MAINNET, true).await.unwrap();
    assert!(provisioner.is_open(DatasetKind::ContractCreationBlocks, Network::new(10)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn inserts_and_first_time_initialization_interleave_on_a_shared_file() {
    let dir = tempfile::tempdir().unwrap();
    let shared = DataSourceSpec::store(sqlite(&dir.path().join("shared.db")));
    let sources = DataSources::new()
        .with_default(TS, shared.clone())
        .with_default(DatasetKind::ContractCreationBlocks, shared);
    let provisioner = new_provisioner(sources);
    let store = provisioner.require_store(TS, MAINNET).await.unwrap();

    let inserts = (0..4u64).map(|batch| {
        let store = store.clone();
        async move {
            let entries: Vec<(u64, u64)> =
                (0..50u64).map(|i| (batch * 100 + i, 1_000 + i)).collect();
            BlockTimestampStore::new(&store)
                .insert_timestamps(MAINNET, &entries)
                .await
        }
    });
    let opens = [Network::new(10), Network::new(137), Network::new(8453)]
        .into_iter()
        .map(|network| {
            provisioner.resolve_and_open(DatasetKind::ContractCreationBlocks, network, true)
        });

    let (inserted, opened) = tokio::join!(
        futures::future::join_all(inserts),
        futures::future::join_all(opens),
    );

    for result in inserted {
        assert_eq!(result.unwrap(), 50);
    }
    for result in opened {
        assert!(result.unwrap().is_some());
    }
    assert_eq!(registry_rows(&store).await.len(), 4);
}
