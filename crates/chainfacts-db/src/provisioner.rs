//! Store provisioner: from `(dataset kind, network)` to an open store.
//!
//! The provisioner resolves the configured [`DataSourceSpec`] for a pair,
//! opens the store it names (creating `SQLite` directories as needed), and
//! makes sure the dataset's schema exists before handing out the handle.
//!
//! Pools are cached per store, so every pair configured against the same
//! database shares one pool. Opening runs at most once per store and schema
//! initialization at most once per pair, even under concurrent callers:
//! later callers wait on the first one's result. Initializations of
//! different pairs on one store are serialized through
//! [`StorePool::lock_writes`].
//!
//! [`DataSourceSpec`]: chainfacts_types::DataSourceSpec

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chainfacts_types::{DataSourceError, DataSources, DatasetKind, Network, StoreConfig};
use tokio::sync::OnceCell;

use crate::error::DbError;
use crate::schema_versions::SchemaVersion;
use crate::schemas;
use crate::store::{StoreOptions, StorePool};

/// Per-store state: the opened pool.
#[derive(Default)]
struct StoreSlot {
    pool: OnceCell<StorePool>,
}

/// Resolves data source configuration to shared, initialized store handles.
pub struct StoreProvisioner {
    sources: DataSources,
    options: StoreOptions,
    stores: Mutex<HashMap<StoreConfig, Arc<StoreSlot>>>,
    schemas: Mutex<HashMap<(DatasetKind, Network), Arc<OnceCell<SchemaVersion>>>>,
}

impl StoreProvisioner {
    /// Create a provisioner over a data source table.
    pub fn new(sources: DataSources, options: StoreOptions) -> Self {
        Self {
            sources,
            options,
            stores: Mutex::new(HashMap::new()),
            schemas: Mutex::new(HashMap::new()),
        }
    }

    /// The data source table this provisioner resolves against.
    pub const fn sources(&self) -> &DataSources {
        &self.sources
    }

    /// Resolve the store config for a pair without opening anything.
    ///
    /// Returns `None` when the pair has no spec, or its spec names no store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] if the spec is malformed.
    pub fn store_config(
        &self,
        dataset: DatasetKind,
        network: Network,
    ) -> Result<Option<&StoreConfig>, DbError> {
        match self.sources.get(dataset, network) {
            Some(spec) => Ok(spec.store_config(dataset, network)?),
            None => Ok(None),
        }
    }

    /// Open the store backing a pair, if one is configured.
    ///
    /// Returns `Ok(None)` when there is no cache for the pair: no spec, a
    /// `remote` spec, or a `hybrid` spec without a `store` entry. Callers
    /// treat that as "fetch everything remotely".
    ///
    /// When `allow_create` is true, a dataset missing from the schema
    /// version registry is initialized in one transaction (registry table,
    /// dataset tables, version row) before the handle is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] for a malformed spec, the open
    /// failure ([`DbError::StoreOpen`] / [`DbError::CreateDir`]) unchanged,
    /// or [`DbError::Query`] if schema initialization fails.
    pub async fn resolve_and_open(
        &self,
        dataset: DatasetKind,
        network: Network,
        allow_create: bool,
    ) -> Result<Option<StorePool>, DbError> {
        let Some(config) = self.store_config(dataset, network)? else {
            tracing::debug!(
                dataset = dataset.as_str(),
                network = network.chain_id(),
                "No store configured, caching disabled"
            );
            return Ok(None);
        };

        let slot = self.store_slot(config);
        let store = slot
            .pool
            .get_or_try_init(|| StorePool::open(config, &self.options))
            .await?;

        if allow_create {
            self.schema_slot(dataset, network)
                .get_or_try_init(|| ensure_schema(store, dataset, network))
                .await?;
        }

        Ok(Some(store.clone()))
    }

    /// Open the store backing a pair, failing if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] if the pair has no spec or its
    /// spec names no store, plus every error of [`Self::resolve_and_open`].
    pub async fn require_store(
        &self,
        dataset: DatasetKind,
        network: Network,
    ) -> Result<StorePool, DbError> {
        self.sources.resolve(dataset, network)?;
        self.resolve_and_open(dataset, network, true)
            .await?
            .ok_or(DbError::Configuration(DataSourceError::NotStoreBacked {
                dataset,
                network,
            }))
    }

    /// Whether the store backing the pair has been opened.
    pub fn is_open(&self, dataset: DatasetKind, network: Network) -> bool {
        let Ok(Some(config)) = self.store_config(dataset, network) else {
            return false;
        };
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&store_key(config))
            .is_some_and(|slot| slot.pool.initialized())
    }

    /// Close every store opened so far.
    pub async fn close_all(&self) {
        let slots: Vec<Arc<StoreSlot>> = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for slot in slots {
            if let Some(store) = slot.pool.get() {
                store.close().await;
            }
        }
    }

    fn store_slot(&self, config: &StoreConfig) -> Arc<StoreSlot> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(stores.entry(store_key(config)).or_default())
    }

    fn schema_slot(&self, dataset: DatasetKind, network: Network) -> Arc<OnceCell<SchemaVersion>> {
        let mut schemas = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(schemas.entry((dataset, network)).or_default())
    }
}

/// Identity of a store: `SQLite` paths are made absolute so different
/// spellings of one file share a pool.
fn store_key(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Sqlite { path } => StoreConfig::Sqlite {
            path: std::path::absolute(path).unwrap_or_else(|_e| path.clone()),
        },
        StoreConfig::Postgres { .. } => config.clone(),
    }
}

/// Initialize a dataset's schema on a network inside one transaction.
async fn ensure_schema(
    store: &StorePool,
    dataset: DatasetKind,
    network: Network,
) -> Result<SchemaVersion, DbError> {
    let _writes = store.lock_writes().await;
    let mut tx = store.pool().begin().await?;
    let status = schemas::initialize_schema(&mut tx, store.dialect(), dataset, network).await?;
    tx.commit().await?;
    Ok(status.into_version())
}
