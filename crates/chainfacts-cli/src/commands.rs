//! Command execution.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use chainfacts_core::{
    BlockTimestamps, Canonical, ChainfactsConfig, ContractCreationBlocks, FactCache,
};
use chainfacts_db::{StoreProvisioner, schema_versions};
use chainfacts_rpc::{JsonRpcClient, NodeSource};
use chainfacts_types::{BlockReference, DatasetKind, Network};
use tracing::info;

use crate::cli::Command;
use crate::error::CliError;
use crate::summary::ConfigSummary;

/// Timeout for individual JSON-RPC requests.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Loaded configuration plus the orchestrator built from it.
pub struct App {
    config: ChainfactsConfig,
    config_path: Option<PathBuf>,
    cache: FactCache,
}

impl App {
    /// Build the orchestrator from a loaded configuration.
    pub fn new(config: ChainfactsConfig, config_path: Option<PathBuf>) -> Self {
        let provisioner = StoreProvisioner::new(config.data_sources.clone(), config.store_options());
        let cache = FactCache::new(Arc::new(provisioner), config.fetcher());
        Self {
            config,
            config_path,
            cache,
        }
    }

    /// Run one command, writing results to stdout.
    pub async fn run(&self, command: Command) -> Result<(), CliError> {
        let result = self.dispatch(command).await;
        self.cache.provisioner().close_all().await;
        result
    }

    async fn dispatch(&self, command: Command) -> Result<(), CliError> {
        match command {
            Command::Config { reveal, json } => self.show_config(reveal, json),
            Command::BlockTimestamps {
                blocks,
                network,
                no_cache,
            } => {
                self.block_timestamps(&blocks, network.as_deref(), !no_cache)
                    .await
            }
            Command::CreationBlock {
                addresses,
                network,
                no_cache,
            } => {
                self.creation_blocks(&addresses, network.as_deref(), !no_cache)
                    .await
            }
            Command::BackfillTimestamps {
                start,
                end,
                network,
            } => self.backfill_timestamps(start, end, network.as_deref()).await,
            Command::SchemaVersions { network, dataset } => {
                self.schema_versions(network.as_deref(), dataset).await
            }
        }
    }

    fn show_config(&self, reveal: bool, json: bool) -> Result<(), CliError> {
        let summary = ConfigSummary::new(&self.config, self.config_path.clone(), reveal);
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", summary.render());
        }
        Ok(())
    }

    async fn block_timestamps(
        &self,
        blocks: &[BlockReference],
        network: Option<&str>,
        use_cache: bool,
    ) -> Result<(), CliError> {
        let network = self.network(network)?;
        let source = self.source(DatasetKind::BlockTimestamps, network)?;
        let timestamps = self
            .cache
            .lookup_batch::<BlockTimestamps, _, _>(&source, &source, network, blocks, use_cache)
            .await?;
        for (block, timestamp) in blocks.iter().zip(timestamps) {
            println!("{block}\t{timestamp}");
        }
        Ok(())
    }

    async fn creation_blocks(
        &self,
        addresses: &[Address],
        network: Option<&str>,
        use_cache: bool,
    ) -> Result<(), CliError> {
        let network = self.network(network)?;
        let source = self.source(DatasetKind::ContractCreationBlocks, network)?;
        let blocks = self
            .cache
            .lookup_batch::<ContractCreationBlocks, _, _>(
                &Canonical, &source, network, addresses, use_cache,
            )
            .await?;
        for (address, block) in addresses.iter().zip(blocks) {
            println!("{address}\t{block}");
        }
        Ok(())
    }

    async fn backfill_timestamps(
        &self,
        start: u64,
        end: u64,
        network: Option<&str>,
    ) -> Result<(), CliError> {
        if end < start {
            return Err(CliError::InvalidRange { start, end });
        }
        let network = self.network(network)?;
        let source = self.source(DatasetKind::BlockTimestamps, network)?;
        let fetcher = self.cache.fetcher();
        let window = fetcher
            .chunk_size()
            .saturating_mul(fetcher.max_concurrent_chunks());
        let window = u64::try_from(window).unwrap_or(u64::MAX);

        info!(network = network.chain_id(), start, end, "Backfilling block timestamps");
        let mut written: u64 = 0;
        for (first, last) in block_windows(start, end, window) {
            let blocks: Vec<u64> = (first..=last).collect();
            let stored = self
                .cache
                .backfill::<BlockTimestamps, _>(&source, network, &blocks)
                .await?;
            tracing::debug!(first, last, stored, "Backfilled window");
            written = written.saturating_add(stored);
        }
        println!("stored {written} new block timestamps on network {network}");
        Ok(())
    }

    async fn schema_versions(
        &self,
        network: Option<&str>,
        dataset: Option<DatasetKind>,
    ) -> Result<(), CliError> {
        let network = self.network(network)?;
        let datasets = dataset.map_or_else(|| DatasetKind::ALL.to_vec(), |dataset| vec![dataset]);

        for dataset in datasets {
            let Some(store) = self
                .cache
                .provisioner()
                .resolve_and_open(dataset, network, false)
                .await?
            else {
                println!("{dataset}\t{network}\tno store configured");
                continue;
            };

            let mut conn = store.pool().acquire().await.map_err(chainfacts_db::DbError::from)?;
            let versions = schema_versions::list_versions(&mut conn, store.dialect()).await?;
            let recorded = versions
                .iter()
                .find(|row| row.dataset == dataset && row.network == network);
            match recorded {
                Some(row) => println!(
                    "{dataset}\t{network}\tversion {}\tcreated {}",
                    row.version,
                    row.created_at.to_rfc3339()
                ),
                None => println!("{dataset}\t{network}\tnot initialized"),
            }
        }
        Ok(())
    }

    fn network(&self, name: Option<&str>) -> Result<Network, CliError> {
        match name {
            Some(name) => Ok(self.config.resolve_network(name)?),
            None => Ok(self.config.default_network),
        }
    }

    fn source(&self, dataset: DatasetKind, network: Network) -> Result<NodeSource, CliError> {
        let (name, provider) = self
            .config
            .provider_for_dataset(dataset, network)?
            .ok_or(CliError::NoProvider { network })?;
        tracing::debug!(
            provider = name,
            dataset = dataset.as_str(),
            network = network.chain_id(),
            "Using provider"
        );
        let client = JsonRpcClient::new(provider.url.clone(), RPC_TIMEOUT)?;
        Ok(NodeSource::new(Arc::new(client)))
    }
}

/// Split `start..=end` into consecutive inclusive windows of at most `size`
/// blocks. Yields nothing when `end < start`.
fn block_windows(start: u64, end: u64, size: u64) -> impl Iterator<Item = (u64, u64)> {
    let span = size.max(1).saturating_sub(1);
    let mut next = (start <= end).then_some(start);
    std::iter::from_fn(move || {
        let first = next?;
        let last = first.saturating_add(span).min(end);
        next = last.checked_add(1).filter(|block| *block <= end);
        Some((first, last))
    })
}
