//! Configuration loading and typed config structures for chainfacts.
//!
//! Configuration lives in a YAML file, by default
//! `$HOME/.config/chainfacts/config.yaml` (override with
//! `CHAINFACTS_CONFIG`). Every section is optional; a missing file yields
//! the defaults, which fetch everything remotely and cache nothing.
//!
//! ```text
//! default_network: 1
//! networks:
//!   mainnet: { chain_id: 1, block_explorer: etherscan.io }
//! providers:
//!   mainnet_node: { url: "https://eth.example.org", network: 1 }
//! data_sources:
//!   defaults:
//!     block_timestamps:
//!       backend: hybrid
//!       hybrid_order:
//!         - backend: store
//!           store_config: { dbms: sqlite, path: /var/lib/chainfacts/facts.db }
//!         - backend: remote
//! fetch: { chunk_size: 500, max_concurrent_chunks: 4 }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chainfacts_db::StoreOptions;
use chainfacts_types::{DataSources, DatasetKind, Network};
use serde::{Deserialize, Serialize};

use crate::fetcher::{BatchedFetcher, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT_CHUNKS};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CHAINFACTS_CONFIG";

/// Environment variable overriding the default network's provider URL.
pub const RPC_URL_ENV: &str = "CHAINFACTS_RPC_URL";

/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "CHAINFACTS_LOG_LEVEL";

/// Provider name used when `CHAINFACTS_RPC_URL` names a URL for a network
/// without a configured provider.
pub const ENV_PROVIDER_NAME: &str = "env";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },

    /// A data source named a provider that is not configured.
    #[error("unknown provider: {name}")]
    UnknownProvider {
        /// The provider name as given.
        name: String,
    },

    /// A network was named that is neither a chain id nor a configured name.
    #[error("unknown network: {name}")]
    UnknownNetwork {
        /// The name as given.
        name: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level chainfacts configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainfactsConfig {
    /// Network used when a command names none.
    #[serde(default = "default_network")]
    pub default_network: Network,

    /// Named networks.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,

    /// Named JSON-RPC providers.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Backend selection per dataset and network.
    #[serde(default)]
    pub data_sources: DataSources,

    /// Remote fetch policy.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Store connection pool settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ChainfactsConfig {
    fn default() -> Self {
        Self {
            default_network: default_network(),
            networks: BTreeMap::new(),
            providers: BTreeMap::new(),
            data_sources: DataSources::default(),
            fetch: FetchConfig::default(),
            store: StoreSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ChainfactsConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CHAINFACTS_RPC_URL` overrides the default network's provider URL
    /// - `CHAINFACTS_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_file`].
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Path of the config file: `CHAINFACTS_CONFIG`, else
    /// `$HOME/.config/chainfacts/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("chainfacts")
                .join("config.yaml")
        })
    }

    /// Apply `CHAINFACTS_RPC_URL` and `CHAINFACTS_LOG_LEVEL`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(RPC_URL_ENV).ok(),
            std::env::var(LOG_LEVEL_ENV).ok(),
        );
    }

    /// Apply override values as if read from the environment.
    pub fn apply_overrides(&mut self, rpc_url: Option<String>, log_level: Option<String>) {
        if let Some(url) = rpc_url {
            let network = self.default_network;
            let name = self
                .provider_for(network)
                .map_or_else(|| ENV_PROVIDER_NAME.to_owned(), |(name, _)| name.to_owned());
            self.providers
                .insert(name, ProviderConfig { url, network });
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
    }

    /// Reject values no component can work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            message: message.to_owned(),
        };
        if self.fetch.chunk_size == 0 {
            return Err(invalid("fetch.chunk_size must be at least 1"));
        }
        if self.fetch.max_concurrent_chunks == 0 {
            return Err(invalid("fetch.max_concurrent_chunks must be at least 1"));
        }
        if self.store.max_connections == 0 {
            return Err(invalid("store.max_connections must be at least 1"));
        }
        for (name, network) in &self.networks {
            if let Some(provider) = &network.default_provider {
                match self.providers.get(provider) {
                    Some(found) if found.network == network.chain_id => {}
                    Some(_) => {
                        return Err(invalid(&format!(
                            "network {name}: default provider {provider} serves another network"
                        )));
                    }
                    None => {
                        return Err(invalid(&format!(
                            "network {name}: unknown default provider {provider}"
                        )));
                    }
                }
            }
        }
        for (dataset, spec) in &self.data_sources.defaults {
            if let Some(provider) = spec.remote_provider() {
                if !self.providers.contains_key(provider) {
                    return Err(invalid(&format!(
                        "data source {dataset}: unknown provider {provider}"
                    )));
                }
            }
        }
        for (network, specs) in &self.data_sources.networks {
            for (dataset, spec) in specs {
                if let Some(provider) = spec.remote_provider() {
                    self.named_provider(provider, *network)
                        .map_err(|err| invalid(&format!("data source {dataset}: {err}")))?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a network given as a chain id or a configured name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownNetwork`] if `name` is neither.
    pub fn resolve_network(&self, name: &str) -> Result<Network, ConfigError> {
        if let Ok(network) = name.parse::<Network>() {
            return Ok(network);
        }
        self.networks
            .get(name)
            .map(|network| network.chain_id)
            .ok_or_else(|| ConfigError::UnknownNetwork {
                name: name.to_owned(),
            })
    }

    /// The provider to use for a network.
    ///
    /// The network's `default_provider` wins; otherwise the first provider
    /// (by name) serving the network.
    pub fn provider_for(&self, network: Network) -> Option<(&str, &ProviderConfig)> {
        let preferred = self
            .networks
            .values()
            .filter(|config| config.chain_id == network)
            .find_map(|config| config.default_provider.as_deref())
            .and_then(|name| self.providers.get_key_value(name));
        preferred
            .or_else(|| {
                self.providers
                    .iter()
                    .find(|(_, provider)| provider.network == network)
            })
            .map(|(name, provider)| (name.as_str(), provider))
    }

    /// The provider to fetch a dataset from on a network.
    ///
    /// A provider named by the dataset's data source wins; otherwise the
    /// network's provider from [`Self::provider_for`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProvider`] if the data source names a
    /// provider that is not configured, and [`ConfigError::Invalid`] if the
    /// named provider serves another network.
    pub fn provider_for_dataset(
        &self,
        dataset: DatasetKind,
        network: Network,
    ) -> Result<Option<(&str, &ProviderConfig)>, ConfigError> {
        match self
            .data_sources
            .get(dataset, network)
            .and_then(|spec| spec.remote_provider())
        {
            Some(name) => self.named_provider(name, network).map(Some),
            None => Ok(self.provider_for(network)),
        }
    }

    fn named_provider(
        &self,
        name: &str,
        network: Network,
    ) -> Result<(&str, &ProviderConfig), ConfigError> {
        let (name, provider) = self.providers.get_key_value(name).ok_or_else(|| {
            ConfigError::UnknownProvider {
                name: name.to_owned(),
            }
        })?;
        if provider.network != network {
            return Err(ConfigError::Invalid {
                message: format!(
                    "provider {name} serves network {}, not {network}",
                    provider.network
                ),
            });
        }
        Ok((name.as_str(), provider))
    }

    /// Configured name of a network, if any.
    pub fn network_name(&self, network: Network) -> Option<&str> {
        self.networks
            .iter()
            .find(|(_, config)| config.chain_id == network)
            .map(|(name, _)| name.as_str())
    }

    /// Fetch policy as a [`BatchedFetcher`].
    pub const fn fetcher(&self) -> BatchedFetcher {
        BatchedFetcher::new()
            .with_chunk_size(self.fetch.chunk_size)
            .with_max_concurrent_chunks(self.fetch.max_concurrent_chunks)
    }

    /// Pool settings as [`StoreOptions`].
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .with_max_connections(self.store.max_connections)
            .with_connect_timeout(Duration::from_millis(self.store.connect_timeout_ms))
            .with_idle_timeout(Duration::from_millis(self.store.idle_timeout_ms))
    }
}

/// A named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Chain id.
    pub chain_id: Network,

    /// Block explorer host, for display.
    #[serde(default)]
    pub block_explorer: Option<String>,

    /// Provider used for this network when a command names none.
    #[serde(default)]
    pub default_provider: Option<String>,
}

/// A JSON-RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint URL. May embed an API key, so mask it when displaying.
    pub url: String,

    /// Network this endpoint serves.
    pub network: Network,
}

/// Remote fetch policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum keys per remote request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum remote requests in flight.
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrent_chunks: default_max_concurrent_chunks(),
        }
    }
}

/// Store connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Maximum connections per store.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Milliseconds to wait for a connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Milliseconds before an idle connection is closed.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_network() -> Network {
    Network::MAINNET
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_max_concurrent_chunks() -> usize {
    DEFAULT_MAX_CONCURRENT_CHUNKS
}

const fn default_max_connections() -> u32 {
    4
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_idle_timeout_ms() -> u64 {
    300_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
