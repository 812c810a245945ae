//! Human and JSON summaries of the loaded configuration.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use chainfacts_core::ChainfactsConfig;
use chainfacts_core::config::{
    CONFIG_PATH_ENV, FetchConfig, LoggingConfig, NetworkConfig, StoreSettings,
};
use chainfacts_types::{DataSources, Network};
use serde::Serialize;

/// Stand-in for provider URLs unless `--reveal` is given.
pub const MASK: &str = "********";

/// A provider as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    /// Network the provider serves.
    pub network: Network,
    /// URL, or [`MASK`].
    pub url: String,
}

/// Everything `chainfacts config` shows.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Value of `CHAINFACTS_CONFIG`, if set.
    pub config_env: Option<String>,
    /// File the configuration was read from (it may not exist).
    pub config_path: Option<PathBuf>,
    /// Whether that file exists.
    pub config_exists: bool,
    /// Network used when none is given.
    pub default_network: Network,
    /// Named networks.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Providers with URLs masked unless revealed.
    pub providers: BTreeMap<String, ProviderSummary>,
    /// Backend selection.
    pub data_sources: DataSources,
    /// Remote fetch policy.
    pub fetch: FetchConfig,
    /// Store pool settings.
    pub store: StoreSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Whether provider URLs are shown.
    #[serde(skip)]
    pub revealed: bool,
}

impl ConfigSummary {
    /// Summarize `config`, masking provider URLs unless `reveal`.
    pub fn new(config: &ChainfactsConfig, config_path: Option<PathBuf>, reveal: bool) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|(name, provider)| {
                let url = if reveal {
                    provider.url.clone()
                } else {
                    MASK.to_owned()
                };
                (
                    name.clone(),
                    ProviderSummary {
                        network: provider.network,
                        url,
                    },
                )
            })
            .collect();

        Self {
            config_env: std::env::var(CONFIG_PATH_ENV).ok(),
            config_exists: config_path.as_deref().is_some_and(std::path::Path::exists),
            config_path,
            default_network: config.default_network,
            networks: config.networks.clone(),
            providers,
            data_sources: config.data_sources.clone(),
            fetch: config.fetch.clone(),
            store: config.store.clone(),
            logging: config.logging.clone(),
            revealed: reveal,
        }
    }

    /// Render as indented Markdown-style text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# Config Summary")?;
        match &self.config_env {
            Some(value) => writeln!(out, "- {CONFIG_PATH_ENV} set to: {value}")?,
            None => writeln!(out, "- {CONFIG_PATH_ENV} not set")?,
        }
        match &self.config_path {
            Some(path) if self.config_exists => writeln!(out, "- config path: {}", path.display())?,
            Some(path) => writeln!(out, "- config path: {} (not found, using defaults)", path.display())?,
            None => writeln!(out, "- config path: none (HOME not set)")?,
        }

        writeln!(out)?;
        writeln!(out, "## Config Values")?;
        writeln!(out, "- default_network: {}", self.default_network)?;

        writeln!(out, "- networks:")?;
        for (name, network) in &self.networks {
            writeln!(
                out,
                "    - {name}: chain_id={} block_explorer={}",
                network.chain_id,
                network.block_explorer.as_deref().unwrap_or("-")
            )?;
        }

        writeln!(out, "- providers:")?;
        for (name, provider) in &self.providers {
            writeln!(
                out,
                "    - {name}: network={} url={}",
                provider.network, provider.url
            )?;
        }
        if !self.revealed && !self.providers.is_empty() {
            writeln!(out, "    (use --reveal to reveal sensitive provider information)")?;
        }

        writeln!(out, "- data_sources:")?;
        for (dataset, spec) in &self.data_sources.defaults {
            writeln!(out, "    - {dataset}: {}", spec.backend())?;
        }
        for (network, specs) in &self.data_sources.networks {
            for (dataset, spec) in specs {
                writeln!(out, "    - {dataset} on {network}: {}", spec.backend())?;
            }
        }

        writeln!(
            out,
            "- fetch: chunk_size={} max_concurrent_chunks={}",
            self.fetch.chunk_size, self.fetch.max_concurrent_chunks
        )?;
        writeln!(
            out,
            "- store: max_connections={} connect_timeout_ms={} idle_timeout_ms={}",
            self.store.max_connections, self.store.connect_timeout_ms, self.store.idle_timeout_ms
        )?;
        writeln!(out, "- logging: level={}", self.logging.level)
    }
}

#[cfg(test)]
mod tests {
    use chainfacts_core::config::ProviderConfig;

    use super::*;

    fn config() -> ChainfactsConfig {
        let mut config = ChainfactsConfig::default();
        config.providers.insert(
            "alchemy".to_owned(),
            ProviderConfig {
                url: "https://eth-mainnet.example.org/v2/SECRET".to_owned(),
                network: Network::MAINNET,
            },
        );
        config
    }

    #[test]
    fn urls_are_masked_by_default() {
        let summary = ConfigSummary::new(&config(), None, false);
        assert_eq!(summary.providers["alchemy"].url, MASK);

        let text = summary.render();
        assert!(!text.contains("SECRET"));
        assert!(text.contains("--reveal"));

        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("SECRET"));
    }

    #[test]
    fn reveal_shows_urls() {
        let summary = ConfigSummary::new(&config(), None, true);
        let text = summary.render();
        assert!(text.contains("https://eth-mainnet.example.org/v2/SECRET"));
        assert!(!text.contains("--reveal"));
    }

    #[test]
    fn missing_file_is_reported() {
        let path = PathBuf::from("/nonexistent/chainfacts/config.yaml");
        let summary = ConfigSummary::new(&ChainfactsConfig::default(), Some(path), false);
        assert!(summary.render().contains("not found, using defaults"));
    }
}
