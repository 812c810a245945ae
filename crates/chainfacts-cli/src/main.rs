//! `chainfacts` binary.
//!
//! Looks up chain facts (block timestamps, contract creation blocks)
//! through the local store where possible and a JSON-RPC node where not.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration (`--config`, `CHAINFACTS_CONFIG`, or the default path)
//! 3. Initialize structured logging (tracing)
//! 4. Run the command

mod cli;
mod commands;
mod error;
mod summary;

use chainfacts_core::ChainfactsConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::commands::App;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or the command fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(ChainfactsConfig::default_path);
    let config = match (&cli.config, &config_path) {
        // An explicitly named file must exist.
        (Some(path), _) => ChainfactsConfig::from_file(path)?,
        (None, Some(path)) => ChainfactsConfig::load_or_default(path)?,
        (None, None) => {
            let mut config = ChainfactsConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            config
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        config_path = config_path.as_ref().map(|p| p.display().to_string()),
        default_network = config.default_network.chain_id(),
        "Configuration loaded"
    );

    App::new(config, config_path).run(cli.command).await?;
    Ok(())
}
