//! The relay indexer merges what per-chain listeners observe into one cross-chain ledger.

use std::{fs, path::Path};

use clap::Parser;
use config::Config;
use constants::{DEFAULT_THREAD_COUNT, SERVICE_NAME};
use relay_indexer_common::logging::{self, LoggerConfig};
use relay_indexer_core::config::IndexerMode;
use serde::de::DeserializeOwned;
use tokio::runtime;
use tracing::{debug, info, trace};

mod args;
mod bootstrap;
mod config;
mod constants;

fn main() {
    let cli = args::Cli::parse();

    let mut config = parse_toml::<Config>(&cli.config);
    if cli.backup {
        config.mode = IndexerMode::Backup;
    }

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads.unwrap_or(DEFAULT_THREAD_COUNT))
        .enable_all()
        .build()
        .expect("must be able to create runtime");

    {
        // the OTLP exporter needs a reactor to build its channel
        let _guard = runtime.enter();
        logging::init(LoggerConfig::from_env(SERVICE_NAME));
    }

    info!(mode = ?config.mode, chains = config.chains.len(), tokens = config.tokens.len(), "starting relay indexer");

    if let Err(e) = runtime.block_on(bootstrap::run(config)) {
        panic!("relay indexer crashed: {e:?}");
    }

    info!("relay indexer shutdown complete");
}

/// Reads and parses a TOML file from the given path into the given type `T`.
///
/// # Panics
///
/// 1. If the file is not readable.
/// 2. If the contents of the file cannot be deserialized into the given type `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> T
where
    T: std::fmt::Debug + DeserializeOwned,
{
    let path = path.as_ref();

    fs::read_to_string(path)
        .map(|p| {
            trace!(?p, "read file");

            let parsed = toml::from_str::<T>(&p).unwrap_or_else(|e| {
                panic!("failed to parse TOML file {}: {e}", path.display());
            });
            debug!(?parsed, "parsed TOML file");

            parsed
        })
        .unwrap_or_else(|e| {
            panic!("failed to read TOML file {}: {e}", path.display());
        })
}
