//! Parses command-line arguments for the relay indexer.

use std::path::PathBuf;

use clap::{crate_version, Parser};

#[derive(Debug, Parser)]
#[clap(
    name = "relay-indexer",
    about = "Indexes cross-chain relay transfers into a single ledger",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'c',
        help = "The file containing the configuration for the indexer",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[clap(
        long,
        help = "Run as a backup instance regardless of the configured mode"
    )]
    pub backup: bool,
}
