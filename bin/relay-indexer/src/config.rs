use std::time::Duration;

use relay_indexer_core::config::{FeeEffectConfig, IndexerMode, StatsConfig};
use relay_indexer_db::persistent::config::DbConfig;
use relay_indexer_primitives::prelude::*;
use serde::{Deserialize, Serialize};

/// The configuration values that dictate the behavior of the relay indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// Whether this instance writes the ledger or stands by.
    #[serde(default)]
    pub mode: IndexerMode,

    /// The SQLite database to connect to, e.g. `sqlite://relay.db`.
    pub database_url: String,

    /// Time given to running tasks to wind down after a shutdown was requested.
    pub shutdown_timeout: Duration,

    /// Number of runtime worker threads.
    pub num_threads: Option<usize>,

    /// Number of chain events buffered per chain.
    pub feed_capacity: Option<usize>,

    /// The configuration for the sqlite3 database.
    #[serde(default)]
    pub db: DbConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub fee_effect: FeeEffectConfig,

    /// Chains to register on startup. Chains that are already known keep their checkpoints.
    #[serde(default)]
    pub chains: Vec<Chain>,

    /// Fee policies to register on startup. A stored policy is only replaced by a newer one.
    #[serde(default)]
    pub chain_fees: Vec<ChainFee>,

    /// Token basics to register on startup, with their tokens and price markets.
    #[serde(default)]
    pub tokens: Vec<TokenBasic>,

    /// Token maps to register on top of the ones derived from [`Config::tokens`].
    #[serde(default)]
    pub token_maps: Vec<TokenMap>,
}
