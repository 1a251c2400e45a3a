//! Configuration of the engine's components.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether this instance is the authoritative writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerMode {
    /// Writes the ledger and moves checkpoints.
    #[default]
    Primary,

    /// A standby that re-observes chains, never creates wrappers and never moves checkpoints.
    Backup,
}

impl IndexerMode {
    /// Whether this is a standby instance.
    pub const fn is_backup(&self) -> bool {
        matches!(self, IndexerMode::Backup)
    }
}

/// Configuration of the [`StatsAggregator`](crate::stats::StatsAggregator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Time between two aggregation runs.
    pub interval: Duration,

    /// Transfers younger than this are left for the next run, so that late legs of the same
    /// window are not missed.
    pub settle_delay: Duration,

    /// Width of the windows marked in the time statistics.
    pub time_bucket: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            settle_delay: Duration::from_secs(60),
            time_bucket: Duration::from_secs(3_600),
        }
    }
}

/// Configuration of the periodic fee check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEffectConfig {
    /// Time between two runs.
    pub interval: Duration,

    /// Maximum number of pending wrappers evaluated per run.
    pub batch_limit: usize,
}

impl Default for FeeEffectConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_limit: 500,
        }
    }
}
