//! Running transfer statistics per token basic.
//!
//! Each [`TokenBasic`] carries a checkpoint, `stats_update_time`, up to which its transfers have
//! been folded into its totals. An aggregation reads the checkpoint, sums the transfers of the
//! window that follows it and commits the new totals only if the checkpoint did not move in the
//! meantime. A run that loses this race is discarded; the winner already covered its window.

use std::sync::Arc;

use chrono::Utc;
use relay_indexer_db::{
    stats::{StatsTotals, TransferAggregate},
    IndexerDb,
};
use relay_indexer_primitives::{constants::MAX_TIMESTAMP, prelude::*};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{config::StatsConfig, errors::EngineResult};

/// Why an aggregation did not commit anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The window ends at or before the checkpoint.
    EmptyWindow,

    /// The basic has no tokens.
    NoTokens,

    /// No transfer happened since the checkpoint.
    NoNewTransfers,
}

/// Result of aggregating one token basic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// New totals were written and the checkpoint moved to `checkpoint`.
    Committed {
        /// Volume added by this run.
        amount: Amount,

        /// Transfers added by this run.
        count: u64,

        checkpoint: Timestamp,
    },

    /// Another run moved the checkpoint first. Nothing was written.
    Conflict,

    /// Nothing to do.
    Skipped(SkipReason),
}

/// Folds source transfers into the totals of their token basic.
#[derive(Debug)]
pub struct StatsAggregator<Db> {
    db: Arc<Db>,
    config: StatsConfig,
}

impl<Db> Clone for StatsAggregator<Db> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            config: self.config.clone(),
        }
    }
}

impl<Db: IndexerDb> StatsAggregator<Db> {
    pub fn new(db: Arc<Db>, config: StatsConfig) -> Self {
        Self { db, config }
    }

    /// Aggregates the transfers of `basic` in `[basic.stats_update_time, max)`.
    ///
    /// `basic` is the state read at the start of the aggregation; its checkpoint guards the
    /// commit. `max` is capped at [`MAX_TIMESTAMP`].
    pub async fn aggregate_token_basic(
        &self,
        basic: &TokenBasic,
        max: Timestamp,
    ) -> EngineResult<AggregationOutcome> {
        let max = max.min(MAX_TIMESTAMP);
        let min = basic.stats_update_time;
        if max <= min {
            return Ok(AggregationOutcome::Skipped(SkipReason::EmptyWindow));
        }

        let assets = basic.token_keys();
        if assets.is_empty() {
            return Ok(AggregationOutcome::Skipped(SkipReason::NoTokens));
        }

        let last = self.db.last_src_transfer(&assets).await?;
        if last.map_or(true, |transfer| transfer.time < min) {
            return Ok(AggregationOutcome::Skipped(SkipReason::NoNewTransfers));
        }

        let TransferAggregate { amount, count } =
            self.db.aggregate_src_transfers(&assets, min, max).await?;

        let totals = StatsTotals {
            total_amount: basic.total_amount.clone() + &amount,
            total_count: basic.total_count + count,
            stats_update_time: max,
        };
        if totals.total_amount.exceeds_storage_width() {
            warn!(name = %basic.name, total_amount = %totals.total_amount, "total amount too wide, clamping");
        }

        let updated = self
            .db
            .commit_stats_if_checkpoint_matches(&basic.name, min, &totals)
            .await?;
        if updated == 0 {
            warn!(name = %basic.name, checkpoint = min, "checkpoint moved during aggregation, discarding");
            return Ok(AggregationOutcome::Conflict);
        }

        debug!(name = %basic.name, %min, %max, %amount, %count, "aggregated transfers");

        Ok(AggregationOutcome::Committed {
            amount,
            count,
            checkpoint: max,
        })
    }

    /// Aggregates every token basic up to `now` minus the settle delay.
    ///
    /// A failure on one basic is logged and does not prevent the others from being aggregated.
    pub async fn run_once(&self, now: Timestamp) -> EngineResult<Vec<(String, AggregationOutcome)>> {
        let max = now.saturating_sub(self.config.settle_delay.as_secs());
        let basics = self.db.list_token_basics().await?;

        let mut outcomes = Vec::with_capacity(basics.len());
        for basic in &basics {
            match self.aggregate_token_basic(basic, max).await {
                Ok(outcome) => outcomes.push((basic.name.clone(), outcome)),
                Err(e) => error!(name = %basic.name, %e, "could not aggregate transfers"),
            }
        }

        let committed = outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, AggregationOutcome::Committed { .. }))
            .count();
        info!(%max, basics = basics.len(), %committed, "aggregated statistics");

        Ok(outcomes)
    }

    /// Marks the `(src chain, dst chain)` pairs that have transfers in the bucket starting at
    /// `bucket_start`. Pairs already marked for that bucket are left alone.
    ///
    /// Returns the number of new marks.
    pub async fn record_time_statistics(&self, bucket_start: Timestamp) -> EngineResult<usize> {
        let bucket_end = bucket_start.saturating_add(self.config.time_bucket.as_secs());
        let routes = self
            .db
            .src_transfer_routes(bucket_start, bucket_end)
            .await?;

        let mut marks = Vec::with_capacity(routes.len());
        for (src_chain_id, dst_chain_id) in routes {
            let mark = TimeStatistic {
                src_chain_id,
                dst_chain_id,
                time: bucket_start,
            };
            if !self.db.has_time_statistic(&mark).await? {
                marks.push(mark);
            }
        }

        if !marks.is_empty() {
            self.db.insert_time_statistics(&marks).await?;
        }

        debug!(%bucket_start, %bucket_end, marked = marks.len(), "recorded time statistics");

        Ok(marks.len())
    }

    /// Aggregates on every tick until `cancel` fires, marking the last complete time bucket
    /// each time.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval = ?self.config.interval, settle_delay = ?self.config.settle_delay, "starting stats aggregation");

        let mut ticker = interval(self.config.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopping stats aggregation");
                    break;
                }
                _ = ticker.tick() => {
                    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();

                    if let Err(e) = self.run_once(now).await {
                        error!(%e, "could not aggregate statistics");
                    }

                    if let Some(bucket_start) = previous_bucket(now, self.config.time_bucket.as_secs()) {
                        if let Err(e) = self.record_time_statistics(bucket_start).await {
                            error!(%e, %bucket_start, "could not record time statistics");
                        }
                    }
                }
            }
        }
    }
}

/// Start of the last bucket of width `bucket` that ended at or before `now`.
fn previous_bucket(now: Timestamp, bucket: u64) -> Option<Timestamp> {
    if bucket == 0 {
        return None;
    }

    (now / bucket * bucket).checked_sub(bucket)
}
