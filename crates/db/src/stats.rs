use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use crate::errors::DbResult;

/// Sum and count of a set of transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferAggregate {
    pub amount: Amount,
    pub count: u64,
}

/// New running statistics of a [`TokenBasic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsTotals {
    pub total_amount: Amount,
    pub total_count: u64,

    /// The checkpoint after this commit.
    pub stats_update_time: Timestamp,
}

/// Interface used by the statistics aggregation.
#[async_trait]
pub trait StatsDb {
    /// Returns the most recent source transfer of any of the given assets.
    async fn last_src_transfer(&self, assets: &[TokenKey]) -> DbResult<Option<SrcTransfer>>;

    /// Sums the source transfers of the given assets whose time lies in `[min, max)`.
    ///
    /// The sum is computed without any loss of precision.
    async fn aggregate_src_transfers(
        &self,
        assets: &[TokenKey],
        min: Timestamp,
        max: Timestamp,
    ) -> DbResult<TransferAggregate>;

    /// Writes new running statistics only if the stored checkpoint still equals `expected`.
    ///
    /// Returns the number of updated rows, which is zero when another run committed first.
    async fn commit_stats_if_checkpoint_matches(
        &self,
        name: &str,
        expected: Timestamp,
        totals: &StatsTotals,
    ) -> DbResult<u64>;

    /// Returns the distinct `(src chain, dst chain)` pairs of the source transfers in `[min, max)`.
    async fn src_transfer_routes(
        &self,
        min: Timestamp,
        max: Timestamp,
    ) -> DbResult<Vec<(ChainId, ChainId)>>;

    /// Whether a window was marked as aggregated.
    async fn has_time_statistic(&self, stat: &TimeStatistic) -> DbResult<bool>;

    /// Marks windows as aggregated. Already marked windows are ignored.
    async fn insert_time_statistics(&self, stats: &[TimeStatistic]) -> DbResult<()>;
}
