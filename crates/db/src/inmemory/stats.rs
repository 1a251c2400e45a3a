use std::collections::BTreeSet;

use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use super::InMemoryDb;
use crate::{
    errors::DbResult,
    stats::{StatsDb, StatsTotals, TransferAggregate},
};

fn is_asset_of(transfer: &SrcTransfer, assets: &BTreeSet<TokenKey>) -> bool {
    assets.contains(&TokenKey::new(transfer.chain_id, &transfer.asset))
}

fn normalized(assets: &[TokenKey]) -> BTreeSet<TokenKey> {
    assets
        .iter()
        .map(|key| TokenKey::new(key.chain_id, &key.hash))
        .collect()
}

#[async_trait]
impl StatsDb for InMemoryDb {
    async fn last_src_transfer(&self, assets: &[TokenKey]) -> DbResult<Option<SrcTransfer>> {
        let assets = normalized(assets);
        let tables = self.tables.read().await;

        Ok(tables
            .src_transfers
            .values()
            .filter(|transfer| is_asset_of(transfer, &assets))
            .max_by_key(|transfer| transfer.time)
            .cloned())
    }

    async fn aggregate_src_transfers(
        &self,
        assets: &[TokenKey],
        min: Timestamp,
        max: Timestamp,
    ) -> DbResult<TransferAggregate> {
        let assets = normalized(assets);
        let tables = self.tables.read().await;

        let selected = tables.src_transfers.values().filter(|transfer| {
            is_asset_of(transfer, &assets) && transfer.time >= min && transfer.time < max
        });

        Ok(selected.fold(TransferAggregate::default(), |mut agg, transfer| {
            agg.amount += &transfer.amount;
            agg.count += 1;
            agg
        }))
    }

    async fn commit_stats_if_checkpoint_matches(
        &self,
        name: &str,
        expected: Timestamp,
        totals: &StatsTotals,
    ) -> DbResult<u64> {
        let mut tables = self.tables.write().await;

        match tables.token_basics.get_mut(name) {
            Some(basic) if basic.stats_update_time == expected => {
                basic.total_amount = totals.total_amount.clamped();
                basic.total_count = totals.total_count;
                basic.stats_update_time = totals.stats_update_time;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn src_transfer_routes(
        &self,
        min: Timestamp,
        max: Timestamp,
    ) -> DbResult<Vec<(ChainId, ChainId)>> {
        let tables = self.tables.read().await;

        let routes: BTreeSet<_> = tables
            .src_transfers
            .values()
            .filter(|transfer| transfer.time >= min && transfer.time < max)
            .map(|transfer| (transfer.chain_id, transfer.dst_chain_id))
            .collect();

        Ok(routes.into_iter().collect())
    }

    async fn has_time_statistic(&self, stat: &TimeStatistic) -> DbResult<bool> {
        Ok(self.tables.read().await.time_statistics.contains(stat))
    }

    async fn insert_time_statistics(&self, stats: &[TimeStatistic]) -> DbResult<()> {
        self.tables
            .write()
            .await
            .time_statistics
            .extend(stats.iter().copied());

        Ok(())
    }
}
