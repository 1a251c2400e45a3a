use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;
use tracing::trace;

use super::{errors::InMemoryError, InMemoryDb};
use crate::{
    errors::{BatchStage, DbError, DbResult},
    ledger::{InvalidatedHashes, LedgerDb, MergeBatch},
};

fn injected(fail_at: Option<BatchStage>, stage: BatchStage) -> DbResult<()> {
    if fail_at == Some(stage) {
        return Err(DbError::partial(
            stage,
            InMemoryError::InjectedFailure(stage),
        ));
    }

    Ok(())
}

#[async_trait]
impl LedgerDb for InMemoryDb {
    async fn merge_batch(&self, batch: MergeBatch) -> DbResult<()> {
        let fail_at = self.fail_next_merge.write().await.take();

        trace!(action = "trying to acquire wlock on tables", chain = ?batch.chain.as_ref().map(|c| c.chain_id));
        let mut tables = self.tables.write().await;
        trace!(event = "acquired wlock on tables");

        let mut staged = tables.clone();

        if !batch.wrappers.is_empty() {
            injected(fail_at, BatchStage::Wrappers)?;
            staged.merge_wrappers(batch.wrappers, batch.wrapper_policy);
        }

        if !batch.src.is_empty() {
            injected(fail_at, BatchStage::SrcTransactions)?;
            staged.merge_src(batch.src);
        }

        if !batch.poly.is_empty() {
            injected(fail_at, BatchStage::PolyTransactions)?;
            staged.merge_poly(batch.poly);
        }

        if !batch.dst.is_empty() {
            injected(fail_at, BatchStage::DstTransactions)?;
            staged.merge_dst(batch.dst);
        }

        if let Some(chain) = batch.chain {
            injected(fail_at, BatchStage::Chain)?;
            staged
                .update_chain(&chain)
                .map_err(|e| DbError::partial(BatchStage::Chain, e))?;
        }

        *tables = staged;

        Ok(())
    }

    async fn delete_by_hashes(&self, hashes: &InvalidatedHashes) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        tables
            .src_transfers
            .retain(|(_, _, tx_hash, _), _| !hashes.src.contains(tx_hash));
        tables
            .dst_transfers
            .retain(|(_, _, tx_hash, _), _| !hashes.dst.contains(tx_hash));

        for hash in &hashes.src {
            tables.src_transactions.remove(hash);
        }
        for hash in &hashes.poly {
            tables.poly_transactions.remove(hash);
        }
        for hash in &hashes.dst {
            tables.dst_transactions.remove(hash);
        }

        for hash in &hashes.src {
            tables.wrappers.remove(hash);
        }

        Ok(())
    }

    async fn get_wrapper(&self, hash: &str) -> DbResult<Option<WrapperTransaction>> {
        Ok(self.tables.read().await.wrappers.get(hash).cloned())
    }

    async fn get_src_transaction(&self, hash: &str) -> DbResult<Option<SrcTransaction>> {
        let tables = self.tables.read().await;

        Ok(tables.src_transactions.get(hash).map(|leg| {
            let transfer = tables
                .src_transfers
                .values()
                .find(|transfer| transfer.tx_hash == hash)
                .cloned();

            SrcTransaction {
                transfer,
                ..leg.clone()
            }
        }))
    }

    async fn get_poly_transaction(&self, hash: &str) -> DbResult<Option<PolyTransaction>> {
        Ok(self.tables.read().await.poly_transactions.get(hash).cloned())
    }

    async fn get_dst_transaction(&self, hash: &str) -> DbResult<Option<DstTransaction>> {
        let tables = self.tables.read().await;

        Ok(tables.dst_transactions.get(hash).map(|leg| {
            let transfer = tables
                .dst_transfers
                .values()
                .find(|transfer| transfer.tx_hash == hash)
                .cloned();

            DstTransaction {
                transfer,
                ..leg.clone()
            }
        }))
    }

    async fn list_wrappers_by_status(
        &self,
        status: WrapperStatus,
        limit: usize,
    ) -> DbResult<Vec<WrapperTransaction>> {
        let tables = self.tables.read().await;

        let mut wrappers: Vec<_> = tables
            .wrappers
            .values()
            .filter(|wrapper| wrapper.status == status)
            .cloned()
            .collect();
        wrappers.sort_by(|a, b| (a.time, &a.hash).cmp(&(b.time, &b.hash)));
        wrappers.truncate(limit);

        Ok(wrappers)
    }
}
