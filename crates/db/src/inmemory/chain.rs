use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use super::InMemoryDb;
use crate::{chain::ChainDb, errors::DbResult};

#[async_trait]
impl ChainDb for InMemoryDb {
    async fn get_chain(&self, chain_id: ChainId) -> DbResult<Option<Chain>> {
        Ok(self.tables.read().await.chains.get(&chain_id).cloned())
    }

    async fn update_chain(&self, chain: &Chain) -> DbResult<()> {
        self.tables.write().await.update_chain(chain)
    }

    async fn add_chains(&self, chains: &[Chain], fees: &[ChainFee]) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        for chain in chains {
            tables
                .chains
                .entry(chain.chain_id)
                .or_insert_with(|| chain.clone());
        }
        for fee in fees {
            tables
                .chain_fees
                .entry(fee.chain_id)
                .or_insert_with(|| fee.clone());
        }

        Ok(())
    }

    async fn get_chain_fee(&self, chain_id: ChainId) -> DbResult<Option<ChainFee>> {
        Ok(self.tables.read().await.chain_fees.get(&chain_id).cloned())
    }

    async fn set_chain_fee(&self, fee: &ChainFee) -> DbResult<bool> {
        let mut tables = self.tables.write().await;

        match tables.chain_fees.get(&fee.chain_id) {
            Some(existing) if existing.time > fee.time => Ok(false),
            _ => {
                tables.chain_fees.insert(fee.chain_id, fee.clone());
                Ok(true)
            }
        }
    }
}
