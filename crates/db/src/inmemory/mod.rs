//! In-memory implementation of the persistence gateway.
//!
//! Every table lives behind a single lock so that a merge is applied to a staged copy and swapped
//! in only when all of its stages succeeded, mirroring the transactional behavior of the
//! persistent store.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use relay_indexer_primitives::prelude::*;
use tokio::sync::RwLock;

use crate::{
    errors::{BatchStage, DbError, DbResult},
    ledger::WrapperMergePolicy,
};

mod chain;
pub mod errors;
mod ledger;
mod stats;
mod token;

pub mod prelude {
    pub use super::{errors::InMemoryError as Error, InMemoryDb, Tables};
}

/// Key of a transfer row: `(chain id, asset, tx hash, time)`.
pub type TransferKey = (ChainId, String, String, Timestamp);

/// All the tables of the in-memory store.
///
/// Legs are stored without their transfers; transfers live in their own tables just like they do
/// in the persistent store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub chains: BTreeMap<ChainId, Chain>,
    pub chain_fees: BTreeMap<ChainId, ChainFee>,
    pub wrappers: BTreeMap<String, WrapperTransaction>,
    pub src_transactions: BTreeMap<String, SrcTransaction>,
    pub src_transfers: BTreeMap<TransferKey, SrcTransfer>,
    pub poly_transactions: BTreeMap<String, PolyTransaction>,
    pub dst_transactions: BTreeMap<String, DstTransaction>,
    pub dst_transfers: BTreeMap<TransferKey, DstTransfer>,
    pub token_basics: BTreeMap<String, TokenBasic>,
    pub tokens: BTreeMap<TokenKey, Token>,
    pub price_markets: BTreeMap<(String, String), PriceMarket>,
    pub token_maps: BTreeMap<(TokenKey, TokenKey), TokenMap>,
    pub time_statistics: BTreeSet<TimeStatistic>,
}

impl Tables {
    fn merge_wrappers(&mut self, wrappers: Vec<WrapperTransaction>, policy: WrapperMergePolicy) {
        for mut wrapper in wrappers {
            wrapper.fee_amount = wrapper.fee_amount.clamped();

            match policy {
                WrapperMergePolicy::Upsert => {
                    self.wrappers.insert(wrapper.hash.clone(), wrapper);
                }
                WrapperMergePolicy::ForceUnconfirmed => {
                    if let Some(existing) = self.wrappers.get_mut(&wrapper.hash) {
                        wrapper.status = WrapperStatus::Unconfirmed;
                        *existing = wrapper;
                    }
                }
            }
        }
    }

    fn merge_src(&mut self, legs: Vec<SrcTransaction>) {
        for mut leg in legs {
            self.src_transfers.retain(|(_, _, tx_hash, _), _| tx_hash != &leg.hash);

            if let Some(mut transfer) = leg.transfer.take() {
                transfer.amount = transfer.amount.clamped();
                let key = (
                    transfer.chain_id,
                    transfer.asset.clone(),
                    transfer.tx_hash.clone(),
                    transfer.time,
                );
                self.src_transfers.insert(key, transfer);
            }

            leg.fee = leg.fee.clamped();
            self.src_transactions.insert(leg.hash.clone(), leg);
        }
    }

    fn merge_poly(&mut self, legs: Vec<PolyTransaction>) {
        for mut leg in legs {
            leg.fee = leg.fee.clamped();
            self.poly_transactions.insert(leg.hash.clone(), leg);
        }
    }

    fn merge_dst(&mut self, legs: Vec<DstTransaction>) {
        for mut leg in legs {
            self.dst_transfers.retain(|(_, _, tx_hash, _), _| tx_hash != &leg.hash);

            if let Some(mut transfer) = leg.transfer.take() {
                transfer.amount = transfer.amount.clamped();
                let key = (
                    transfer.chain_id,
                    transfer.asset.clone(),
                    transfer.tx_hash.clone(),
                    transfer.time,
                );
                self.dst_transfers.insert(key, transfer);
            }

            leg.fee = leg.fee.clamped();
            self.dst_transactions.insert(leg.hash.clone(), leg);
        }
    }

    fn update_chain(&mut self, chain: &Chain) -> DbResult<()> {
        let stored = self
            .chains
            .get_mut(&chain.chain_id)
            .ok_or_else(|| DbError::NoRowsUpdated(format!("chain {}", chain.chain_id)))?;

        stored.height = chain.height;
        if !chain.name.is_empty() {
            stored.name = chain.name.clone();
        }
        if chain.height_swap > 0 {
            stored.height_swap = chain.height_swap;
        }

        Ok(())
    }

    fn token_basic_with_relations(&self, name: &str) -> Option<TokenBasic> {
        let mut basic = self.token_basics.get(name)?.clone();

        basic.tokens = self
            .tokens
            .values()
            .filter(|token| token.token_basic_name == name)
            .cloned()
            .collect();
        basic.price_markets = self
            .price_markets
            .values()
            .filter(|market| market.token_basic_name == name)
            .cloned()
            .collect();

        Some(basic)
    }
}

/// In-memory database implementing every part of the gateway.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDb {
    tables: Arc<RwLock<Tables>>,

    /// Stage at which the next merge fails, if any.
    fail_next_merge: Arc<RwLock<Option<BatchStage>>>,
}

impl InMemoryDb {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every table.
    pub async fn snapshot(&self) -> Tables {
        self.tables.read().await.clone()
    }

    /// Makes the next call to
    /// [`LedgerDb::merge_batch`](crate::ledger::LedgerDb::merge_batch) fail when it reaches
    /// `stage`.
    pub async fn fail_next_merge_at(&self, stage: BatchStage) {
        *self.fail_next_merge.write().await = Some(stage);
    }
}
