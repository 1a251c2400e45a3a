use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use crate::errors::DbResult;

/// Interface to the monitored chains and their fee policies.
#[async_trait]
pub trait ChainDb {
    /// Returns the stored chain.
    async fn get_chain(&self, chain_id: ChainId) -> DbResult<Option<Chain>>;

    /// Writes the checkpoint of an existing chain.
    ///
    /// A zero `height_swap` leaves the stored swap checkpoint untouched. Fails with
    /// [`DbError::NoRowsUpdated`](crate::errors::DbError::NoRowsUpdated) if the chain is unknown.
    async fn update_chain(&self, chain: &Chain) -> DbResult<()>;

    /// Registers chains and fee policies. Existing entries are left as they are.
    async fn add_chains(&self, chains: &[Chain], fees: &[ChainFee]) -> DbResult<()>;

    /// Returns the fee policy of a chain.
    async fn get_chain_fee(&self, chain_id: ChainId) -> DbResult<Option<ChainFee>>;

    /// Stores a fee policy unless a newer one is already stored.
    ///
    /// Returns whether the policy was written.
    async fn set_chain_fee(&self, fee: &ChainFee) -> DbResult<bool>;
}
