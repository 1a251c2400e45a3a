//! Monitored chains and their fee policies.

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    types::{BlockHeight, ChainId, Timestamp},
};

/// A monitored chain and its checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Identifier of the chain.
    pub chain_id: ChainId,

    /// Human readable name.
    pub name: String,

    /// Last block height whose events were durably merged.
    pub height: BlockHeight,

    /// Checkpoint of the swap/sync process that runs against this chain.
    #[serde(default)]
    pub height_swap: BlockHeight,
}

impl Chain {
    /// Creates a chain with both checkpoints at `height`.
    pub fn new(chain_id: ChainId, name: impl Into<String>, height: BlockHeight) -> Self {
        Self {
            chain_id,
            name: name.into(),
            height,
            height_swap: height,
        }
    }

    /// Returns a copy of this chain with the checkpoint moved to `height`.
    pub fn at_height(&self, height: BlockHeight) -> Self {
        Self {
            height,
            ..self.clone()
        }
    }
}

/// The fee policy of a chain.
///
/// All fee bounds are denominated in [`ChainFee::token_basic_name`] and expressed in the smallest
/// unit of that token basic's precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFee {
    /// The chain this policy applies to.
    pub chain_id: ChainId,

    /// Name of the token basic the fees are denominated in.
    pub token_basic_name: String,

    /// Upper fee bound.
    pub max_fee: Amount,

    /// Lower fee bound, i.e., the minimum proxy fee a transfer has to pay.
    pub min_fee: Amount,

    /// Fee charged by the relayer.
    pub proxy_fee: Amount,

    /// Whether the quote behind this policy is usable.
    #[serde(default)]
    pub ind: u64,

    /// Update time of the quote; never decreases.
    pub time: Timestamp,
}
