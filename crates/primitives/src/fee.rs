//! Fee sufficiency judgements.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::ChainId;

/// Outcome of comparing a paid fee with a chain's fee policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum PayState {
    /// The transaction, its fee token or the chain's fee policy is unknown.
    Missing = -1,

    /// The fee is below the policy minimum.
    Insufficient = 0,

    /// The fee satisfies the policy minimum.
    Sufficient = 1,
}

/// The result of evaluating one transaction's fee. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFee {
    /// Source chain of the evaluated transaction.
    pub chain_id: ChainId,

    /// Hash of the evaluated wrapper transaction.
    pub hash: String,

    /// The judgement.
    pub pay_state: PayState,

    /// The paid fee, in whole units of the fee token (or its value if converted through prices).
    pub amount: BigDecimal,

    /// The minimum that had to be paid, in the same unit as [`CheckFee::amount`].
    pub min_proxy_fee: BigDecimal,
}

impl CheckFee {
    /// A judgement for a transaction whose prerequisites could not be resolved.
    pub fn missing(chain_id: ChainId, hash: impl Into<String>) -> Self {
        Self {
            chain_id,
            hash: hash.into(),
            pay_state: PayState::Missing,
            amount: BigDecimal::default(),
            min_proxy_fee: BigDecimal::default(),
        }
    }

    /// Whether the fee was found sufficient.
    pub fn is_paid(&self) -> bool {
        self.pay_state == PayState::Sufficient
    }
}
