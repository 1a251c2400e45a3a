//! The records that make up the cross-chain transaction ledger.
//!
//! A logical transfer is keyed by its [`WrapperTransaction::hash`]. Every chain it touches
//! contributes one leg ([`SrcTransaction`], [`PolyTransaction`] or [`DstTransaction`]) that points
//! back to the wrapper through `wrapper_hash`. Legs can arrive in any order since they are only
//! ever correlated by hash.

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    errors::CodeError,
    types::{BlockHeight, ChainId, Timestamp},
};

/// Lifecycle of a [`WrapperTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum WrapperStatus {
    /// Observed by a backup instance, which defers finalization to the primary.
    Unconfirmed = 0,

    /// Observed on the source chain, destination not reached yet.
    Pending = 1,

    /// All legs have completed.
    Finalized = 2,
}

impl From<WrapperStatus> for u64 {
    fn from(value: WrapperStatus) -> Self {
        value as u64
    }
}

impl TryFrom<u64> for WrapperStatus {
    type Error = CodeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unconfirmed),
            1 => Ok(Self::Pending),
            2 => Ok(Self::Finalized),
            other => Err(CodeError::WrapperStatus(other)),
        }
    }
}

/// The entry record of a logical transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperTransaction {
    /// Hash of the wrapping transaction on the source chain.
    pub hash: String,

    /// The user that initiated the transfer.
    pub user: String,

    /// Source chain of the transfer.
    pub src_chain_id: ChainId,

    /// Height of the block that included the wrapping transaction.
    pub block_height: BlockHeight,

    /// Time of the block that included the wrapping transaction.
    pub time: Timestamp,

    /// Destination chain of the transfer.
    pub dst_chain_id: ChainId,

    /// Receiver on the destination chain.
    pub dst_user: String,

    /// Relayer that serves this transfer.
    pub server_id: u64,

    /// Token the fee was paid in, on the source chain.
    pub fee_token_hash: String,

    /// Fee paid, in the smallest unit of the fee token.
    pub fee_amount: Amount,

    /// See [`WrapperStatus`].
    pub status: WrapperStatus,
}

/// Amount movement observed with a source leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcTransfer {
    pub tx_hash: String,
    pub chain_id: ChainId,
    pub time: Timestamp,
    pub asset: String,
    pub from: String,
    pub to: String,
    pub amount: Amount,
    pub dst_chain_id: ChainId,
    pub dst_asset: String,
    pub dst_user: String,
}

/// Amount movement observed with a destination leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstTransfer {
    pub tx_hash: String,
    pub chain_id: ChainId,
    pub time: Timestamp,
    pub asset: String,
    pub from: String,
    pub to: String,
    pub amount: Amount,
}

/// The lock leg on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcTransaction {
    pub hash: String,
    pub wrapper_hash: String,
    pub chain_id: ChainId,
    pub state: u64,
    pub time: Timestamp,
    pub fee: Amount,
    pub height: BlockHeight,
    pub user: String,
    pub dst_chain_id: ChainId,
    pub contract: String,
    pub key: String,
    pub param: String,

    /// The asset movement that came with this leg, if any.
    pub transfer: Option<SrcTransfer>,
}

/// The confirmation leg on the relay chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyTransaction {
    pub hash: String,
    pub wrapper_hash: String,
    pub chain_id: ChainId,
    pub state: u64,
    pub time: Timestamp,
    pub fee: Amount,
    pub height: BlockHeight,
    pub src_chain_id: ChainId,
    pub src_hash: String,
    pub dst_chain_id: ChainId,
    pub key: String,
}

/// The unlock leg on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstTransaction {
    pub hash: String,
    pub wrapper_hash: String,
    pub chain_id: ChainId,
    pub state: u64,
    pub time: Timestamp,
    pub fee: Amount,
    pub height: BlockHeight,
    pub src_chain_id: ChainId,
    pub contract: String,
    pub poly_hash: String,

    /// The asset movement that came with this leg, if any.
    pub transfer: Option<DstTransfer>,
}

/// Marks a (source chain, destination chain, time bucket) window as aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStatistic {
    pub src_chain_id: ChainId,
    pub dst_chain_id: ChainId,
    pub time: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_status_codes() {
        for status in [
            WrapperStatus::Unconfirmed,
            WrapperStatus::Pending,
            WrapperStatus::Finalized,
        ] {
            assert_eq!(WrapperStatus::try_from(u64::from(status)), Ok(status));
        }

        assert_eq!(
            WrapperStatus::try_from(7),
            Err(CodeError::WrapperStatus(7))
        );
    }
}
