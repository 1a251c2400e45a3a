//! This crate contains the data model of the relay indexer: chains, ledger records, token
//! identities and the arbitrary-precision [`Amount`](amount::Amount) they are denominated in.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace.

pub mod amount;
pub mod chain;
pub mod constants;
pub mod errors;
pub mod fee;
pub mod ledger;
pub mod token;
pub mod types;

/// Re-exports of the most commonly used types.
pub mod prelude {
    pub use crate::{
        amount::Amount,
        chain::{Chain, ChainFee},
        fee::{CheckFee, PayState},
        ledger::{
            DstTransaction, DstTransfer, PolyTransaction, SrcTransaction, SrcTransfer,
            TimeStatistic, WrapperStatus, WrapperTransaction,
        },
        token::{MapProperty, PriceMarket, Token, TokenBasic, TokenKey, TokenMap},
        types::{normalize_hash, BlockHeight, ChainId, Timestamp},
    };
}
