//! This module contains the models for the database tables.
//!
//! These models rely on some common types in [`super::types`] module.

use relay_indexer_primitives::prelude::*;
use sqlx::{self};

use super::types::{DbAmount, DbMapProperty, DbTokenHash, DbU64, DbWrapperStatus};

/// The model for a monitored chain.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct ChainRow {
    pub(super) chain_id: DbU64,
    pub(super) name: String,
    pub(super) height: DbU64,
    pub(super) height_swap: DbU64,
}

impl From<ChainRow> for Chain {
    fn from(row: ChainRow) -> Self {
        Self {
            chain_id: *row.chain_id,
            name: row.name,
            height: *row.height,
            height_swap: *row.height_swap,
        }
    }
}

/// The model for the fee policy of a chain.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct ChainFeeRow {
    pub(super) chain_id: DbU64,
    pub(super) token_basic_name: String,
    pub(super) max_fee: DbAmount,
    pub(super) min_fee: DbAmount,
    pub(super) proxy_fee: DbAmount,
    pub(super) ind: DbU64,
    pub(super) time: DbU64,
}

impl From<ChainFeeRow> for ChainFee {
    fn from(row: ChainFeeRow) -> Self {
        Self {
            chain_id: *row.chain_id,
            token_basic_name: row.token_basic_name,
            max_fee: row.max_fee.into(),
            min_fee: row.min_fee.into(),
            proxy_fee: row.proxy_fee.into(),
            ind: *row.ind,
            time: *row.time,
        }
    }
}

/// The model for a wrapper transaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct WrapperRow {
    pub(super) hash: String,

    /// Stored as `user_address` since `user` is reserved in some SQL dialects.
    pub(super) user_address: String,
    pub(super) src_chain_id: DbU64,
    pub(super) block_height: DbU64,
    pub(super) time: DbU64,
    pub(super) dst_chain_id: DbU64,
    pub(super) dst_user: String,
    pub(super) server_id: DbU64,
    pub(super) fee_token_hash: String,
    pub(super) fee_amount: DbAmount,
    pub(super) status: DbWrapperStatus,
}

impl From<WrapperRow> for WrapperTransaction {
    fn from(row: WrapperRow) -> Self {
        Self {
            hash: row.hash,
            user: row.user_address,
            src_chain_id: *row.src_chain_id,
            block_height: *row.block_height,
            time: *row.time,
            dst_chain_id: *row.dst_chain_id,
            dst_user: row.dst_user,
            server_id: *row.server_id,
            fee_token_hash: row.fee_token_hash,
            fee_amount: row.fee_amount.into(),
            status: *row.status,
        }
    }
}

/// The model for a source leg, without its transfer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct SrcTransactionRow {
    pub(super) hash: String,
    pub(super) wrapper_hash: String,
    pub(super) chain_id: DbU64,
    pub(super) state: DbU64,
    pub(super) time: DbU64,
    pub(super) fee: DbAmount,
    pub(super) height: DbU64,
    pub(super) user_address: String,
    pub(super) dst_chain_id: DbU64,
    pub(super) contract: String,
    pub(super) tx_key: String,
    pub(super) param: String,
}

impl SrcTransactionRow {
    pub(super) fn into_leg(self, transfer: Option<SrcTransfer>) -> SrcTransaction {
        SrcTransaction {
            hash: self.hash,
            wrapper_hash: self.wrapper_hash,
            chain_id: *self.chain_id,
            state: *self.state,
            time: *self.time,
            fee: self.fee.into(),
            height: *self.height,
            user: self.user_address,
            dst_chain_id: *self.dst_chain_id,
            contract: self.contract,
            key: self.tx_key,
            param: self.param,
            transfer,
        }
    }
}

/// The model for a source transfer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct SrcTransferRow {
    pub(super) tx_hash: String,
    pub(super) chain_id: DbU64,
    pub(super) time: DbU64,
    pub(super) asset: String,
    pub(super) from_address: String,
    pub(super) to_address: String,
    pub(super) amount: DbAmount,
    pub(super) dst_chain_id: DbU64,
    pub(super) dst_asset: String,
    pub(super) dst_user: String,
}

impl From<SrcTransferRow> for SrcTransfer {
    fn from(row: SrcTransferRow) -> Self {
        Self {
            tx_hash: row.tx_hash,
            chain_id: *row.chain_id,
            time: *row.time,
            asset: row.asset,
            from: row.from_address,
            to: row.to_address,
            amount: row.amount.into(),
            dst_chain_id: *row.dst_chain_id,
            dst_asset: row.dst_asset,
            dst_user: row.dst_user,
        }
    }
}

/// The model for a relay chain leg.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct PolyTransactionRow {
    pub(super) hash: String,
    pub(super) wrapper_hash: String,
    pub(super) chain_id: DbU64,
    pub(super) state: DbU64,
    pub(super) time: DbU64,
    pub(super) fee: DbAmount,
    pub(super) height: DbU64,
    pub(super) src_chain_id: DbU64,
    pub(super) src_hash: String,
    pub(super) dst_chain_id: DbU64,
    pub(super) tx_key: String,
}

impl From<PolyTransactionRow> for PolyTransaction {
    fn from(row: PolyTransactionRow) -> Self {
        Self {
            hash: row.hash,
            wrapper_hash: row.wrapper_hash,
            chain_id: *row.chain_id,
            state: *row.state,
            time: *row.time,
            fee: row.fee.into(),
            height: *row.height,
            src_chain_id: *row.src_chain_id,
            src_hash: row.src_hash,
            dst_chain_id: *row.dst_chain_id,
            key: row.tx_key,
        }
    }
}

/// The model for a destination leg, without its transfer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct DstTransactionRow {
    pub(super) hash: String,
    pub(super) wrapper_hash: String,
    pub(super) chain_id: DbU64,
    pub(super) state: DbU64,
    pub(super) time: DbU64,
    pub(super) fee: DbAmount,
    pub(super) height: DbU64,
    pub(super) src_chain_id: DbU64,
    pub(super) contract: String,
    pub(super) poly_hash: String,
}

impl DstTransactionRow {
    pub(super) fn into_leg(self, transfer: Option<DstTransfer>) -> DstTransaction {
        DstTransaction {
            hash: self.hash,
            wrapper_hash: self.wrapper_hash,
            chain_id: *self.chain_id,
            state: *self.state,
            time: *self.time,
            fee: self.fee.into(),
            height: *self.height,
            src_chain_id: *self.src_chain_id,
            contract: self.contract,
            poly_hash: self.poly_hash,
            transfer,
        }
    }
}

/// The model for a destination transfer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct DstTransferRow {
    pub(super) tx_hash: String,
    pub(super) chain_id: DbU64,
    pub(super) time: DbU64,
    pub(super) asset: String,
    pub(super) from_address: String,
    pub(super) to_address: String,
    pub(super) amount: DbAmount,
}

impl From<DstTransferRow> for DstTransfer {
    fn from(row: DstTransferRow) -> Self {
        Self {
            tx_hash: row.tx_hash,
            chain_id: *row.chain_id,
            time: *row.time,
            asset: row.asset,
            from: row.from_address,
            to: row.to_address,
            amount: row.amount.into(),
        }
    }
}

/// The model for a token basic, without its tokens and price markets.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct TokenBasicRow {
    pub(super) name: String,
    pub(super) precision: DbU64,
    pub(super) price: i64,
    pub(super) ind: DbU64,
    pub(super) time: DbU64,
    pub(super) property: i64,
    pub(super) total_amount: DbAmount,
    pub(super) total_count: DbU64,
    pub(super) stats_update_time: DbU64,
}

impl TokenBasicRow {
    pub(super) fn into_basic(
        self,
        tokens: Vec<Token>,
        price_markets: Vec<PriceMarket>,
    ) -> TokenBasic {
        TokenBasic {
            name: self.name,
            precision: *self.precision,
            price: self.price,
            ind: *self.ind,
            time: *self.time,
            property: self.property,
            total_amount: self.total_amount.into(),
            total_count: *self.total_count,
            stats_update_time: *self.stats_update_time,
            tokens,
            price_markets,
        }
    }
}

/// The model for a chain-specific token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct TokenRow {
    pub(super) hash: DbTokenHash,
    pub(super) chain_id: DbU64,
    pub(super) name: String,
    pub(super) precision: DbU64,
    pub(super) token_basic_name: String,
    pub(super) property: i64,
    pub(super) available_amount: Option<DbAmount>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Self {
            hash: row.hash.into(),
            chain_id: *row.chain_id,
            name: row.name,
            precision: *row.precision,
            token_basic_name: row.token_basic_name,
            property: row.property,
            available_amount: row.available_amount.map(Into::into),
        }
    }
}

/// The model for a price source.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct PriceMarketRow {
    pub(super) token_basic_name: String,
    pub(super) market_name: String,
    pub(super) name: String,
    pub(super) price: i64,
    pub(super) ind: DbU64,
    pub(super) time: DbU64,
}

impl From<PriceMarketRow> for PriceMarket {
    fn from(row: PriceMarketRow) -> Self {
        Self {
            token_basic_name: row.token_basic_name,
            market_name: row.market_name,
            name: row.name,
            price: row.price,
            ind: *row.ind,
            time: *row.time,
        }
    }
}

/// The model for an equivalence edge.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct TokenMapRow {
    pub(super) src_chain_id: DbU64,
    pub(super) src_token_hash: DbTokenHash,
    pub(super) dst_chain_id: DbU64,
    pub(super) dst_token_hash: DbTokenHash,
    pub(super) property: DbMapProperty,
}

impl From<TokenMapRow> for TokenMap {
    fn from(row: TokenMapRow) -> Self {
        Self {
            src_chain_id: *row.src_chain_id,
            src_token_hash: row.src_token_hash.into(),
            dst_chain_id: *row.dst_chain_id,
            dst_token_hash: row.dst_token_hash.into(),
            property: *row.property,
        }
    }
}

/// The model for a `(src chain, dst chain)` pair.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub(super) struct RouteRow {
    pub(super) chain_id: DbU64,
    pub(super) dst_chain_id: DbU64,
}
