//! Token identities and the equivalence graph between them.

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    types::{normalize_hash, ChainId, Timestamp},
};

/// Identifies a chain-specific token by `(chain id, hash)`.
///
/// The hash is always stored lower-cased so that two keys compare equal regardless of how the
/// chain collaborator spelled the hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    pub chain_id: ChainId,
    pub hash: String,
}

impl TokenKey {
    /// Creates a new [`TokenKey`], normalizing the hash.
    pub fn new(chain_id: ChainId, hash: &str) -> Self {
        Self {
            chain_id,
            hash: normalize_hash(hash),
        }
    }
}

/// A token identity that spans chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBasic {
    /// Unique name, e.g. `USDT`.
    pub name: String,

    /// Decimal precision used for prices and for [`ChainFee`](crate::chain::ChainFee) bounds.
    pub precision: u64,

    /// Price scaled by a fixed factor shared by all token basics.
    pub price: i64,

    /// Whether [`TokenBasic::price`] is usable.
    pub ind: u64,

    /// Time of the last price update.
    #[serde(default)]
    pub time: Timestamp,

    /// 1 if the token is listed.
    pub property: i64,

    /// Running transferred volume.
    #[serde(default)]
    pub total_amount: Amount,

    /// Running transfer count.
    #[serde(default)]
    pub total_count: u64,

    /// End (exclusive) of the last aggregated statistics window.
    #[serde(default)]
    pub stats_update_time: Timestamp,

    /// The chain-specific representations.
    #[serde(default)]
    pub tokens: Vec<Token>,

    /// Price sources.
    #[serde(default)]
    pub price_markets: Vec<PriceMarket>,
}

impl TokenBasic {
    /// The keys of all tokens of this basic.
    pub fn token_keys(&self) -> Vec<TokenKey> {
        self.tokens.iter().map(Token::key).collect()
    }
}

/// One chain-specific representation of a [`TokenBasic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub hash: String,
    pub chain_id: ChainId,
    pub name: String,
    pub precision: u64,
    pub token_basic_name: String,
    pub property: i64,

    /// Amount that can currently be unlocked on this chain, if known.
    #[serde(default)]
    pub available_amount: Option<Amount>,
}

impl Token {
    /// Returns the key of this token.
    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.chain_id, &self.hash)
    }
}

/// A price source for a [`TokenBasic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMarket {
    pub token_basic_name: String,
    pub market_name: String,
    pub name: String,
    pub price: i64,
    pub ind: u64,
    pub time: Timestamp,
}

/// Whether a [`TokenMap`] edge is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum MapProperty {
    /// Soft-deleted, kept because historical records may still point at it.
    Inactive = 0,

    /// In use.
    Active = 1,
}

impl From<MapProperty> for i64 {
    fn from(value: MapProperty) -> Self {
        value as i64
    }
}

impl From<i64> for MapProperty {
    fn from(value: i64) -> Self {
        if value == MapProperty::Active as i64 {
            MapProperty::Active
        } else {
            MapProperty::Inactive
        }
    }
}

/// A directed equivalence edge between two chain-specific tokens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenMap {
    pub src_chain_id: ChainId,
    pub src_token_hash: String,
    pub dst_chain_id: ChainId,
    pub dst_token_hash: String,
    pub property: MapProperty,
}

impl TokenMap {
    /// Creates an active edge from `src` to `dst`.
    pub fn active(src: &TokenKey, dst: &TokenKey) -> Self {
        Self {
            src_chain_id: src.chain_id,
            src_token_hash: normalize_hash(&src.hash),
            dst_chain_id: dst.chain_id,
            dst_token_hash: normalize_hash(&dst.hash),
            property: MapProperty::Active,
        }
    }

    /// The normalized source key.
    pub fn src(&self) -> TokenKey {
        TokenKey::new(self.src_chain_id, &self.src_token_hash)
    }

    /// The normalized destination key.
    pub fn dst(&self) -> TokenKey {
        TokenKey::new(self.dst_chain_id, &self.dst_token_hash)
    }

    /// Whether both edges connect the same tokens, ignoring the case of the hashes and the
    /// property.
    pub fn same_edge(&self, other: &TokenMap) -> bool {
        self.src() == other.src() && self.dst() == other.dst()
    }

    /// Whether this edge starts or ends at `key`.
    pub fn touches(&self, key: &TokenKey) -> bool {
        &self.src() == key || &self.dst() == key
    }

    /// Whether this edge connects a chain to itself.
    pub const fn is_self_chain(&self) -> bool {
        self.src_chain_id == self.dst_chain_id
    }

    /// Whether this edge is in use.
    pub fn is_active(&self) -> bool {
        self.property == MapProperty::Active
    }
}
