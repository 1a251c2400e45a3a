//! Fixtures for chains and tokens.

use relay_indexer_primitives::prelude::*;

/// Creates a fee policy for `chain_id` denominated in `basic`.
pub fn chain_fee(chain_id: ChainId, basic: &str, min_fee: u64, time: Timestamp) -> ChainFee {
    ChainFee {
        chain_id,
        token_basic_name: basic.to_string(),
        max_fee: Amount::from(min_fee * 10),
        min_fee: Amount::from(min_fee),
        proxy_fee: Amount::from(min_fee),
        ind: 1,
        time,
    }
}

/// Creates a listed token basic with one token per `(chain id, hash)` pair, all sharing the
/// basic's precision.
pub fn token_basic(
    name: &str,
    precision: u64,
    price: i64,
    tokens: &[(ChainId, &str)],
) -> TokenBasic {
    TokenBasic {
        name: name.to_string(),
        precision,
        price,
        ind: 1,
        time: 0,
        property: 1,
        total_amount: Amount::zero(),
        total_count: 0,
        stats_update_time: 0,
        tokens: tokens
            .iter()
            .map(|(chain_id, hash)| Token {
                hash: hash.to_string(),
                chain_id: *chain_id,
                name: name.to_string(),
                precision,
                token_basic_name: name.to_string(),
                property: 1,
                available_amount: None,
            })
            .collect(),
        price_markets: vec![PriceMarket {
            token_basic_name: name.to_string(),
            market_name: "coinmarketcap".to_string(),
            name: name.to_string(),
            price,
            ind: 1,
            time: 0,
        }],
    }
}
