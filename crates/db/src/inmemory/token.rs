use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use super::InMemoryDb;
use crate::{errors::DbResult, token::TokenDb};

#[async_trait]
impl TokenDb for InMemoryDb {
    async fn list_token_basics(&self) -> DbResult<Vec<TokenBasic>> {
        let tables = self.tables.read().await;

        Ok(tables
            .token_basics
            .keys()
            .filter_map(|name| tables.token_basic_with_relations(name))
            .collect())
    }

    async fn get_token_basic(&self, name: &str) -> DbResult<Option<TokenBasic>> {
        Ok(self.tables.read().await.token_basic_with_relations(name))
    }

    async fn list_tokens(&self) -> DbResult<Vec<Token>> {
        Ok(self.tables.read().await.tokens.values().cloned().collect())
    }

    async fn get_token(&self, key: &TokenKey) -> DbResult<Option<Token>> {
        let key = TokenKey::new(key.chain_id, &key.hash);

        Ok(self.tables.read().await.tokens.get(&key).cloned())
    }

    async fn upsert_token_basics(&self, basics: &[TokenBasic]) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        for basic in basics {
            let mut row = TokenBasic {
                tokens: Vec::new(),
                price_markets: Vec::new(),
                total_amount: basic.total_amount.clamped(),
                ..basic.clone()
            };
            if let Some(existing) = tables.token_basics.get(&basic.name) {
                row.total_amount = existing.total_amount.clone();
                row.total_count = existing.total_count;
                row.stats_update_time = existing.stats_update_time;
            }
            tables.token_basics.insert(basic.name.clone(), row);

            for token in &basic.tokens {
                let key = token.key();
                let mut row = Token {
                    hash: key.hash.clone(),
                    available_amount: token.available_amount.as_ref().map(Amount::clamped),
                    ..token.clone()
                };
                if row.available_amount.is_none() {
                    row.available_amount = tables
                        .tokens
                        .get(&key)
                        .and_then(|existing| existing.available_amount.clone());
                }
                tables.tokens.insert(key, row);
            }

            for market in &basic.price_markets {
                tables.price_markets.insert(
                    (market.token_basic_name.clone(), market.market_name.clone()),
                    market.clone(),
                );
            }
        }

        Ok(())
    }

    async fn delete_token_basic(&self, name: &str) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        tables.tokens.retain(|_, token| token.token_basic_name != name);
        tables
            .price_markets
            .retain(|(basic_name, _), _| basic_name != name);
        tables.token_basics.remove(name);

        Ok(())
    }

    async fn list_token_maps(&self) -> DbResult<Vec<TokenMap>> {
        Ok(self.tables.read().await.token_maps.values().cloned().collect())
    }

    async fn upsert_token_maps(&self, maps: &[TokenMap]) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        for map in maps {
            let (src, dst) = (map.src(), map.dst());
            let row = TokenMap {
                src_token_hash: src.hash.clone(),
                dst_token_hash: dst.hash.clone(),
                ..map.clone()
            };
            tables.token_maps.insert((src, dst), row);
        }

        Ok(())
    }

    async fn deactivate_token_maps(&self, maps: &[TokenMap]) -> DbResult<u64> {
        let mut tables = self.tables.write().await;
        let mut matched = 0;

        for map in maps {
            if let Some(row) = tables.token_maps.get_mut(&(map.src(), map.dst())) {
                row.property = MapProperty::Inactive;
                matched += 1;
            }
        }

        Ok(matched)
    }

    async fn set_available_amount(&self, key: &TokenKey, amount: &Amount) -> DbResult<()> {
        let key = TokenKey::new(key.chain_id, &key.hash);

        if let Some(token) = self.tables.write().await.tokens.get_mut(&key) {
            token.available_amount = Some(amount.clamped());
        }

        Ok(())
    }
}
