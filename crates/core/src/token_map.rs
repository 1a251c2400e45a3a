//! Maintains the equivalence graph between chain-specific tokens.
//!
//! Every [`TokenBasic`] induces a complete directed graph over its tokens on distinct chains.
//! Edges are only ever soft-deleted, since ledger records may still point at them.

use std::{collections::BTreeSet, sync::Arc};

use relay_indexer_db::IndexerDb;
use relay_indexer_primitives::prelude::*;
use tracing::{debug, info, warn};

use crate::errors::{EngineError, EngineResult};

/// Derives the active edges between all tokens of each basic, skipping same-chain pairs.
pub fn derive_maps(basics: &[TokenBasic]) -> Vec<TokenMap> {
    let mut maps = Vec::new();

    for basic in basics {
        for src in &basic.tokens {
            for dst in &basic.tokens {
                if src.chain_id == dst.chain_id {
                    continue;
                }

                maps.push(TokenMap::active(&src.key(), &dst.key()));
            }
        }
    }

    maps
}

/// Adds and removes tokens together with the edges they induce.
#[derive(Debug)]
pub struct TokenMapBuilder<Db> {
    db: Arc<Db>,
}

impl<Db> Clone for TokenMapBuilder<Db> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<Db: IndexerDb> TokenMapBuilder<Db> {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Stores `basics` with their tokens and price markets, then activates the derived edges and
    /// the `explicit` ones.
    ///
    /// Explicit edges that connect a chain to itself are dropped.
    pub async fn add_tokens(
        &self,
        basics: &[TokenBasic],
        explicit: &[TokenMap],
    ) -> EngineResult<()> {
        self.db.upsert_token_basics(basics).await?;

        let mut maps = derive_maps(basics);
        for map in explicit {
            if map.is_self_chain() {
                warn!(chain_id = map.src_chain_id, src = %map.src_token_hash, dst = %map.dst_token_hash, "ignoring same-chain token map");
                continue;
            }

            maps.push(map.clone());
        }

        self.db.upsert_token_maps(&maps).await?;

        info!(basics = basics.len(), maps = maps.len(), "added tokens");

        Ok(())
    }

    /// Removes a token basic.
    ///
    /// Its derived edges and any other edge touching one of its tokens are deactivated, then the
    /// tokens, the price markets and the basic itself are deleted. Returns `false` if no basic is
    /// named `name`.
    pub async fn remove_token(&self, name: &str) -> EngineResult<bool> {
        let Some(basic) = self.db.get_token_basic(name).await? else {
            debug!(%name, "no such token basic");
            return Ok(false);
        };

        let derived = derive_maps(std::slice::from_ref(&basic));
        let mut deactivated = self.db.deactivate_token_maps(&derived).await?;

        let removed: BTreeSet<TokenKey> = basic.token_keys().into_iter().collect();
        let dangling: Vec<TokenMap> = self
            .db
            .list_token_maps()
            .await?
            .into_iter()
            .filter(|map| map.is_active())
            .filter(|map| removed.iter().any(|key| map.touches(key)))
            .collect();
        if !dangling.is_empty() {
            deactivated += self.db.deactivate_token_maps(&dangling).await?;
        }

        self.db.delete_token_basic(name).await?;

        info!(%name, tokens = removed.len(), %deactivated, "removed token");

        Ok(true)
    }

    /// Removes several token basics, stopping at the first failure.
    ///
    /// Returns the names that were actually removed.
    pub async fn remove_tokens(&self, names: &[String]) -> EngineResult<Vec<String>> {
        let mut removed = Vec::with_capacity(names.len());

        for name in names {
            if self.remove_token(name).await? {
                removed.push(name.clone());
            }
        }

        Ok(removed)
    }

    /// Deactivates the given edges. Returns how many of them existed.
    pub async fn remove_token_maps(&self, maps: &[TokenMap]) -> EngineResult<u64> {
        let deactivated = self.db.deactivate_token_maps(maps).await?;

        debug!(requested = maps.len(), %deactivated, "removed token maps");

        Ok(deactivated)
    }

    /// Looks up a token and the basic it belongs to.
    pub async fn resolve_token(&self, key: &TokenKey) -> EngineResult<Option<(Token, TokenBasic)>> {
        let Some(token) = self.db.get_token(key).await? else {
            return Ok(None);
        };

        let basic = self
            .db
            .get_token_basic(&token.token_basic_name)
            .await?
            .ok_or_else(|| EngineError::UnknownTokenBasic(token.token_basic_name.clone()))?;

        Ok(Some((token, basic)))
    }

    /// The active edges leaving `key`.
    pub async fn routes_from(&self, key: &TokenKey) -> EngineResult<Vec<TokenMap>> {
        let key = TokenKey::new(key.chain_id, &key.hash);

        Ok(self
            .db
            .list_token_maps()
            .await?
            .into_iter()
            .filter(|map| map.is_active() && map.src() == key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use relay_indexer_db::{inmemory::prelude::InMemoryDb, token::TokenDb};
    use relay_indexer_test_utils::prelude::*;

    use super::*;

    fn usdt() -> TokenBasic {
        token_basic(
            "USDT",
            6,
            100_000_000,
            &[(2, "0xAAAA"), (6, "0xbbbb"), (7, "0xcccc")],
        )
    }

    fn builder() -> (Arc<InMemoryDb>, TokenMapBuilder<InMemoryDb>) {
        let db = Arc::new(InMemoryDb::new());

        (db.clone(), TokenMapBuilder::new(db))
    }

    proptest! {
        #[test]
        fn derived_maps_form_a_complete_graph(chains in prop::collection::btree_set(1u64..1_000, 1..8)) {
            let tokens: Vec<(ChainId, String)> = chains
                .iter()
                .map(|chain_id| (*chain_id, generate_address()))
                .collect();
            let tokens: Vec<(ChainId, &str)> = tokens
                .iter()
                .map(|(chain_id, hash)| (*chain_id, hash.as_str()))
                .collect();
            let k = tokens.len();

            let maps = derive_maps(&[token_basic("X", 18, 1, &tokens)]);
            let unique: BTreeSet<_> = maps.iter().map(|map| (map.src(), map.dst())).collect();

            prop_assert_eq!(maps.len(), k * (k - 1));
            prop_assert_eq!(unique.len(), maps.len());
            prop_assert!(maps.iter().all(|map| !map.is_self_chain() && map.is_active()));
        }
    }

    #[test]
    fn test_derive_maps_skips_tokens_on_the_same_chain() {
        let basic = token_basic("ETH", 18, 1, &[(2, "0x01"), (2, "0x02"), (6, "0x03")]);

        let maps = derive_maps(&[basic]);
        assert_eq!(maps.len(), 4);
        assert!(maps.iter().all(|map| !map.is_self_chain()));
    }

    #[tokio::test]
    async fn test_add_tokens_drops_self_chain_maps() {
        let (db, builder) = builder();
        let explicit = [
            TokenMap::active(&TokenKey::new(2, "0xaaaa"), &TokenKey::new(2, "0xdddd")),
            TokenMap::active(&TokenKey::new(2, "0xaaaa"), &TokenKey::new(9, "0xdddd")),
        ];

        builder.add_tokens(&[usdt()], &explicit).await.unwrap();

        let maps = db.list_token_maps().await.unwrap();
        assert_eq!(maps.len(), 6 + 1);
        assert!(maps.iter().all(|map| !map.is_self_chain()));
        assert_eq!(
            db.get_token(&TokenKey::new(2, "0xaaaa")).await.unwrap().unwrap().hash,
            "0xaaaa"
        );
    }

    #[tokio::test]
    async fn test_remove_token_soft_deletes_maps_and_hard_deletes_tokens() {
        let (db, builder) = builder();
        let dai = token_basic("DAI", 18, 100_000_000, &[(2, "0xdddd")]);
        let bridge = TokenMap::active(&TokenKey::new(6, "0xBBBB"), &TokenKey::new(2, "0xdddd"));

        builder.add_tokens(&[usdt(), dai], &[bridge]).await.unwrap();
        assert!(builder.remove_token("USDT").await.unwrap());

        let maps = db.list_token_maps().await.unwrap();
        assert_eq!(maps.len(), 7, "edges are never hard-deleted");
        assert!(maps.iter().all(|map| !map.is_active()));

        assert!(db.get_token_basic("USDT").await.unwrap().is_none());
        assert!(db.get_token(&TokenKey::new(6, "0xbbbb")).await.unwrap().is_none());
        assert!(db.snapshot().await.price_markets.keys().all(|(name, _)| name != "USDT"));
        assert!(db.get_token_basic("DAI").await.unwrap().is_some());

        assert!(!builder.remove_token("USDT").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_token_maps_matches_hash_case_insensitively() {
        let (db, builder) = builder();
        builder.add_tokens(&[usdt()], &[]).await.unwrap();
        let tokens = db.list_tokens().await.unwrap();
        let basic = db.get_token_basic("USDT").await.unwrap();

        let edge = TokenMap::active(&TokenKey::new(2, "0xaaaa"), &TokenKey::new(6, "0xbbbb"));
        let shouted = TokenMap {
            src_token_hash: "0xAAAA".to_string(),
            dst_token_hash: "0xBBBB".to_string(),
            ..edge.clone()
        };

        assert_eq!(builder.remove_token_maps(&[shouted]).await.unwrap(), 1);

        let maps = db.list_token_maps().await.unwrap();
        let removed = maps.iter().find(|map| map.same_edge(&edge)).unwrap();
        assert!(!removed.is_active());
        assert_eq!(maps.iter().filter(|map| map.is_active()).count(), 5);

        assert_eq!(db.list_tokens().await.unwrap(), tokens, "tokens are never touched");
        assert_eq!(db.get_token_basic("USDT").await.unwrap(), basic);
    }

    #[tokio::test]
    async fn test_remove_tokens() {
        let (db, builder) = builder();
        let dai = token_basic("DAI", 18, 100_000_000, &[(2, "0xdddd"), (6, "0xeeee")]);
        builder.add_tokens(&[usdt(), dai], &[]).await.unwrap();

        let removed = builder
            .remove_tokens(&["USDT".to_string(), "WBTC".to_string(), "DAI".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, vec!["USDT".to_string(), "DAI".to_string()]);
        assert!(db.list_token_basics().await.unwrap().is_empty());
        assert!(db.list_tokens().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_and_route() {
        let (db, builder) = builder();
        builder.add_tokens(&[usdt()], &[]).await.unwrap();

        let (token, basic) = builder
            .resolve_token(&TokenKey::new(6, "0xBBBB"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.chain_id, 6);
        assert_eq!(basic.name, "USDT");
        assert_eq!(basic.tokens.len(), 3);

        let routes = builder.routes_from(&TokenKey::new(2, "0xAAAA")).await.unwrap();
        let dst: BTreeSet<_> = routes.iter().map(|map| map.dst_chain_id).collect();
        assert_eq!(dst, BTreeSet::from([6, 7]));

        assert!(builder
            .resolve_token(&TokenKey::new(6, "0xffff"))
            .await
            .unwrap()
            .is_none());

        db.delete_token_basic("USDT").await.unwrap();
        db.upsert_token_basics(&[TokenBasic {
            name: "ORPHAN".to_string(),
            tokens: vec![Token {
                token_basic_name: "GONE".to_string(),
                ..usdt().tokens[0].clone()
            }],
            price_markets: Vec::new(),
            ..usdt()
        }])
        .await
        .unwrap();
        assert!(matches!(
            builder.resolve_token(&TokenKey::new(2, "0xaaaa")).await,
            Err(EngineError::UnknownTokenBasic(name)) if name == "GONE"
        ));
    }
}
