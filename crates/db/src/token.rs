//! This module defines the [`TokenDb`] trait, which stores token identities and the equivalence
//! graph between them.

use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use crate::errors::DbResult;

/// Interface to token basics, tokens, price markets and token maps.
///
/// Relationships are never loaded lazily: a [`TokenBasic`] returned from this interface always
/// carries all of its tokens and price markets.
#[async_trait]
pub trait TokenDb {
    /// Returns all token basics with their tokens and price markets.
    async fn list_token_basics(&self) -> DbResult<Vec<TokenBasic>>;

    /// Returns one token basic with its tokens and price markets.
    async fn get_token_basic(&self, name: &str) -> DbResult<Option<TokenBasic>>;

    /// Returns all tokens.
    async fn list_tokens(&self) -> DbResult<Vec<Token>>;

    /// Returns one token.
    async fn get_token(&self, key: &TokenKey) -> DbResult<Option<Token>>;

    /// Upserts token basics together with their tokens and price markets.
    ///
    /// The running statistics of an existing basic are preserved, and so is the available amount
    /// of an existing token when the new one does not carry any.
    async fn upsert_token_basics(&self, basics: &[TokenBasic]) -> DbResult<()>;

    /// Hard-deletes a token basic, its tokens and its price markets.
    async fn delete_token_basic(&self, name: &str) -> DbResult<()>;

    /// Returns all token maps, active or not.
    async fn list_token_maps(&self) -> DbResult<Vec<TokenMap>>;

    /// Upserts token maps by their four-part key.
    async fn upsert_token_maps(&self, maps: &[TokenMap]) -> DbResult<()>;

    /// Soft-deletes the token maps matching the given keys. Hash comparison is case-insensitive.
    ///
    /// Returns the number of maps that matched.
    async fn deactivate_token_maps(&self, maps: &[TokenMap]) -> DbResult<u64>;

    /// Sets the available amount of a token, saturating it to the storage width.
    async fn set_available_amount(&self, key: &TokenKey, amount: &Amount) -> DbResult<()>;
}
