//! SQLite implementation of the persistent storage layer.

use std::{collections::BTreeMap, str::FromStr};

use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};
use tracing::{debug, info};

use super::{
    config::DbConfig,
    errors::StorageError,
    models,
    types::{inclusive_range, DbAmount, DbMapProperty, DbTokenHash, DbU64, DbWrapperStatus},
};
use crate::{
    chain::ChainDb,
    errors::{BatchStage, DbError, DbResult},
    ledger::{InvalidatedHashes, LedgerDb, MergeBatch, WrapperMergePolicy},
    stats::{StatsDb, StatsTotals, TransferAggregate},
    token::TokenDb,
};

#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating it if needed) the database at `url` and brings its schema up to date.
    pub async fn connect(url: &str, config: &DbConfig) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StorageError::from)?
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections())
            .connect_with(options)
            .await
            .map_err(StorageError::from)?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(StorageError::from)?;

        info!(%url, "connected to the database");

        Ok(Self::new(pool))
    }
}

async fn write_wrappers(
    conn: &mut SqliteConnection,
    wrappers: &[WrapperTransaction],
    policy: WrapperMergePolicy,
) -> DbResult<()> {
    for wrapper in wrappers {
        let query = match policy {
            WrapperMergePolicy::Upsert => {
                "INSERT OR REPLACE INTO wrapper_transactions
                    (hash, user_address, src_chain_id, block_height, time, dst_chain_id,
                     dst_user, server_id, fee_token_hash, fee_amount, status)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            }
            WrapperMergePolicy::ForceUnconfirmed => {
                "UPDATE wrapper_transactions
                    SET user_address = $2, src_chain_id = $3, block_height = $4, time = $5,
                        dst_chain_id = $6, dst_user = $7, server_id = $8, fee_token_hash = $9,
                        fee_amount = $10, status = $11
                    WHERE hash = $1"
            }
        };

        let status = match policy {
            WrapperMergePolicy::Upsert => wrapper.status,
            WrapperMergePolicy::ForceUnconfirmed => WrapperStatus::Unconfirmed,
        };

        sqlx::query(query)
            .bind(&wrapper.hash)
            .bind(&wrapper.user)
            .bind(DbU64::from(wrapper.src_chain_id))
            .bind(DbU64::from(wrapper.block_height))
            .bind(DbU64::from(wrapper.time))
            .bind(DbU64::from(wrapper.dst_chain_id))
            .bind(&wrapper.dst_user)
            .bind(DbU64::from(wrapper.server_id))
            .bind(&wrapper.fee_token_hash)
            .bind(DbAmount::from(&wrapper.fee_amount))
            .bind(DbWrapperStatus::from(status))
            .execute(&mut *conn)
            .await
            .map_err(StorageError::from)?;
    }

    Ok(())
}

async fn write_src_legs(conn: &mut SqliteConnection, legs: &[SrcTransaction]) -> DbResult<()> {
    for leg in legs {
        sqlx::query("DELETE FROM src_transfers WHERE tx_hash = $1")
            .bind(&leg.hash)
            .execute(&mut *conn)
            .await
            .map_err(StorageError::from)?;

        if let Some(transfer) = &leg.transfer {
            sqlx::query(
                "INSERT OR REPLACE INTO src_transfers
                    (tx_hash, chain_id, time, asset, from_address, to_address, amount,
                     dst_chain_id, dst_asset, dst_user)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(&transfer.tx_hash)
            .bind(DbU64::from(transfer.chain_id))
            .bind(DbU64::from(transfer.time))
            .bind(&transfer.asset)
            .bind(&transfer.from)
            .bind(&transfer.to)
            .bind(DbAmount::from(&transfer.amount))
            .bind(DbU64::from(transfer.dst_chain_id))
            .bind(&transfer.dst_asset)
            .bind(&transfer.dst_user)
            .execute(&mut *conn)
            .await
            .map_err(StorageError::from)?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO src_transactions
                (hash, wrapper_hash, chain_id, state, time, fee, height, user_address,
                 dst_chain_id, contract, tx_key, param)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&leg.hash)
        .bind(&leg.wrapper_hash)
        .bind(DbU64::from(leg.chain_id))
        .bind(DbU64::from(leg.state))
        .bind(DbU64::from(leg.time))
        .bind(DbAmount::from(&leg.fee))
        .bind(DbU64::from(leg.height))
        .bind(&leg.user)
        .bind(DbU64::from(leg.dst_chain_id))
        .bind(&leg.contract)
        .bind(&leg.key)
        .bind(&leg.param)
        .execute(&mut *conn)
        .await
        .map_err(StorageError::from)?;
    }

    Ok(())
}

async fn write_poly_legs(conn: &mut SqliteConnection, legs: &[PolyTransaction]) -> DbResult<()> {
    for leg in legs {
        sqlx::query(
            "INSERT OR REPLACE INTO poly_transactions
                (hash, wrapper_hash, chain_id, state, time, fee, height, src_chain_id, src_hash,
                 dst_chain_id, tx_key)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&leg.hash)
        .bind(&leg.wrapper_hash)
        .bind(DbU64::from(leg.chain_id))
        .bind(DbU64::from(leg.state))
        .bind(DbU64::from(leg.time))
        .bind(DbAmount::from(&leg.fee))
        .bind(DbU64::from(leg.height))
        .bind(DbU64::from(leg.src_chain_id))
        .bind(&leg.src_hash)
        .bind(DbU64::from(leg.dst_chain_id))
        .bind(&leg.key)
        .execute(&mut *conn)
        .await
        .map_err(StorageError::from)?;
    }

    Ok(())
}

async fn write_dst_legs(conn: &mut SqliteConnection, legs: &[DstTransaction]) -> DbResult<()> {
    for leg in legs {
        sqlx::query("DELETE FROM dst_transfers WHERE tx_hash = $1")
            .bind(&leg.hash)
            .execute(&mut *conn)
            .await
            .map_err(StorageError::from)?;

        if let Some(transfer) = &leg.transfer {
            sqlx::query(
                "INSERT OR REPLACE INTO dst_transfers
                    (tx_hash, chain_id, time, asset, from_address, to_address, amount)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&transfer.tx_hash)
            .bind(DbU64::from(transfer.chain_id))
            .bind(DbU64::from(transfer.time))
            .bind(&transfer.asset)
            .bind(&transfer.from)
            .bind(&transfer.to)
            .bind(DbAmount::from(&transfer.amount))
            .execute(&mut *conn)
            .await
            .map_err(StorageError::from)?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO dst_transactions
                (hash, wrapper_hash, chain_id, state, time, fee, height, src_chain_id, contract,
                 poly_hash)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&leg.hash)
        .bind(&leg.wrapper_hash)
        .bind(DbU64::from(leg.chain_id))
        .bind(DbU64::from(leg.state))
        .bind(DbU64::from(leg.time))
        .bind(DbAmount::from(&leg.fee))
        .bind(DbU64::from(leg.height))
        .bind(DbU64::from(leg.src_chain_id))
        .bind(&leg.contract)
        .bind(&leg.poly_hash)
        .execute(&mut *conn)
        .await
        .map_err(StorageError::from)?;
    }

    Ok(())
}

async fn write_chain(conn: &mut SqliteConnection, chain: &Chain) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE chains
            SET height = $2,
                name = COALESCE(NULLIF($3, ''), name),
                height_swap = COALESCE(NULLIF($4, 0), height_swap)
            WHERE chain_id = $1",
    )
    .bind(DbU64::from(chain.chain_id))
    .bind(DbU64::from(chain.height))
    .bind(&chain.name)
    .bind(DbU64::from(chain.height_swap))
    .execute(&mut *conn)
    .await
    .map_err(StorageError::from)?;

    if result.rows_affected() == 0 {
        return Err(DbError::NoRowsUpdated(format!("chain {}", chain.chain_id)));
    }

    Ok(())
}

#[async_trait]
impl LedgerDb for SqliteDb {
    async fn merge_batch(&self, batch: MergeBatch) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        if !batch.wrappers.is_empty() {
            write_wrappers(&mut *tx, &batch.wrappers, batch.wrapper_policy)
                .await
                .map_err(|e| DbError::partial(BatchStage::Wrappers, e))?;
        }

        if !batch.src.is_empty() {
            write_src_legs(&mut *tx, &batch.src)
                .await
                .map_err(|e| DbError::partial(BatchStage::SrcTransactions, e))?;
        }

        if !batch.poly.is_empty() {
            write_poly_legs(&mut *tx, &batch.poly)
                .await
                .map_err(|e| DbError::partial(BatchStage::PolyTransactions, e))?;
        }

        if !batch.dst.is_empty() {
            write_dst_legs(&mut *tx, &batch.dst)
                .await
                .map_err(|e| DbError::partial(BatchStage::DstTransactions, e))?;
        }

        if let Some(chain) = &batch.chain {
            write_chain(&mut *tx, chain)
                .await
                .map_err(|e| DbError::partial(BatchStage::Chain, e))?;
        }

        tx.commit().await.map_err(StorageError::from)?;

        debug!(
            chain = ?batch.chain.as_ref().map(|c| (c.chain_id, c.height)),
            wrappers = batch.wrappers.len(),
            src = batch.src.len(),
            poly = batch.poly.len(),
            dst = batch.dst.len(),
            "merged batch"
        );

        Ok(())
    }

    async fn delete_by_hashes(&self, hashes: &InvalidatedHashes) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for hash in &hashes.src {
            sqlx::query("DELETE FROM src_transfers WHERE tx_hash = $1")
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }
        for hash in &hashes.dst {
            sqlx::query("DELETE FROM dst_transfers WHERE tx_hash = $1")
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }

        for hash in &hashes.src {
            sqlx::query("DELETE FROM src_transactions WHERE hash = $1")
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }
        for hash in &hashes.poly {
            sqlx::query("DELETE FROM poly_transactions WHERE hash = $1")
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }
        for hash in &hashes.dst {
            sqlx::query("DELETE FROM dst_transactions WHERE hash = $1")
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }

        for hash in &hashes.src {
            sqlx::query("DELETE FROM wrapper_transactions WHERE hash = $1")
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }

    async fn get_wrapper(&self, hash: &str) -> DbResult<Option<WrapperTransaction>> {
        let wrapper = sqlx::query_as::<_, models::WrapperRow>(
            "SELECT hash, user_address, src_chain_id, block_height, time, dst_chain_id, dst_user,
                server_id, fee_token_hash, fee_amount, status
                FROM wrapper_transactions
                WHERE hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(wrapper)
    }

    async fn get_src_transaction(&self, hash: &str) -> DbResult<Option<SrcTransaction>> {
        let Some(row) = sqlx::query_as::<_, models::SrcTransactionRow>(
            "SELECT hash, wrapper_hash, chain_id, state, time, fee, height, user_address,
                dst_chain_id, contract, tx_key, param
                FROM src_transactions
                WHERE hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        else {
            return Ok(None);
        };

        let transfer = sqlx::query_as::<_, models::SrcTransferRow>(
            "SELECT tx_hash, chain_id, time, asset, from_address, to_address, amount,
                dst_chain_id, dst_asset, dst_user
                FROM src_transfers
                WHERE tx_hash = $1
                LIMIT 1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(Some(row.into_leg(transfer)))
    }

    async fn get_poly_transaction(&self, hash: &str) -> DbResult<Option<PolyTransaction>> {
        let leg = sqlx::query_as::<_, models::PolyTransactionRow>(
            "SELECT hash, wrapper_hash, chain_id, state, time, fee, height, src_chain_id,
                src_hash, dst_chain_id, tx_key
                FROM poly_transactions
                WHERE hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(leg)
    }

    async fn get_dst_transaction(&self, hash: &str) -> DbResult<Option<DstTransaction>> {
        let Some(row) = sqlx::query_as::<_, models::DstTransactionRow>(
            "SELECT hash, wrapper_hash, chain_id, state, time, fee, height, src_chain_id,
                contract, poly_hash
                FROM dst_transactions
                WHERE hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        else {
            return Ok(None);
        };

        let transfer = sqlx::query_as::<_, models::DstTransferRow>(
            "SELECT tx_hash, chain_id, time, asset, from_address, to_address, amount
                FROM dst_transfers
                WHERE tx_hash = $1
                LIMIT 1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(Some(row.into_leg(transfer)))
    }

    async fn list_wrappers_by_status(
        &self,
        status: WrapperStatus,
        limit: usize,
    ) -> DbResult<Vec<WrapperTransaction>> {
        let wrappers = sqlx::query_as::<_, models::WrapperRow>(
            "SELECT hash, user_address, src_chain_id, block_height, time, dst_chain_id, dst_user,
                server_id, fee_token_hash, fee_amount, status
                FROM wrapper_transactions
                WHERE status = $1
                ORDER BY time, hash
                LIMIT $2",
        )
        .bind(DbWrapperStatus::from(status))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(wrappers)
    }
}

#[async_trait]
impl ChainDb for SqliteDb {
    async fn get_chain(&self, chain_id: ChainId) -> DbResult<Option<Chain>> {
        let chain = sqlx::query_as::<_, models::ChainRow>(
            "SELECT chain_id, name, height, height_swap FROM chains WHERE chain_id = $1",
        )
        .bind(DbU64::from(chain_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(chain)
    }

    async fn update_chain(&self, chain: &Chain) -> DbResult<()> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;

        write_chain(&mut *conn, chain).await
    }

    async fn add_chains(&self, chains: &[Chain], fees: &[ChainFee]) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for chain in chains {
            sqlx::query(
                "INSERT OR IGNORE INTO chains (chain_id, name, height, height_swap)
                    VALUES ($1, $2, $3, $4)",
            )
            .bind(DbU64::from(chain.chain_id))
            .bind(&chain.name)
            .bind(DbU64::from(chain.height))
            .bind(DbU64::from(chain.height_swap))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        }

        for fee in fees {
            sqlx::query(
                "INSERT OR IGNORE INTO chain_fees
                    (chain_id, token_basic_name, max_fee, min_fee, proxy_fee, ind, time)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(DbU64::from(fee.chain_id))
            .bind(&fee.token_basic_name)
            .bind(DbAmount::from(&fee.max_fee))
            .bind(DbAmount::from(&fee.min_fee))
            .bind(DbAmount::from(&fee.proxy_fee))
            .bind(DbU64::from(fee.ind))
            .bind(DbU64::from(fee.time))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }

    async fn get_chain_fee(&self, chain_id: ChainId) -> DbResult<Option<ChainFee>> {
        let fee = sqlx::query_as::<_, models::ChainFeeRow>(
            "SELECT chain_id, token_basic_name, max_fee, min_fee, proxy_fee, ind, time
                FROM chain_fees
                WHERE chain_id = $1",
        )
        .bind(DbU64::from(chain_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(fee)
    }

    async fn set_chain_fee(&self, fee: &ChainFee) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT INTO chain_fees
                (chain_id, token_basic_name, max_fee, min_fee, proxy_fee, ind, time)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (chain_id) DO UPDATE SET
                    token_basic_name = excluded.token_basic_name,
                    max_fee = excluded.max_fee,
                    min_fee = excluded.min_fee,
                    proxy_fee = excluded.proxy_fee,
                    ind = excluded.ind,
                    time = excluded.time
                WHERE excluded.time >= chain_fees.time",
        )
        .bind(DbU64::from(fee.chain_id))
        .bind(&fee.token_basic_name)
        .bind(DbAmount::from(&fee.max_fee))
        .bind(DbAmount::from(&fee.min_fee))
        .bind(DbAmount::from(&fee.proxy_fee))
        .bind(DbU64::from(fee.ind))
        .bind(DbU64::from(fee.time))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

impl SqliteDb {
    async fn fetch_tokens(&self, basic_name: Option<&str>) -> DbResult<Vec<Token>> {
        let query = match basic_name {
            Some(_) => {
                "SELECT hash, chain_id, name, precision, token_basic_name, property,
                    available_amount
                    FROM tokens
                    WHERE token_basic_name = $1
                    ORDER BY chain_id, hash"
            }
            None => {
                "SELECT hash, chain_id, name, precision, token_basic_name, property,
                    available_amount
                    FROM tokens
                    ORDER BY chain_id, hash"
            }
        };

        let mut query = sqlx::query_as::<_, models::TokenRow>(query);
        if let Some(name) = basic_name {
            query = query.bind(name);
        }

        let tokens = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(tokens)
    }

    async fn fetch_price_markets(&self, basic_name: Option<&str>) -> DbResult<Vec<PriceMarket>> {
        let query = match basic_name {
            Some(_) => {
                "SELECT token_basic_name, market_name, name, price, ind, time
                    FROM price_markets
                    WHERE token_basic_name = $1
                    ORDER BY market_name"
            }
            None => {
                "SELECT token_basic_name, market_name, name, price, ind, time
                    FROM price_markets
                    ORDER BY token_basic_name, market_name"
            }
        };

        let mut query = sqlx::query_as::<_, models::PriceMarketRow>(query);
        if let Some(name) = basic_name {
            query = query.bind(name);
        }

        let markets = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(markets)
    }
}

#[async_trait]
impl TokenDb for SqliteDb {
    async fn list_token_basics(&self) -> DbResult<Vec<TokenBasic>> {
        let rows = sqlx::query_as::<_, models::TokenBasicRow>(
            "SELECT name, precision, price, ind, time, property, total_amount, total_count,
                stats_update_time
                FROM token_basics
                ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        let mut tokens: BTreeMap<String, Vec<Token>> = BTreeMap::new();
        for token in self.fetch_tokens(None).await? {
            tokens
                .entry(token.token_basic_name.clone())
                .or_default()
                .push(token);
        }

        let mut markets: BTreeMap<String, Vec<PriceMarket>> = BTreeMap::new();
        for market in self.fetch_price_markets(None).await? {
            markets
                .entry(market.token_basic_name.clone())
                .or_default()
                .push(market);
        }

        let basics = rows
            .into_iter()
            .map(|row| {
                let basic_tokens = tokens.remove(&row.name).unwrap_or_default();
                let basic_markets = markets.remove(&row.name).unwrap_or_default();

                row.into_basic(basic_tokens, basic_markets)
            })
            .collect();

        Ok(basics)
    }

    async fn get_token_basic(&self, name: &str) -> DbResult<Option<TokenBasic>> {
        let Some(row) = sqlx::query_as::<_, models::TokenBasicRow>(
            "SELECT name, precision, price, ind, time, property, total_amount, total_count,
                stats_update_time
                FROM token_basics
                WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        else {
            return Ok(None);
        };

        let tokens = self.fetch_tokens(Some(name)).await?;
        let markets = self.fetch_price_markets(Some(name)).await?;

        Ok(Some(row.into_basic(tokens, markets)))
    }

    async fn list_tokens(&self) -> DbResult<Vec<Token>> {
        self.fetch_tokens(None).await
    }

    async fn get_token(&self, key: &TokenKey) -> DbResult<Option<Token>> {
        let token = sqlx::query_as::<_, models::TokenRow>(
            "SELECT hash, chain_id, name, precision, token_basic_name, property, available_amount
                FROM tokens
                WHERE hash = $1 AND chain_id = $2",
        )
        .bind(DbTokenHash::from(key.hash.as_str()))
        .bind(DbU64::from(key.chain_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?
        .map(Into::into);

        Ok(token)
    }

    async fn upsert_token_basics(&self, basics: &[TokenBasic]) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for basic in basics {
            sqlx::query(
                "INSERT INTO token_basics
                    (name, precision, price, ind, time, property, total_amount, total_count,
                     stats_update_time)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ON CONFLICT (name) DO UPDATE SET
                        precision = excluded.precision,
                        price = excluded.price,
                        ind = excluded.ind,
                        time = excluded.time,
                        property = excluded.property",
            )
            .bind(&basic.name)
            .bind(DbU64::from(basic.precision))
            .bind(basic.price)
            .bind(DbU64::from(basic.ind))
            .bind(DbU64::from(basic.time))
            .bind(basic.property)
            .bind(DbAmount::from(&basic.total_amount))
            .bind(DbU64::from(basic.total_count))
            .bind(DbU64::from(basic.stats_update_time))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;

            for token in &basic.tokens {
                sqlx::query(
                    "INSERT INTO tokens
                        (hash, chain_id, name, precision, token_basic_name, property,
                         available_amount)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        ON CONFLICT (hash, chain_id) DO UPDATE SET
                            name = excluded.name,
                            precision = excluded.precision,
                            token_basic_name = excluded.token_basic_name,
                            property = excluded.property,
                            available_amount =
                                COALESCE(excluded.available_amount, tokens.available_amount)",
                )
                .bind(DbTokenHash::from(token.hash.as_str()))
                .bind(DbU64::from(token.chain_id))
                .bind(&token.name)
                .bind(DbU64::from(token.precision))
                .bind(&token.token_basic_name)
                .bind(token.property)
                .bind(token.available_amount.as_ref().map(DbAmount::from))
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            }

            for market in &basic.price_markets {
                sqlx::query(
                    "INSERT OR REPLACE INTO price_markets
                        (token_basic_name, market_name, name, price, ind, time)
                        VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&market.token_basic_name)
                .bind(&market.market_name)
                .bind(&market.name)
                .bind(market.price)
                .bind(DbU64::from(market.ind))
                .bind(DbU64::from(market.time))
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            }
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }

    async fn delete_token_basic(&self, name: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for query in [
            "DELETE FROM tokens WHERE token_basic_name = $1",
            "DELETE FROM price_markets WHERE token_basic_name = $1",
            "DELETE FROM token_basics WHERE name = $1",
        ] {
            sqlx::query(query)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }

    async fn list_token_maps(&self) -> DbResult<Vec<TokenMap>> {
        let maps = sqlx::query_as::<_, models::TokenMapRow>(
            "SELECT src_chain_id, src_token_hash, dst_chain_id, dst_token_hash, property
                FROM token_maps
                ORDER BY src_chain_id, src_token_hash, dst_chain_id, dst_token_hash",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(maps)
    }

    async fn upsert_token_maps(&self, maps: &[TokenMap]) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for map in maps {
            sqlx::query(
                "INSERT OR REPLACE INTO token_maps
                    (src_chain_id, src_token_hash, dst_chain_id, dst_token_hash, property)
                    VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(DbU64::from(map.src_chain_id))
            .bind(DbTokenHash::from(map.src_token_hash.as_str()))
            .bind(DbU64::from(map.dst_chain_id))
            .bind(DbTokenHash::from(map.dst_token_hash.as_str()))
            .bind(DbMapProperty::from(map.property))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }

    async fn deactivate_token_maps(&self, maps: &[TokenMap]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let mut matched = 0;

        for map in maps {
            let result = sqlx::query(
                "UPDATE token_maps SET property = $5
                    WHERE src_chain_id = $1 AND src_token_hash = $2
                        AND dst_chain_id = $3 AND dst_token_hash = $4",
            )
            .bind(DbU64::from(map.src_chain_id))
            .bind(DbTokenHash::from(map.src_token_hash.as_str()))
            .bind(DbU64::from(map.dst_chain_id))
            .bind(DbTokenHash::from(map.dst_token_hash.as_str()))
            .bind(DbMapProperty::from(MapProperty::Inactive))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;

            matched += result.rows_affected();
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(matched)
    }

    async fn set_available_amount(&self, key: &TokenKey, amount: &Amount) -> DbResult<()> {
        sqlx::query("UPDATE tokens SET available_amount = $3 WHERE hash = $1 AND chain_id = $2")
            .bind(DbTokenHash::from(key.hash.as_str()))
            .bind(DbU64::from(key.chain_id))
            .bind(DbAmount::from(amount))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}

#[async_trait]
impl StatsDb for SqliteDb {
    async fn last_src_transfer(&self, assets: &[TokenKey]) -> DbResult<Option<SrcTransfer>> {
        let mut last: Option<SrcTransfer> = None;

        for asset in assets {
            let transfer = sqlx::query_as::<_, models::SrcTransferRow>(
                "SELECT tx_hash, chain_id, time, asset, from_address, to_address, amount,
                    dst_chain_id, dst_asset, dst_user
                    FROM src_transfers
                    WHERE chain_id = $1 AND lower(asset) = $2
                    ORDER BY time DESC
                    LIMIT 1",
            )
            .bind(DbU64::from(asset.chain_id))
            .bind(DbTokenHash::from(asset.hash.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?
            .map(SrcTransfer::from);

            if let Some(transfer) = transfer {
                if last.as_ref().map_or(true, |last| transfer.time > last.time) {
                    last = Some(transfer);
                }
            }
        }

        Ok(last)
    }

    async fn aggregate_src_transfers(
        &self,
        assets: &[TokenKey],
        min: Timestamp,
        max: Timestamp,
    ) -> DbResult<TransferAggregate> {
        let mut aggregate = TransferAggregate::default();
        let Some((first, last)) = inclusive_range(min, max) else {
            return Ok(aggregate);
        };

        // amounts are summed here rather than with SUM() which would go through floats
        for asset in assets {
            let amounts: Vec<DbAmount> = sqlx::query_scalar(
                "SELECT amount FROM src_transfers
                    WHERE chain_id = $1 AND lower(asset) = $2 AND time BETWEEN $3 AND $4",
            )
            .bind(DbU64::from(asset.chain_id))
            .bind(DbTokenHash::from(asset.hash.as_str()))
            .bind(first)
            .bind(last)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

            aggregate.count += amounts.len() as u64;
            for amount in &amounts {
                aggregate.amount += &**amount;
            }
        }

        Ok(aggregate)
    }

    async fn commit_stats_if_checkpoint_matches(
        &self,
        name: &str,
        expected: Timestamp,
        totals: &StatsTotals,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE token_basics
                SET total_amount = $1, total_count = $2, stats_update_time = $3
                WHERE name = $4 AND stats_update_time = $5",
        )
        .bind(DbAmount::from(&totals.total_amount))
        .bind(DbU64::from(totals.total_count))
        .bind(DbU64::from(totals.stats_update_time))
        .bind(name)
        .bind(DbU64::from(expected))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }

    async fn src_transfer_routes(
        &self,
        min: Timestamp,
        max: Timestamp,
    ) -> DbResult<Vec<(ChainId, ChainId)>> {
        let Some((first, last)) = inclusive_range(min, max) else {
            return Ok(Vec::new());
        };

        let routes = sqlx::query_as::<_, models::RouteRow>(
            "SELECT DISTINCT chain_id, dst_chain_id FROM src_transfers
                WHERE time BETWEEN $1 AND $2
                ORDER BY chain_id, dst_chain_id",
        )
        .bind(first)
        .bind(last)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?
        .into_iter()
        .map(|route| (*route.chain_id, *route.dst_chain_id))
        .collect();

        Ok(routes)
    }

    async fn has_time_statistic(&self, stat: &TimeStatistic) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM time_statistics
                WHERE src_chain_id = $1 AND dst_chain_id = $2 AND time = $3",
        )
        .bind(DbU64::from(stat.src_chain_id))
        .bind(DbU64::from(stat.dst_chain_id))
        .bind(DbU64::from(stat.time))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(found.is_some())
    }

    async fn insert_time_statistics(&self, stats: &[TimeStatistic]) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for stat in stats {
            sqlx::query(
                "INSERT OR IGNORE INTO time_statistics (src_chain_id, dst_chain_id, time)
                    VALUES ($1, $2, $3)",
            )
            .bind(DbU64::from(stat.src_chain_id))
            .bind(DbU64::from(stat.dst_chain_id))
            .bind(DbU64::from(stat.time))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        }

        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use relay_indexer_test_utils::prelude::*;

    use super::*;

    const SRC_CHAIN: ChainId = 2;
    const DST_CHAIN: ChainId = 6;
    const RELAY_CHAIN: ChainId = 0;

    fn batch_of(transfer: &TransferFixture, chain: Option<Chain>) -> MergeBatch {
        MergeBatch {
            chain,
            wrappers: vec![transfer.wrapper.clone()],
            src: vec![transfer.src.clone()],
            poly: vec![transfer.poly.clone()],
            dst: vec![transfer.dst.clone()],
            ..Default::default()
        }
    }

    fn usdt_transfer(height: BlockHeight, time: Timestamp, amount: u64) -> TransferFixture {
        generate_transfer(
            &TokenKey::new(SRC_CHAIN, "0xAAaa"),
            &TokenKey::new(DST_CHAIN, "0xbbbb"),
            RELAY_CHAIN,
            height,
            time,
            Amount::from(amount),
        )
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_ledger_db(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        db.add_chains(&[Chain::new(SRC_CHAIN, "ethereum", 99)], &[])
            .await
            .expect("must be able to add chains");

        let transfer = usdt_transfer(100, 1_000, 5);
        let chain = Chain {
            chain_id: SRC_CHAIN,
            name: String::new(),
            height: 100,
            height_swap: 0,
        };
        let batch = batch_of(&transfer, Some(chain));

        db.merge_batch(batch.clone())
            .await
            .expect("must be able to merge batch");
        db.merge_batch(batch)
            .await
            .expect("merging the same batch again must succeed");

        let stored = db
            .get_chain(SRC_CHAIN)
            .await
            .expect("must be able to get chain")
            .expect("chain must exist");
        assert_eq!(stored.height, 100);
        assert_eq!(stored.name, "ethereum", "empty names must not overwrite");
        assert_eq!(stored.height_swap, 99, "zero swap heights must not overwrite");

        assert_eq!(
            db.get_wrapper(&transfer.wrapper.hash).await.unwrap(),
            Some(transfer.wrapper.clone())
        );
        assert_eq!(
            db.get_src_transaction(&transfer.src.hash).await.unwrap(),
            Some(transfer.src.clone())
        );
        assert_eq!(
            db.get_poly_transaction(&transfer.poly.hash).await.unwrap(),
            Some(transfer.poly.clone())
        );
        assert_eq!(
            db.get_dst_transaction(&transfer.dst.hash).await.unwrap(),
            Some(transfer.dst.clone())
        );

        let pending = db
            .list_wrappers_by_status(WrapperStatus::Pending, 10)
            .await
            .expect("must be able to list wrappers");
        assert_eq!(pending, vec![transfer.wrapper.clone()]);

        db.delete_by_hashes(&InvalidatedHashes {
            src: vec![transfer.src.hash.clone()],
            poly: vec![transfer.poly.hash.clone()],
            dst: vec![transfer.dst.hash.clone()],
        })
        .await
        .expect("must be able to delete by hashes");

        assert!(db.get_wrapper(&transfer.wrapper.hash).await.unwrap().is_none());
        assert!(db.get_src_transaction(&transfer.src.hash).await.unwrap().is_none());
        assert!(db.get_poly_transaction(&transfer.poly.hash).await.unwrap().is_none());
        assert!(db.get_dst_transaction(&transfer.dst.hash).await.unwrap().is_none());

        let routes = db.src_transfer_routes(0, u64::MAX).await.unwrap();
        assert!(routes.is_empty(), "transfers must be removed with their legs");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_merge_into_unknown_chain_rolls_back(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        let transfer = usdt_transfer(100, 1_000, 5);

        let err = db
            .merge_batch(batch_of(&transfer, Some(Chain::new(SRC_CHAIN, "ethereum", 100))))
            .await
            .expect_err("merging into an unknown chain must fail");

        assert!(
            matches!(
                err,
                DbError::PartialBatch {
                    stage: BatchStage::Chain,
                    ..
                }
            ),
            "unexpected error: {err:?}"
        );
        assert!(
            db.get_wrapper(&transfer.wrapper.hash).await.unwrap().is_none(),
            "earlier stages must be rolled back"
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_backup_merge_only_touches_existing_wrappers(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        let known = usdt_transfer(100, 1_000, 5);
        let unknown = usdt_transfer(101, 1_010, 5);

        db.merge_batch(MergeBatch {
            wrappers: vec![known.wrapper.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

        db.merge_batch(MergeBatch {
            wrapper_policy: WrapperMergePolicy::ForceUnconfirmed,
            wrappers: vec![known.wrapper.clone(), unknown.wrapper.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

        let stored = db.get_wrapper(&known.wrapper.hash).await.unwrap().unwrap();
        assert_eq!(stored.status, WrapperStatus::Unconfirmed);
        assert!(db.get_wrapper(&unknown.wrapper.hash).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_oversized_amounts_are_saturated(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        let huge: Amount = "1".repeat(70).parse().unwrap();

        let mut transfer = usdt_transfer(100, 1_000, 0);
        transfer.wrapper.fee_amount = huge.clone();
        db.merge_batch(MergeBatch {
            wrappers: vec![transfer.wrapper.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

        let stored = db.get_wrapper(&transfer.wrapper.hash).await.unwrap().unwrap();
        assert_eq!(stored.fee_amount, Amount::storage_max());
        assert_eq!(stored.fee_amount.to_plain_string(), "9".repeat(64));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_chain_db(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        let fee = chain_fee(DST_CHAIN, "USDT", 3, 500);

        db.add_chains(&[Chain::new(DST_CHAIN, "bsc", 10)], &[fee.clone()])
            .await
            .unwrap();
        db.add_chains(&[Chain::new(DST_CHAIN, "other", 20)], &[])
            .await
            .unwrap();
        assert_eq!(
            db.get_chain(DST_CHAIN).await.unwrap(),
            Some(Chain::new(DST_CHAIN, "bsc", 10)),
            "existing chains must be left as they are"
        );

        let stale = ChainFee {
            time: 400,
            ..chain_fee(DST_CHAIN, "USDT", 7, 0)
        };
        assert!(!db.set_chain_fee(&stale).await.unwrap());
        assert_eq!(db.get_chain_fee(DST_CHAIN).await.unwrap(), Some(fee));

        let fresh = chain_fee(DST_CHAIN, "USDT", 7, 600);
        assert!(db.set_chain_fee(&fresh).await.unwrap());
        assert_eq!(db.get_chain_fee(DST_CHAIN).await.unwrap(), Some(fresh));

        let err = db
            .update_chain(&Chain::new(42, "missing", 1))
            .await
            .expect_err("updating an unknown chain must fail");
        assert!(matches!(err, DbError::NoRowsUpdated(_)));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_unsigned_columns_reject_out_of_range_values(pool: SqlitePool) {
        let db = SqliteDb::new(pool.clone());

        let too_high = Chain::new(DST_CHAIN, "bsc", i64::MAX as u64 + 1);
        assert!(
            db.add_chains(&[too_high], &[]).await.is_err(),
            "values above i64::MAX must not be stored"
        );
        assert!(db.get_chain(DST_CHAIN).await.unwrap().is_none());

        sqlx::query("INSERT INTO chains (chain_id, name, height, height_swap) VALUES (7, 'x', -1, 0)")
            .execute(&pool)
            .await
            .unwrap();

        let err = db.get_chain(7).await.expect_err("negative heights must not decode");
        let source = match err {
            DbError::Storage(StorageError::Driver(sqlx::Error::ColumnDecode { source, .. })) => source,
            other => panic!("unexpected error: {other}"),
        };
        assert!(matches!(
            source.downcast_ref::<StorageError>(),
            Some(StorageError::MismatchedTypes(_))
        ));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_token_db(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        let basic = token_basic(
            "USDT",
            6,
            100_000_000,
            &[(SRC_CHAIN, "0xAAAA"), (DST_CHAIN, "0xbbbb")],
        );

        db.upsert_token_basics(&[basic.clone()]).await.unwrap();

        let stored = db.get_token_basic("USDT").await.unwrap().unwrap();
        assert_eq!(stored.tokens.len(), 2);
        assert_eq!(stored.price_markets.len(), 1);
        assert!(
            stored.tokens.iter().any(|t| t.hash == "0xaaaa"),
            "hashes must be stored lower-cased"
        );

        let key = TokenKey::new(SRC_CHAIN, "0xAaAa");
        db.set_available_amount(&key, &Amount::from(77u64)).await.unwrap();
        assert!(db
            .commit_stats_if_checkpoint_matches(
                "USDT",
                0,
                &StatsTotals {
                    total_amount: Amount::from(10u64),
                    total_count: 1,
                    stats_update_time: 50,
                },
            )
            .await
            .is_ok_and(|rows| rows == 1));

        // re-registering must not reset running statistics or available amounts
        db.upsert_token_basics(&[basic]).await.unwrap();
        let stored = db.get_token_basic("USDT").await.unwrap().unwrap();
        assert_eq!(stored.total_amount, Amount::from(10u64));
        assert_eq!(stored.stats_update_time, 50);
        assert_eq!(
            db.get_token(&key).await.unwrap().unwrap().available_amount,
            Some(Amount::from(77u64))
        );

        let edge = TokenMap::active(&key, &TokenKey::new(DST_CHAIN, "0xBBBB"));
        db.upsert_token_maps(&[edge.clone()]).await.unwrap();
        let tokens = db.list_tokens().await.unwrap();
        assert_eq!(db.deactivate_token_maps(&[edge]).await.unwrap(), 1);
        let maps = db.list_token_maps().await.unwrap();
        assert_eq!(maps.len(), 1);
        assert!(!maps[0].is_active(), "deactivated maps must be kept");
        assert_eq!(
            db.list_tokens().await.unwrap(),
            tokens,
            "deactivating maps must leave tokens alone"
        );
        assert_eq!(db.get_token_basic("USDT").await.unwrap(), Some(stored));

        db.delete_token_basic("USDT").await.unwrap();
        assert!(db.get_token_basic("USDT").await.unwrap().is_none());
        assert!(db.list_tokens().await.unwrap().is_empty());
        assert_eq!(db.list_token_maps().await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_stats_db(pool: SqlitePool) {
        let db = SqliteDb::new(pool);
        let assets = [TokenKey::new(SRC_CHAIN, "0xaaaa")];

        let first = usdt_transfer(100, 1_000, 5);
        let second = usdt_transfer(101, 2_000, 7);
        for transfer in [&first, &second] {
            db.merge_batch(batch_of(transfer, None)).await.unwrap();
        }

        let last = db.last_src_transfer(&assets).await.unwrap().unwrap();
        assert_eq!(last.tx_hash, second.src.hash);

        let aggregate = db.aggregate_src_transfers(&assets, 1_000, 2_000).await.unwrap();
        assert_eq!(
            aggregate,
            TransferAggregate {
                amount: Amount::from(5u64),
                count: 1
            },
            "the upper bound must be exclusive"
        );

        let aggregate = db.aggregate_src_transfers(&assets, 0, 3_000).await.unwrap();
        assert_eq!(aggregate.amount, Amount::from(12u64));
        assert_eq!(aggregate.count, 2);

        assert_eq!(
            db.src_transfer_routes(0, 3_000).await.unwrap(),
            vec![(SRC_CHAIN, DST_CHAIN)]
        );

        let stat = TimeStatistic {
            src_chain_id: SRC_CHAIN,
            dst_chain_id: DST_CHAIN,
            time: 0,
        };
        assert!(!db.has_time_statistic(&stat).await.unwrap());
        db.insert_time_statistics(&[stat, stat]).await.unwrap();
        assert!(db.has_time_statistic(&stat).await.unwrap());
    }
}
