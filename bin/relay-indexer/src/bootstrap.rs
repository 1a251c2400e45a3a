//! Wires the store and the indexer service together.

use std::sync::Arc;

use anyhow::Context;
use relay_indexer_core::{
    service::{IndexerService, ServiceConfig},
    token_map::TokenMapBuilder,
};
use relay_indexer_db::{chain::ChainDb, persistent::sqlite::SqliteDb};
use tokio::signal;
use tracing::{error, info, warn};

use crate::{config::Config, constants::DEFAULT_FEED_CAPACITY};

/// Starts the indexer service on the configured store.
///
/// Chain listeners publish to the returned service through [`IndexerService::feed`].
pub(crate) async fn start(config: &Config) -> anyhow::Result<IndexerService> {
    let db = Arc::new(
        SqliteDb::connect(&config.database_url, &config.db)
            .await
            .with_context(|| format!("could not open database at {}", config.database_url))?,
    );

    register(&db, config).await?;

    let chains: Vec<_> = config.chains.iter().map(|chain| chain.chain_id).collect();
    let service_config = ServiceConfig {
        mode: config.mode,
        db: config.db.clone(),
        stats: config.stats.clone(),
        fee_effect: config.fee_effect.clone(),
        feed_capacity: config.feed_capacity.unwrap_or(DEFAULT_FEED_CAPACITY),
    };

    IndexerService::start(db, &chains, &service_config)
        .await
        .context("could not start indexer service")
}

/// Runs the indexer until ctrl-c is received or one of its tasks stops.
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let mut service = start(&config).await?;

    info!(feeds = service.feeds().len(), "relay indexer running");

    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("could not listen for ctrl-c")?;
            info!("received ctrl-c, shutting down");
        }
        Some(res) = service.stopped() => {
            match res {
                Ok(Ok(())) => warn!("task stopped early, shutting down"),
                Ok(Err(e)) => error!(%e, "task failed, shutting down"),
                Err(e) => error!(%e, "task panicked, shutting down"),
            }
        }
    }

    service.shutdown(config.shutdown_timeout).await;

    Ok(())
}

/// Registers the configured chains, fee policies and tokens.
async fn register(db: &Arc<SqliteDb>, config: &Config) -> anyhow::Result<()> {
    db.add_chains(&config.chains, &config.chain_fees)
        .await
        .context("could not register chains")?;

    for fee in &config.chain_fees {
        let written = db
            .set_chain_fee(fee)
            .await
            .with_context(|| format!("could not register fee policy of chain {}", fee.chain_id))?;
        if !written {
            info!(chain_id = fee.chain_id, time = fee.time, "stored fee policy is newer, keeping it");
        }
    }

    if !config.tokens.is_empty() || !config.token_maps.is_empty() {
        TokenMapBuilder::new(db.clone())
            .add_tokens(&config.tokens, &config.token_maps)
            .await
            .context("could not register tokens")?;
    }

    Ok(())
}
