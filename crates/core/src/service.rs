//! Runs the long-lived tasks of one indexer instance.
//!
//! [`IndexerService::start`] spawns an [`IngestWorker`] per monitored chain and, on a primary
//! instance, the statistics and fee tasks. Listeners publish to the workers through the senders
//! returned by [`IndexerService::feed`].

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use relay_indexer_db::{persistent::config::DbConfig, IndexerDb};
use relay_indexer_primitives::prelude::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    checkpoint::CheckpointStore,
    compensator::ReorgCompensator,
    config::{FeeEffectConfig, IndexerMode, StatsConfig},
    correlator::EventCorrelator,
    errors::EngineResult,
    fee_effect::FeeEffectEvaluator,
    ingest::{ChainEvent, IngestWorker},
    stats::StatsAggregator,
};

/// The senders listeners publish their [`ChainEvent`]s to, one per monitored chain.
pub type Feeds = BTreeMap<ChainId, mpsc::Sender<ChainEvent>>;

/// What an [`IndexerService`] runs and how.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub mode: IndexerMode,

    /// Retry settings of the ingest workers.
    pub db: DbConfig,

    pub stats: StatsConfig,

    pub fee_effect: FeeEffectConfig,

    /// Number of chain events buffered per chain before a listener has to wait.
    pub feed_capacity: usize,
}

/// Handle to the running tasks of one indexer instance.
#[derive(Debug)]
pub struct IndexerService {
    feeds: Feeds,
    cancel: CancellationToken,
    tasks: JoinSet<EngineResult<()>>,
}

impl IndexerService {
    /// Spawns the ingest workers of `chains` and, unless this is a backup instance, the
    /// statistics and fee tasks.
    ///
    /// Fails if the checkpoint of a chain cannot be read; nothing is left running in that case.
    pub async fn start<Db>(
        db: Arc<Db>,
        chains: &[ChainId],
        config: &ServiceConfig,
    ) -> EngineResult<Self>
    where
        Db: IndexerDb + 'static,
    {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let checkpoints = CheckpointStore::new(db.clone(), config.mode);
        let correlator = EventCorrelator::new(db.clone(), config.mode);
        let compensator = ReorgCompensator::new(db.clone(), config.mode);

        let mut feeds = Feeds::new();
        for &chain_id in chains {
            let height = checkpoints.last_height(chain_id).await?;

            let (tx, rx) = mpsc::channel(config.feed_capacity);
            let worker =
                IngestWorker::new(chain_id, correlator.clone(), compensator.clone(), &config.db);
            tasks.spawn(worker.run(rx, cancel.clone()));

            info!(%chain_id, %height, "resuming chain");
            feeds.insert(chain_id, tx);
        }

        if config.mode.is_backup() {
            info!("backup instance, not running statistics and fee checks");
        } else {
            let stats = StatsAggregator::new(db.clone(), config.stats.clone());
            let stats_cancel = cancel.clone();
            tasks.spawn(async move {
                stats.run(stats_cancel).await;
                Ok(())
            });

            let fees = FeeEffectEvaluator::new(db);
            let fee_config = config.fee_effect.clone();
            let fee_cancel = cancel.clone();
            tasks.spawn(async move {
                fees.run(fee_config, fee_cancel).await;
                Ok(())
            });
        }

        info!(feeds = feeds.len(), tasks = tasks.len(), mode = ?config.mode, "indexer service started");

        Ok(Self {
            feeds,
            cancel,
            tasks,
        })
    }

    /// The sender feeding the ingest worker of `chain_id`, if that chain is monitored.
    pub fn feed(&self, chain_id: ChainId) -> Option<mpsc::Sender<ChainEvent>> {
        self.feeds.get(&chain_id).cloned()
    }

    pub fn feeds(&self) -> &Feeds {
        &self.feeds
    }

    /// Waits for the next task to stop. Returns `None` once nothing is running.
    ///
    /// Tasks only stop on their own when they fail or their feed is closed, so any result here
    /// usually means the instance should shut down.
    pub async fn stopped(&mut self) -> Option<Result<EngineResult<()>, JoinError>> {
        self.tasks.join_next().await
    }

    /// Cancels every task and waits up to `grace` for them to finish, aborting the rest.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        self.feeds.clear();

        let tasks = &mut self.tasks;
        let drained = timeout(grace, async {
            while let Some(res) = tasks.join_next().await {
                if let Ok(Err(e)) = res {
                    warn!(%e, "task failed while shutting down");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(?grace, "shutdown timed out, aborting remaining tasks");
            self.tasks.abort_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_indexer_db::{chain::ChainDb, inmemory::prelude::InMemoryDb, ledger::LedgerDb};
    use relay_indexer_test_utils::prelude::*;
    use tokio::time::sleep;

    use super::*;
    use crate::correlator::ChainEvents;

    fn config(mode: IndexerMode) -> ServiceConfig {
        ServiceConfig {
            mode,
            db: DbConfig::default(),
            stats: StatsConfig::default(),
            fee_effect: FeeEffectConfig::default(),
            feed_capacity: 4,
        }
    }

    async fn db_with_chains() -> Arc<InMemoryDb> {
        let db = Arc::new(InMemoryDb::new());
        db.add_chains(
            &[Chain::new(2, "ethereum", 99), Chain::new(6, "bsc", 0)],
            &[],
        )
        .await
        .unwrap();

        db
    }

    #[tokio::test]
    async fn test_feeds_reach_the_ingest_workers() {
        let db = db_with_chains().await;
        let service = IndexerService::start(db.clone(), &[2, 6], &config(IndexerMode::Primary))
            .await
            .unwrap();
        assert_eq!(service.feeds().keys().copied().collect::<Vec<_>>(), vec![2, 6]);
        assert!(service.feed(42).is_none());

        let transfer = generate_transfer(
            &TokenKey::new(2, "0xaaaa"),
            &TokenKey::new(6, "0xbbbb"),
            0,
            100,
            1_000,
            Amount::from(1u64),
        );
        service
            .feed(2)
            .unwrap()
            .send(ChainEvent::Batch {
                chain: Some(Chain::new(2, "ethereum", 100)),
                events: ChainEvents {
                    wrappers: vec![transfer.wrapper.clone()],
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let mut merged = false;
        for _ in 0..200 {
            if db.get_wrapper(&transfer.wrapper.hash).await.unwrap().is_some() {
                merged = true;
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(merged, "the batch must be merged by the worker of its chain");
        assert_eq!(db.get_chain(2).await.unwrap().unwrap().height, 100);

        service.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_backup_runs_ingest_workers_only() {
        let db = db_with_chains().await;
        let mut service = IndexerService::start(db, &[2], &config(IndexerMode::Backup))
            .await
            .unwrap();
        assert_eq!(service.tasks.len(), 1);

        service.cancel.cancel();
        assert!(matches!(service.stopped().await, Some(Ok(Ok(())))));
        assert!(service.stopped().await.is_none());
    }

    #[tokio::test]
    async fn test_primary_runs_background_tasks() {
        let db = db_with_chains().await;
        let service = IndexerService::start(db, &[2], &config(IndexerMode::Primary))
            .await
            .unwrap();

        assert_eq!(service.tasks.len(), 3);

        service.shutdown(Duration::from_secs(1)).await;
    }
}
