//! Per-chain workers that apply listener output in order.
//!
//! Each monitored chain gets one [`IngestWorker`] fed through a bounded channel, so that the
//! batches of one chain are merged strictly in the order they were observed while different
//! chains progress independently.

use std::time::Duration;

use relay_indexer_db::{persistent::config::DbConfig, IndexerDb};
use relay_indexer_primitives::prelude::*;
use tokio::{sync::mpsc, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    compensator::{ReorgCompensator, ReorgNotice},
    correlator::{ChainEvents, EventCorrelator},
    errors::EngineResult,
};

/// A message from a chain listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// Records observed up to the height of `chain`, if given.
    Batch {
        chain: Option<Chain>,
        events: ChainEvents,
    },

    /// The chain reorganized.
    Reorg(ReorgNotice),
}

/// Applies the [`ChainEvent`]s of one chain, retrying transient failures.
#[derive(Debug)]
pub struct IngestWorker<Db> {
    chain_id: ChainId,
    correlator: EventCorrelator<Db>,
    compensator: ReorgCompensator<Db>,
    max_retry_count: usize,
    backoff_period: Duration,
}

impl<Db: IndexerDb> IngestWorker<Db> {
    pub fn new(
        chain_id: ChainId,
        correlator: EventCorrelator<Db>,
        compensator: ReorgCompensator<Db>,
        db_config: &DbConfig,
    ) -> Self {
        Self {
            chain_id,
            correlator,
            compensator,
            max_retry_count: db_config.max_retry_count(),
            backoff_period: db_config.backoff_period(),
        }
    }

    /// Applies events until the channel closes or `cancel` fires.
    ///
    /// Stops with an error if an event cannot be applied, leaving the checkpoint at the last
    /// applied batch so that a restarted listener re-observes the rest.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<ChainEvent>,
        cancel: CancellationToken,
    ) -> EngineResult<()> {
        let chain_id = self.chain_id;
        info!(%chain_id, "starting ingest worker");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(%chain_id, "ingest worker cancelled");
                    return Ok(());
                }
                event = rx.recv() => event,
            };

            let Some(event) = event else {
                info!(%chain_id, "listener feed closed");
                return Ok(());
            };

            if let Err(e) = self.apply_with_retries(&event, &cancel).await {
                error!(%chain_id, %e, "could not apply chain event, stopping");
                return Err(e);
            }
        }
    }

    async fn apply_with_retries(
        &self,
        event: &ChainEvent,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        let chain_id = self.chain_id;
        let mut attempt = 0;

        loop {
            match self.apply(event.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.max_retry_count => {
                    attempt += 1;
                    warn!(%chain_id, %e, %attempt, max_retry_count = self.max_retry_count, "retrying chain event");

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(e),
                        _ = sleep(self.backoff_period) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn apply(&self, event: ChainEvent) -> EngineResult<()> {
        match event {
            ChainEvent::Batch { chain, events } => {
                debug!(chain_id = self.chain_id, height = ?chain.as_ref().map(|c| c.height), "merging batch");
                self.correlator.merge(chain, events).await
            }
            ChainEvent::Reorg(notice) => {
                debug!(chain_id = self.chain_id, rollback_to = notice.rollback_to, "handling reorg");
                self.compensator.handle_reorg(&notice).await
            }
        }
    }
}
