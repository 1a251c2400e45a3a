//! Undoes the effects of chain reorganizations.

use std::sync::Arc;

use relay_indexer_db::{ledger::InvalidatedHashes, IndexerDb};
use relay_indexer_primitives::prelude::*;
use tracing::{debug, info};

use crate::{checkpoint::CheckpointStore, config::IndexerMode, errors::EngineResult};

/// A reorganization reported by a chain listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgNotice {
    /// The chain that reorganized.
    pub chain_id: ChainId,

    /// The last height that is still canonical. The checkpoint is rewound to it.
    pub rollback_to: BlockHeight,

    /// Records observed above `rollback_to`.
    pub invalidated: InvalidatedHashes,
}

/// Removes invalidated records and rewinds checkpoints.
///
/// Compensation is idempotent: removing records that are already gone is a no-op, so a notice can
/// be replayed safely.
#[derive(Debug)]
pub struct ReorgCompensator<Db> {
    db: Arc<Db>,
    checkpoints: CheckpointStore<Db>,
}

impl<Db> Clone for ReorgCompensator<Db> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }
}

impl<Db: IndexerDb> ReorgCompensator<Db> {
    pub fn new(db: Arc<Db>, mode: IndexerMode) -> Self {
        Self {
            checkpoints: CheckpointStore::new(db.clone(), mode),
            db,
        }
    }

    /// Removes the transfers, legs and wrappers identified by `hashes`.
    pub async fn compensate(&self, hashes: &InvalidatedHashes) -> EngineResult<()> {
        if hashes.is_empty() {
            debug!("nothing to compensate");
            return Ok(());
        }

        self.db.delete_by_hashes(hashes).await?;

        debug!(
            src = hashes.src.len(),
            poly = hashes.poly.len(),
            dst = hashes.dst.len(),
            "removed invalidated records"
        );

        Ok(())
    }

    /// Removes everything `notice` invalidated, then rewinds the chain's checkpoint so that the
    /// listener re-observes the new canonical blocks.
    ///
    /// The checkpoint only moves once the records are gone.
    pub async fn handle_reorg(&self, notice: &ReorgNotice) -> EngineResult<()> {
        self.compensate(&notice.invalidated).await?;
        self.checkpoints
            .rewind(notice.chain_id, notice.rollback_to)
            .await?;

        info!(
            chain_id = notice.chain_id,
            rollback_to = notice.rollback_to,
            "compensated reorg"
        );

        Ok(())
    }
}
