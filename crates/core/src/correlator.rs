//! Merges the legs observed by chain listeners into the ledger.

use std::sync::Arc;

use relay_indexer_db::{
    ledger::{MergeBatch, WrapperMergePolicy},
    IndexerDb,
};
use relay_indexer_primitives::prelude::*;
use tracing::{debug, info};

use crate::{checkpoint::CheckpointStore, config::IndexerMode, errors::EngineResult};

/// Records a listener observed in one step.
///
/// Legs are correlated with their wrapper by hash only, so the parts may belong to different
/// logical transfers and arrive in any order relative to each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainEvents {
    pub wrappers: Vec<WrapperTransaction>,
    pub src: Vec<SrcTransaction>,
    pub poly: Vec<PolyTransaction>,
    pub dst: Vec<DstTransaction>,
}

impl ChainEvents {
    /// Whether there is no record at all.
    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty() && self.src.is_empty() && self.poly.is_empty() && self.dst.is_empty()
    }
}

/// Merges [`ChainEvents`] and the matching chain checkpoint in one atomic operation.
///
/// In primary mode every record is upserted and the checkpoint moves along with the merge. In
/// backup mode wrappers are only re-marked as unconfirmed (never created), legs are upserted as
/// usual and the checkpoint never moves.
#[derive(Debug)]
pub struct EventCorrelator<Db> {
    db: Arc<Db>,
    checkpoints: CheckpointStore<Db>,
    mode: IndexerMode,
}

impl<Db> Clone for EventCorrelator<Db> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            checkpoints: self.checkpoints.clone(),
            mode: self.mode,
        }
    }
}

impl<Db: IndexerDb> EventCorrelator<Db> {
    pub fn new(db: Arc<Db>, mode: IndexerMode) -> Self {
        Self {
            checkpoints: CheckpointStore::new(db.clone(), mode),
            db,
            mode,
        }
    }

    pub const fn mode(&self) -> IndexerMode {
        self.mode
    }

    /// Merges `events` and, if given, the updated `chain` state.
    ///
    /// Either everything is merged or nothing is. On error the caller is expected to resubmit the
    /// same call, which is safe because every write is an upsert.
    pub async fn merge(&self, chain: Option<Chain>, events: ChainEvents) -> EngineResult<()> {
        let chain = match chain {
            Some(chain) => self.checkpoints.stage(chain).await?,
            None => None,
        };

        let wrapper_policy = match self.mode {
            IndexerMode::Primary => WrapperMergePolicy::Upsert,
            IndexerMode::Backup => WrapperMergePolicy::ForceUnconfirmed,
        };

        let batch = MergeBatch {
            chain,
            wrapper_policy,
            wrappers: events.wrappers,
            src: events.src,
            poly: events.poly,
            dst: events.dst,
        };

        if batch.is_empty() {
            debug!(mode = ?self.mode, "nothing to merge");
            return Ok(());
        }

        let summary = BatchSummary::of(&batch);
        self.db.merge_batch(batch).await?;

        info!(
            mode = ?self.mode,
            chain_id = ?summary.chain_id,
            height = ?summary.height,
            wrappers = summary.wrappers,
            src = summary.src,
            poly = summary.poly,
            dst = summary.dst,
            "merged events"
        );

        Ok(())
    }
}

struct BatchSummary {
    chain_id: Option<ChainId>,
    height: Option<BlockHeight>,
    wrappers: usize,
    src: usize,
    poly: usize,
    dst: usize,
}

impl BatchSummary {
    fn of(batch: &MergeBatch) -> Self {
        Self {
            chain_id: batch.chain.as_ref().map(|c| c.chain_id),
            height: batch.chain.as_ref().map(|c| c.height),
            wrappers: batch.wrappers.len(),
            src: batch.src.len(),
            poly: batch.poly.len(),
            dst: batch.dst.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_indexer_db::{
        chain::ChainDb,
        errors::{BatchStage, DbError},
        inmemory::prelude::InMemoryDb,
        ledger::LedgerDb,
    };
    use relay_indexer_test_utils::prelude::*;

    use super::*;
    use crate::errors::EngineError;

    fn transfer() -> TransferFixture {
        generate_transfer(
            &TokenKey::new(2, "0xaaaa"),
            &TokenKey::new(6, "0xbbbb"),
            0,
            100,
            1_000,
            Amount::from(5u64),
        )
    }

    fn events_of(transfer: &TransferFixture) -> ChainEvents {
        ChainEvents {
            wrappers: vec![transfer.wrapper.clone()],
            src: vec![transfer.src.clone()],
            poly: vec![transfer.poly.clone()],
            dst: vec![transfer.dst.clone()],
        }
    }

    async fn db_with_chain() -> Arc<InMemoryDb> {
        let db = Arc::new(InMemoryDb::new());
        db.add_chains(&[Chain::new(2, "ethereum", 99)], &[])
            .await
            .unwrap();

        db
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let db = db_with_chain().await;
        let correlator = EventCorrelator::new(db.clone(), IndexerMode::Primary);
        let transfer = transfer();
        let chain = Chain::new(2, "ethereum", 100);

        correlator
            .merge(Some(chain.clone()), events_of(&transfer))
            .await
            .unwrap();
        let once = db.snapshot().await;

        correlator
            .merge(Some(chain), events_of(&transfer))
            .await
            .unwrap();
        assert_eq!(db.snapshot().await, once);
        assert_eq!(once.chains[&2].height, 100);
    }

    #[tokio::test]
    async fn test_legs_may_arrive_before_their_wrapper() {
        let db = db_with_chain().await;
        let correlator = EventCorrelator::new(db.clone(), IndexerMode::Primary);
        let transfer = transfer();

        correlator
            .merge(
                None,
                ChainEvents {
                    dst: vec![transfer.dst.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        correlator
            .merge(None, events_of(&transfer))
            .await
            .unwrap();

        let dst = db.get_dst_transaction(&transfer.dst.hash).await.unwrap();
        assert_eq!(dst, Some(transfer.dst));
        assert_eq!(db.get_chain(2).await.unwrap().unwrap().height, 99);
    }

    #[tokio::test]
    async fn test_backup_defers_to_primary() {
        let db = db_with_chain().await;
        let primary = EventCorrelator::new(db.clone(), IndexerMode::Primary);
        let backup = EventCorrelator::new(db.clone(), IndexerMode::Backup);
        let seen = transfer();
        let unseen = transfer();

        primary
            .merge(
                None,
                ChainEvents {
                    wrappers: vec![seen.wrapper.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        backup
            .merge(Some(Chain::new(2, "ethereum", 200)), events_of(&seen))
            .await
            .unwrap();
        backup
            .merge(None, events_of(&unseen))
            .await
            .unwrap();

        let wrapper = db.get_wrapper(&seen.wrapper.hash).await.unwrap().unwrap();
        assert_eq!(wrapper.status, WrapperStatus::Unconfirmed);
        assert!(db.get_wrapper(&unseen.wrapper.hash).await.unwrap().is_none());
        assert!(
            db.get_src_transaction(&unseen.src.hash).await.unwrap().is_some(),
            "legs are merged in backup mode too"
        );
        assert_eq!(db.get_chain(2).await.unwrap().unwrap().height, 99);
    }

    #[tokio::test]
    async fn test_failed_merge_does_not_move_checkpoint() {
        let db = db_with_chain().await;
        let correlator = EventCorrelator::new(db.clone(), IndexerMode::Primary);
        let transfer = transfer();

        db.fail_next_merge_at(BatchStage::PolyTransactions).await;
        let err = correlator
            .merge(Some(Chain::new(2, "ethereum", 100)), events_of(&transfer))
            .await
            .expect_err("merge must fail");

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            EngineError::Db(DbError::PartialBatch {
                stage: BatchStage::PolyTransactions,
                ..
            })
        ));
        assert_eq!(db.get_chain(2).await.unwrap().unwrap().height, 99);
        assert!(db.get_wrapper(&transfer.wrapper.hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_regression_is_rejected_before_writing() {
        let db = db_with_chain().await;
        let correlator = EventCorrelator::new(db.clone(), IndexerMode::Primary);
        let transfer = transfer();

        let err = correlator
            .merge(Some(Chain::new(2, "ethereum", 98)), events_of(&transfer))
            .await
            .expect_err("checkpoint must not move backwards");

        assert!(matches!(err, EngineError::CheckpointRegression { .. }));
        assert!(!err.is_retryable());
        assert!(db.get_wrapper(&transfer.wrapper.hash).await.unwrap().is_none());
    }
}
