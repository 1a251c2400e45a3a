//! Per-chain cursors that listeners resume from.
//!
//! A checkpoint only moves forward together with the batch it covers (see
//! [`EventCorrelator`](crate::correlator::EventCorrelator)), and only moves backward through
//! [`CheckpointStore::rewind`] after a reorganization.

use std::sync::Arc;

use relay_indexer_db::IndexerDb;
use relay_indexer_primitives::prelude::*;
use tracing::{debug, info};

use crate::{
    config::IndexerMode,
    errors::{EngineError, EngineResult},
};

/// Reads and moves chain checkpoints.
#[derive(Debug)]
pub struct CheckpointStore<Db> {
    db: Arc<Db>,
    mode: IndexerMode,
}

impl<Db> Clone for CheckpointStore<Db> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            mode: self.mode,
        }
    }
}

impl<Db: IndexerDb> CheckpointStore<Db> {
    pub fn new(db: Arc<Db>, mode: IndexerMode) -> Self {
        Self { db, mode }
    }

    /// Loads the state of a chain to resume from.
    ///
    /// The swap checkpoint of the returned chain is always zero, so the swap process resynchronizes
    /// from scratch whenever it loads the chain. Writing the returned chain back does not reset the
    /// stored swap checkpoint since the gateway ignores a zero `height_swap`.
    pub async fn load(&self, chain_id: ChainId) -> EngineResult<Option<Chain>> {
        let chain = self.db.get_chain(chain_id).await?.map(|chain| {
            debug!(%chain_id, height = chain.height, height_swap = chain.height_swap, "loaded checkpoint");

            Chain {
                height_swap: 0,
                ..chain
            }
        });

        Ok(chain)
    }

    /// The height a listener should resume after.
    pub async fn last_height(&self, chain_id: ChainId) -> EngineResult<BlockHeight> {
        self.load(chain_id)
            .await?
            .map(|chain| chain.height)
            .ok_or(EngineError::UnknownChain(chain_id))
    }

    /// Decides what chain state, if any, a merge should write.
    ///
    /// Returns `None` in backup mode. In primary mode, fails if `chain` would move the stored
    /// checkpoint backwards or if the chain is unknown.
    pub async fn stage(&self, chain: Chain) -> EngineResult<Option<Chain>> {
        if self.mode.is_backup() {
            return Ok(None);
        }

        let stored = self.last_height(chain.chain_id).await?;
        if chain.height < stored {
            return Err(EngineError::CheckpointRegression {
                chain_id: chain.chain_id,
                stored,
                requested: chain.height,
            });
        }

        Ok(Some(chain))
    }

    /// Forces the checkpoint of a chain back to `height`. No-op in backup mode.
    pub async fn rewind(&self, chain_id: ChainId, height: BlockHeight) -> EngineResult<()> {
        if self.mode.is_backup() {
            debug!(%chain_id, %height, "backup instance, not rewinding checkpoint");
            return Ok(());
        }

        let chain = Chain {
            chain_id,
            name: String::new(),
            height,
            height_swap: 0,
        };
        self.db.update_chain(&chain).await.map_err(|e| match e {
            relay_indexer_db::errors::DbError::NoRowsUpdated(_) => {
                EngineError::UnknownChain(chain_id)
            }
            e => e.into(),
        })?;

        info!(%chain_id, %height, "rewound checkpoint");

        Ok(())
    }
}
