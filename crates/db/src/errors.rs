use std::fmt;

use thiserror::Error;

use crate::{inmemory, persistent::errors::StorageError};

/// The part of a [`MergeBatch`](crate::ledger::MergeBatch) that is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchStage {
    /// Wrapper transactions.
    Wrappers,

    /// Source legs and their transfers.
    SrcTransactions,

    /// Relay chain legs.
    PolyTransactions,

    /// Destination legs and their transfers.
    DstTransactions,

    /// The chain checkpoint.
    Chain,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            BatchStage::Wrappers => "wrapper transactions",
            BatchStage::SrcTransactions => "src transactions",
            BatchStage::PolyTransactions => "poly transactions",
            BatchStage::DstTransactions => "dst transactions",
            BatchStage::Chain => "chain checkpoint",
        };

        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Storage(#[from] StorageError),

    #[error("memory: {0}")]
    InMemory(#[from] inmemory::prelude::Error),

    /// A conditional or keyed update matched nothing.
    #[error("no rows updated: {0}")]
    NoRowsUpdated(String),

    /// A write inside a merge failed; nothing of the merge was committed.
    #[error("merge aborted while writing {stage}: {source}")]
    PartialBatch {
        stage: BatchStage,
        #[source]
        source: Box<DbError>,
    },
}

impl DbError {
    /// Wraps an error that happened while writing `stage` of a merge.
    pub fn partial(stage: BatchStage, source: impl Into<DbError>) -> Self {
        Self::PartialBatch {
            stage,
            source: Box::new(source.into()),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// All ledger writes are upserts, so retrying a whole batch after a transient failure is safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Storage(e) => e.is_transient(),
            DbError::InMemory(e) => e.is_transient(),
            DbError::NoRowsUpdated(_) => false,
            DbError::PartialBatch { source, .. } => source.is_retryable(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
