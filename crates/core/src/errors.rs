//! Errors of the engine.

use relay_indexer_db::errors::DbError;
use relay_indexer_primitives::types::{BlockHeight, ChainId};
use thiserror::Error;

/// Errors that can occur while correlating, compensating or aggregating.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The persistence gateway failed.
    #[error("db: {0}")]
    Db(#[from] DbError),

    /// A merge tried to move a chain's checkpoint backwards.
    #[error("checkpoint of chain {chain_id} is at {stored}, refusing to move it to {requested}")]
    CheckpointRegression {
        chain_id: ChainId,
        stored: BlockHeight,
        requested: BlockHeight,
    },

    /// The chain has not been registered.
    #[error("unknown chain {0}")]
    UnknownChain(ChainId),

    /// A token refers to a token basic that does not exist.
    #[error("unknown token basic {0}")]
    UnknownTokenBasic(String),
}

impl EngineError {
    /// Whether resubmitting the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Db(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type of the engine.
pub type EngineResult<T> = Result<T, EngineError>;
