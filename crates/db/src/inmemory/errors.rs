use thiserror::Error;

use crate::errors::BatchStage;

#[derive(Debug, Error)]
pub enum InMemoryError {
    /// A failure requested through
    /// [`InMemoryDb::fail_next_merge_at`](super::InMemoryDb::fail_next_merge_at).
    #[error("injected failure while writing {0}")]
    InjectedFailure(BatchStage),
}

impl InMemoryError {
    pub(crate) const fn is_transient(&self) -> bool {
        matches!(self, InMemoryError::InjectedFailure(_))
    }
}
