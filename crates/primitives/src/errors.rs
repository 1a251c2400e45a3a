use thiserror::Error;

/// Errors raised when decoding the numeric codes stored alongside ledger records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// The wrapper status code is not one of the known codes.
    #[error("unknown wrapper status code: {0}")]
    WrapperStatus(u64),
}
