//! Persistent database errors.

use thiserror::Error;

/// SQLite result codes (primary codes, i.e., the low byte of the extended code) that indicate
/// another connection holds a conflicting lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Errors that can occur when interacting with the database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An error occurred when interacting with the SQLite database.
    #[error("sqlite: {0}")]
    Driver(#[from] sqlx::Error),

    /// The schema could not be brought up to date.
    #[error("migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An error occurred when converting between types.
    #[error("conversion: {0}")]
    MismatchedTypes(String),

    /// An error occurred when validating data.
    #[error("data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Whether the error is caused by the database being temporarily unavailable.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            StorageError::Driver(sqlx::Error::Io(_))
            | StorageError::Driver(sqlx::Error::PoolTimedOut) => true,
            StorageError::Driver(sqlx::Error::Database(e)) => e
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        }
    }
}
