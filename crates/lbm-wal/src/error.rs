//! WAL error type.

use thiserror::Error;

/// Failures from staging, committing, rolling back, or recovering a WAL
/// transaction.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying filesystem operation failed.
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record in the log file could not be parsed.
    #[error("corrupt wal record: {0}")]
    CorruptRecord(String),

    /// `commit` or `rollback` called twice, or after the other, on one transaction.
    #[error("transaction {0} already finished")]
    AlreadyFinished(String),
}
