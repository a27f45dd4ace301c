//! Defines the crate level error type.
//!
//! The `Display` text of each variant doubles as the per-item message recorded
//! by bulk ingestion, so the wording of the admission errors is part of the
//! public contract.

/// The errors that may occur in the ledger.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The transaction has a non-positive amount or an empty category.
    #[error("invalid transaction")]
    InvalidTransaction,

    /// The budget has a non-positive limit or an empty category.
    ///
    /// The string describes which field was invalid.
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    /// No budget has been configured for the transaction's category.
    #[error("no budget category")]
    NoBudgetCategory,

    /// Committing the transaction would take the category over its limit.
    #[error("budget exceeded")]
    BudgetExceeded,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The cache could not be read from or written to.
    ///
    /// Callers in this crate treat this as a cache miss and never return it
    /// from a read path.
    #[error("cache error: {0}")]
    CacheError(String),

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not encode or decode JSON: {0}")]
    JSONSerializationError(String),

    /// A bulk call was made with zero workers.
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    /// The operation was cancelled before it could finish.
    #[error("the operation was cancelled")]
    Cancelled,

    /// A background task panicked or was aborted unexpectedly.
    #[error("worker task failed: {0}")]
    TaskFailed(String),

    /// A date string could not be parsed or a date could not be computed.
    #[error("invalid date \"{0}\": expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The CSV had issues that prevented it from being parsed.
    #[error("Could not parse the CSV file: {0}")]
    InvalidCSV(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        if value.is_cancelled() {
            Error::Cancelled
        } else {
            Error::TaskFailed(value.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}
