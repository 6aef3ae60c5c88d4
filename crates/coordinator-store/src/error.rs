use thiserror::Error;

/// Handling-policy buckets from the error taxonomy (spec §7), not raw types:
/// callers branch on variant, not on message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
