//! Error types for the schema engine.
//!
//! `StoreError` is what a single store round trip can produce. The engine
//! absorbs most of them into per-table / per-tenant results and only raises
//! `EngineError` when it cannot go on (bad input, store unreachable).

use thiserror::Error;

use crate::models::migration_log::FailureKind;

/// Result type alias using `EngineError`.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The statement itself was rejected by the store.
    #[error("{0}")]
    Statement(String),

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The statement exceeded its time budget and was cancelled.
    #[error("statement timed out")]
    Timeout,

    /// Pool exhausted, connection lost, or the store is otherwise unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Only an unreachable store stops a batch; everything else is local to
    /// the table or tenant being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout => FailureKind::Timeout,
            _ => FailureKind::Error,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // query_canceled: raised when statement_timeout fires
                Some("57014") => Self::Timeout,
                Some("23505") => Self::Conflict(db.message().to_string()),
                _ => Self::Statement(db.message().to_string()),
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err.to_string()),
            _ => Self::Statement(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Rejected before any store access.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The engine could not reach the store. Work committed before the
    /// failure stays committed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store was reachable but rejected or timed out a directory or
    /// ledger statement.
    #[error("Store error: {0}")]
    Store(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            other => Self::Store(other.to_string()),
        }
    }
}
