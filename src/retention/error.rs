use thiserror::Error;

use crate::db::DbError;

/// Errors from the schedule that invokes the flusher.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Retention timer has shut down")]
    Closed,

    #[error("Scheduling failed: {0}")]
    Internal(String),
}

/// Errors that abort a flush.
#[derive(Debug, Error)]
pub enum RetentionError {
    /// A delete or estimate query failed. Nothing was persisted or re-armed.
    #[error("Log store error: {0}")]
    Store(#[from] DbError),

    /// Reading or re-arming the schedule failed after deletions committed.
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] TriggerError),
}

pub type RetentionResult<T> = Result<T, RetentionError>;
