use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::error::DbResult,
    models::{CreateLogEntry, LogDataset, LogEntry},
};

#[async_trait]
pub trait LogRepo: Send + Sync {
    /// Record a new log entry in the given dataset
    async fn create(&self, dataset: LogDataset, input: CreateLogEntry) -> DbResult<LogEntry>;

    /// Count every entry in the dataset.
    ///
    /// This is a full count and is only meant for tooling and tests; the
    /// retention path never calls it.
    async fn count(&self, dataset: LogDataset) -> DbResult<u64>;

    // ==================== Retention Operations ====================

    /// Delete at most `limit` entries created before `cutoff`, oldest first.
    ///
    /// Issued as a single statement. Returns the number of rows removed, which
    /// is less than `limit` once the expired backlog is exhausted.
    async fn delete_expired(
        &self,
        dataset: LogDataset,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> DbResult<u64>;

    /// Count entries created before `cutoff`, examining at most `cap` rows.
    ///
    /// The result is `min(expired rows, cap)`.
    async fn count_expired(
        &self,
        dataset: LogDataset,
        cutoff: DateTime<Utc>,
        cap: u64,
    ) -> DbResult<u64>;

    /// Reclaim space and refresh index statistics for the dataset's table.
    async fn compact(&self, dataset: LogDataset) -> DbResult<()>;
}

/// Convert a row limit to the signed integer SQL `LIMIT` expects.
#[cfg_attr(
    not(any(feature = "database-sqlite", feature = "database-postgres")),
    allow(dead_code)
)]
pub(crate) fn sql_limit(limit: u64) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
