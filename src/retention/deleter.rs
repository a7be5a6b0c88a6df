use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::settings::DatasetPolicy;
use crate::db::{DbResult, LogRepo};

/// Removes one bounded batch of expired entries per call.
pub struct BatchDeleter {
    repo: Arc<dyn LogRepo>,
}

impl BatchDeleter {
    pub fn new(repo: Arc<dyn LogRepo>) -> Self {
        Self { repo }
    }

    /// Delete up to `batch_size` entries older than the policy's window.
    ///
    /// Disabled datasets return 0 without touching the store.
    pub async fn delete_expired(
        &self,
        policy: DatasetPolicy,
        batch_size: u64,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        if !policy.is_enabled() || batch_size == 0 {
            return Ok(0);
        }

        let cutoff = policy.cutoff(now);
        let deleted = self
            .repo
            .delete_expired(policy.dataset, cutoff, batch_size)
            .await?;

        tracing::debug!(
            table = policy.dataset.table_name(),
            deleted,
            batch_size,
            cutoff = %cutoff,
            "Deleted expired log entries"
        );

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::LogDataset, retention::testing::FakeLogRepo};

    fn policy(dataset: LogDataset, retention_days: i32) -> DatasetPolicy {
        DatasetPolicy {
            dataset,
            retention_days,
        }
    }

    #[tokio::test]
    async fn test_deletes_up_to_batch() {
        let repo = Arc::new(FakeLogRepo::with_expired(25_000, 0));
        let deleter = BatchDeleter::new(repo.clone());

        let deleted = deleter
            .delete_expired(policy(LogDataset::RedirectLogs, 7), 20_000, Utc::now())
            .await
            .unwrap();

        assert_eq!(deleted, 20_000);
        assert_eq!(repo.expired(LogDataset::RedirectLogs), 5_000);
    }

    #[tokio::test]
    async fn test_short_batch_when_backlog_small() {
        let repo = Arc::new(FakeLogRepo::with_expired(0, 42));
        let deleter = BatchDeleter::new(repo);

        let deleted = deleter
            .delete_expired(policy(LogDataset::NotFoundLogs, 7), 20_000, Utc::now())
            .await
            .unwrap();
        assert_eq!(deleted, 42);
    }

    #[tokio::test]
    async fn test_disabled_dataset_skips_store() {
        let repo = Arc::new(FakeLogRepo::with_expired(500, 500));
        let deleter = BatchDeleter::new(repo.clone());

        for days in [0, -1] {
            let deleted = deleter
                .delete_expired(policy(LogDataset::RedirectLogs, days), 20_000, Utc::now())
                .await
                .unwrap();
            assert_eq!(deleted, 0);
        }

        assert_eq!(repo.store_calls(), 0);
        assert_eq!(repo.expired(LogDataset::RedirectLogs), 500);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let deleter = BatchDeleter::new(Arc::new(FakeLogRepo::failing()));
        let result = deleter
            .delete_expired(policy(LogDataset::RedirectLogs, 7), 20_000, Utc::now())
            .await;
        assert!(result.is_err());
    }
}
