use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::settings::DatasetPolicy;
use crate::db::{DbResult, LogRepo};

/// Bounded-cost count of expired entries still waiting for deletion.
///
/// The query stops after `cap` rows, so a huge backlog costs the same as one
/// just over the threshold.
pub struct BacklogEstimator {
    repo: Arc<dyn LogRepo>,
    cap: u64,
}

impl BacklogEstimator {
    pub fn new(repo: Arc<dyn LogRepo>, cap: u64) -> Self {
        Self { repo, cap }
    }

    /// Expired entries remaining for one dataset, at most `cap`.
    pub async fn estimate_remaining(
        &self,
        policy: DatasetPolicy,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        if !policy.is_enabled() {
            return Ok(0);
        }

        let estimate = self
            .repo
            .count_expired(policy.dataset, policy.cutoff(now), self.cap)
            .await?;

        tracing::debug!(
            table = policy.dataset.table_name(),
            estimate,
            cap = self.cap,
            "Estimated remaining backlog"
        );

        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RetentionLimits, models::LogDataset, retention::testing::FakeLogRepo,
    };

    fn policy(dataset: LogDataset, retention_days: i32) -> DatasetPolicy {
        DatasetPolicy {
            dataset,
            retention_days,
        }
    }

    #[tokio::test]
    async fn test_million_row_backlog_is_capped() {
        let repo = Arc::new(FakeLogRepo::with_expired(1_000_000, 0));
        let estimator = BacklogEstimator::new(repo, RetentionLimits::default().estimate_cap());

        let estimate = estimator
            .estimate_remaining(policy(LogDataset::RedirectLogs, 7), Utc::now())
            .await
            .unwrap();
        assert_eq!(estimate, 100_001);
    }

    #[tokio::test]
    async fn test_small_backlog_is_exact() {
        let repo = Arc::new(FakeLogRepo::with_expired(0, 5_000));
        let estimator = BacklogEstimator::new(repo, 100_001);

        let estimate = estimator
            .estimate_remaining(policy(LogDataset::NotFoundLogs, 7), Utc::now())
            .await
            .unwrap();
        assert_eq!(estimate, 5_000);
    }

    #[tokio::test]
    async fn test_disabled_dataset_skips_store() {
        let repo = Arc::new(FakeLogRepo::with_expired(1_000, 1_000));
        let estimator = BacklogEstimator::new(repo.clone(), 100_001);

        let estimate = estimator
            .estimate_remaining(policy(LogDataset::NotFoundLogs, 0), Utc::now())
            .await
            .unwrap();

        assert_eq!(estimate, 0);
        assert_eq!(repo.store_calls(), 0);
    }
}
