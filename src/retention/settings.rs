use chrono::{DateTime, TimeDelta, Utc};

use crate::{config::RetentionPeriods, models::LogDataset};

/// Supplies the retention window of each dataset.
pub trait RetentionSettings: Send + Sync {
    /// Days to keep entries. Zero or negative disables retention.
    fn retention_days(&self, dataset: LogDataset) -> i32;
}

impl RetentionSettings for RetentionPeriods {
    fn retention_days(&self, dataset: LogDataset) -> i32 {
        self.days_for(dataset)
    }
}

/// Retention policy for one dataset, captured at the start of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetPolicy {
    pub dataset: LogDataset,
    pub retention_days: i32,
}

impl DatasetPolicy {
    pub fn from_settings(settings: &dyn RetentionSettings, dataset: LogDataset) -> Self {
        Self {
            dataset,
            retention_days: settings.retention_days(dataset),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.retention_days > 0
    }

    /// Entries created strictly before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::days(i64::from(self.retention_days))
    }
}

/// True when at least one dataset has retention enabled.
pub fn any_retention_enabled(settings: &dyn RetentionSettings) -> bool {
    LogDataset::ALL
        .into_iter()
        .any(|dataset| DatasetPolicy::from_settings(settings, dataset).is_enabled())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods(redirect: i32, not_found: i32) -> RetentionPeriods {
        RetentionPeriods {
            redirect_logs_days: redirect,
            not_found_logs_days: not_found,
        }
    }

    #[test]
    fn test_policy_from_periods() {
        let settings = periods(30, 0);

        let redirects = DatasetPolicy::from_settings(&settings, LogDataset::RedirectLogs);
        assert_eq!(redirects.retention_days, 30);
        assert!(redirects.is_enabled());

        let not_found = DatasetPolicy::from_settings(&settings, LogDataset::NotFoundLogs);
        assert!(!not_found.is_enabled());
    }

    #[test]
    fn test_negative_days_disable() {
        let policy = DatasetPolicy {
            dataset: LogDataset::NotFoundLogs,
            retention_days: -3,
        };
        assert!(!policy.is_enabled());
    }

    #[test]
    fn test_cutoff() {
        let now = Utc::now();
        let policy = DatasetPolicy {
            dataset: LogDataset::RedirectLogs,
            retention_days: 7,
        };
        assert_eq!(policy.cutoff(now), now - TimeDelta::days(7));
    }

    #[test]
    fn test_any_retention_enabled() {
        assert!(any_retention_enabled(&periods(7, 0)));
        assert!(any_retention_enabled(&periods(0, 7)));
        assert!(!any_retention_enabled(&periods(0, -1)));
    }
}
