//! Log retention configuration.
//!
//! Controls how long redirect-hit and not-found logs are kept, and the
//! batch sizes and cadences the flusher uses to work through a backlog.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_hours = 24
//!
//! [retention.periods]
//! redirect_logs_days = 30
//! not_found_logs_days = 7
//!
//! [retention.limits]
//! normal_batch = 20000
//! aggressive_batch = 50000
//! aggressive_threshold = 100000
//! keep_on_delay_secs = 600
//! fast_delay_secs = 180
//! aggressive_lifetime_secs = 3600
//! compaction_odds = 5000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::LogDataset;

/// Log retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether the retention flusher runs.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enabled: bool,

    /// Cadence of the regular recurring flush (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Retention periods per log dataset.
    #[serde(default)]
    pub periods: RetentionPeriods,

    /// Batch sizes, thresholds and delays for the flusher.
    #[serde(default)]
    pub limits: RetentionLimits,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            periods: RetentionPeriods::default(),
            limits: RetentionLimits::default(),
        }
    }
}

fn default_interval_hours() -> u64 {
    24
}

/// One year.
const MAX_INTERVAL_HOURS: u64 = 24 * 366;

impl RetentionConfig {
    /// Get the recurring interval as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "retention.interval_hours must be greater than 0".into(),
            ));
        }
        if self.interval_hours > MAX_INTERVAL_HOURS {
            return Err(ConfigError::Validation(format!(
                "retention.interval_hours must be at most {MAX_INTERVAL_HOURS}"
            )));
        }
        self.limits.validate()
    }
}

/// Retention periods for each log dataset.
///
/// Each field is the number of days to keep log entries.
/// Zero or a negative value disables retention for that dataset (keep forever).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionPeriods {
    /// Days to keep redirect-hit logs.
    /// Default: 7 days
    #[serde(default = "default_log_days")]
    pub redirect_logs_days: i32,

    /// Days to keep not-found (404) logs.
    /// Default: 7 days
    #[serde(default = "default_log_days")]
    pub not_found_logs_days: i32,
}

impl Default for RetentionPeriods {
    fn default() -> Self {
        Self {
            redirect_logs_days: default_log_days(),
            not_found_logs_days: default_log_days(),
        }
    }
}

fn default_log_days() -> i32 {
    7
}

impl RetentionPeriods {
    /// Configured retention window for a dataset, in days.
    pub fn days_for(&self, dataset: LogDataset) -> i32 {
        match dataset {
            LogDataset::RedirectLogs => self.redirect_logs_days,
            LogDataset::NotFoundLogs => self.not_found_logs_days,
        }
    }
}

/// Batch sizes, thresholds and cadences for the flusher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionLimits {
    /// Rows deleted per dataset per run in normal mode.
    /// Default: 20000
    #[serde(default = "default_normal_batch")]
    pub normal_batch: u64,

    /// Rows deleted per dataset per run in aggressive mode.
    /// Default: 50000
    #[serde(default = "default_aggressive_batch")]
    pub aggressive_batch: u64,

    /// Combined backlog estimate at which a saturated normal run escalates
    /// to aggressive mode. Also bounds the estimate query.
    /// Default: 100000
    #[serde(default = "default_aggressive_threshold")]
    pub aggressive_threshold: u64,

    /// Delay before the follow-up run when normal mode left work behind.
    /// Default: 600 (10 minutes)
    #[serde(default = "default_keep_on_delay")]
    pub keep_on_delay_secs: u64,

    /// Delay before the follow-up run in aggressive mode.
    /// Default: 180 (3 minutes)
    #[serde(default = "default_fast_delay")]
    pub fast_delay_secs: u64,

    /// How long aggressive mode lasts without being renewed.
    /// Default: 3600 (1 hour)
    #[serde(default = "default_aggressive_lifetime")]
    pub aggressive_lifetime_secs: u64,

    /// One-in-N odds, per dataset, of compacting a log table after a run.
    /// Set to 0 to disable compaction.
    /// Default: 5000
    #[serde(default = "default_compaction_odds")]
    pub compaction_odds: u32,
}

impl Default for RetentionLimits {
    fn default() -> Self {
        Self {
            normal_batch: default_normal_batch(),
            aggressive_batch: default_aggressive_batch(),
            aggressive_threshold: default_aggressive_threshold(),
            keep_on_delay_secs: default_keep_on_delay(),
            fast_delay_secs: default_fast_delay(),
            aggressive_lifetime_secs: default_aggressive_lifetime(),
            compaction_odds: default_compaction_odds(),
        }
    }
}

fn default_normal_batch() -> u64 {
    20_000
}

fn default_aggressive_batch() -> u64 {
    50_000
}

fn default_aggressive_threshold() -> u64 {
    100_000
}

fn default_keep_on_delay() -> u64 {
    600 // 10 minutes
}

fn default_fast_delay() -> u64 {
    180 // 3 minutes
}

fn default_aggressive_lifetime() -> u64 {
    3600 // 1 hour
}

fn default_compaction_odds() -> u32 {
    5000
}

impl RetentionLimits {
    pub fn keep_on_delay(&self) -> Duration {
        Duration::from_secs(self.keep_on_delay_secs)
    }

    pub fn fast_delay(&self) -> Duration {
        Duration::from_secs(self.fast_delay_secs)
    }

    pub fn aggressive_lifetime(&self) -> Duration {
        Duration::from_secs(self.aggressive_lifetime_secs)
    }

    /// Cap applied to the backlog estimate query.
    pub fn estimate_cap(&self) -> u64 {
        self.aggressive_threshold.saturating_add(1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.normal_batch == 0 {
            return Err(ConfigError::Validation(
                "retention.limits.normal_batch must be greater than 0".into(),
            ));
        }
        if self.aggressive_batch < self.normal_batch {
            return Err(ConfigError::Validation(
                "retention.limits.aggressive_batch cannot be smaller than normal_batch".into(),
            ));
        }
        if self.aggressive_threshold == 0 {
            return Err(ConfigError::Validation(
                "retention.limits.aggressive_threshold must be greater than 0".into(),
            ));
        }
        if self.keep_on_delay_secs == 0 || self.fast_delay_secs == 0 {
            return Err(ConfigError::Validation(
                "retention.limits delays must be greater than 0".into(),
            ));
        }
        if self.aggressive_lifetime_secs == 0 {
            return Err(ConfigError::Validation(
                "retention.limits.aggressive_lifetime_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
