use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::TriggerError;

/// The schedule that invokes the flusher.
///
/// Holds at most one recurring schedule plus any number of one-off runs.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Earliest pending run of any kind.
    async fn next_scheduled(&self) -> Result<Option<DateTime<Utc>>, TriggerError>;

    /// Add a one-off run at `at`.
    async fn schedule_once(&self, at: DateTime<Utc>) -> Result<(), TriggerError>;

    /// Replace the recurring schedule.
    async fn schedule_recurring(
        &self,
        first: DateTime<Utc>,
        interval: Duration,
    ) -> Result<(), TriggerError>;

    /// Drop every pending run, recurring and one-off.
    async fn clear(&self) -> Result<(), TriggerError>;
}
