//! In-process timer that runs the flusher on its schedule.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{
    clock::{Clock, add_delay, until},
    error::TriggerError,
    flusher::LogFlusher,
    settings::{RetentionSettings, any_retention_enabled},
    trigger::Trigger,
};

#[derive(Debug, Clone, Copy)]
struct Recurring {
    next: DateTime<Utc>,
    interval: Duration,
}

#[derive(Debug, Default)]
struct Schedule {
    recurring: Option<Recurring>,
    once: BTreeSet<DateTime<Utc>>,
    closed: bool,
}

impl Schedule {
    fn next(&self) -> Option<DateTime<Utc>> {
        let once = self.once.first().copied();
        let recurring = self.recurring.map(|r| r.next);
        match (once, recurring) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Consume every entry due at `now`. Returns whether anything was due.
    fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        let pending = self.once.len();
        self.once.retain(|at| *at > now);
        let mut due = self.once.len() != pending;

        if let Some(recurring) = &mut self.recurring
            && recurring.next <= now
        {
            due = true;
            while recurring.next <= now {
                recurring.next = add_delay(recurring.next, recurring.interval);
            }
        }

        due
    }
}

/// [`Trigger`] backed by a tokio task.
///
/// Overlapping due entries collapse into a single flush.
pub struct RetentionTimer {
    schedule: Mutex<Schedule>,
    changed: Notify,
    clock: Arc<dyn Clock>,
}

impl RetentionTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            schedule: Mutex::new(Schedule::default()),
            changed: Notify::new(),
            clock,
        }
    }

    /// Run until `shutdown` is cancelled, flushing whenever an entry is due.
    ///
    /// A flush in progress is allowed to finish before the loop exits.
    pub async fn run(&self, flusher: Arc<LogFlusher>, shutdown: CancellationToken) {
        tracing::info!(next_run = ?self.schedule.lock().next(), "Retention timer started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let now = self.clock.now();
            let (due, next) = {
                let mut schedule = self.schedule.lock();
                (schedule.take_due(now), schedule.next())
            };

            if due {
                self.fire(&flusher).await;
                continue;
            }

            let wait = next.map(|at| until(now, at));
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.changed.notified() => {}
                _ = sleep_for(wait) => {}
            }
        }

        self.close();
        tracing::info!("Retention timer stopped");
    }

    async fn fire(&self, flusher: &LogFlusher) {
        match flusher.flush().await {
            Ok(outcome) => {
                if outcome.total_deleted > 0 || outcome.next_run.is_some() {
                    tracing::info!(
                        redirect_logs = outcome.redirect_logs_deleted,
                        not_found_logs = outcome.not_found_logs_deleted,
                        total = outcome.total_deleted,
                        aggressive = outcome.was_aggressive,
                        estimate = ?outcome.estimate,
                        transition = outcome.transition.as_str(),
                        next_run = ?outcome.next_run,
                        "Retention flush complete"
                    );
                } else {
                    tracing::debug!("Retention flush complete, nothing to delete");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error running retention flush");
            }
        }
    }

    /// Drop every pending run and refuse new ones.
    pub fn close(&self) {
        let mut schedule = self.schedule.lock();
        schedule.closed = true;
        schedule.recurring = None;
        schedule.once.clear();
    }

    fn with_open_schedule<T>(
        &self,
        f: impl FnOnce(&mut Schedule) -> T,
    ) -> Result<T, TriggerError> {
        let mut schedule = self.schedule.lock();
        if schedule.closed {
            return Err(TriggerError::Closed);
        }
        Ok(f(&mut schedule))
    }
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl Trigger for RetentionTimer {
    async fn next_scheduled(&self) -> Result<Option<DateTime<Utc>>, TriggerError> {
        self.with_open_schedule(|schedule| schedule.next())
    }

    async fn schedule_once(&self, at: DateTime<Utc>) -> Result<(), TriggerError> {
        self.with_open_schedule(|schedule| {
            schedule.once.insert(at);
        })?;
        self.changed.notify_one();
        tracing::debug!(at = %at, "Scheduled one-off retention flush");
        Ok(())
    }

    async fn schedule_recurring(
        &self,
        first: DateTime<Utc>,
        interval: Duration,
    ) -> Result<(), TriggerError> {
        if interval.is_zero() {
            return Err(TriggerError::Internal(
                "recurring interval must be greater than zero".into(),
            ));
        }
        self.with_open_schedule(|schedule| {
            schedule.recurring = Some(Recurring {
                next: first,
                interval,
            });
        })?;
        self.changed.notify_one();
        Ok(())
    }

    async fn clear(&self) -> Result<(), TriggerError> {
        self.with_open_schedule(|schedule| {
            schedule.recurring = None;
            schedule.once.clear();
        })?;
        self.changed.notify_one();
        Ok(())
    }
}

/// Register the regular recurring flush, or drop every schedule when no
/// dataset has retention enabled.
pub async fn ensure_schedule(
    trigger: &dyn Trigger,
    settings: &dyn RetentionSettings,
    clock: &dyn Clock,
    interval: Duration,
) -> Result<(), TriggerError> {
    if !any_retention_enabled(settings) {
        trigger.clear().await?;
        tracing::info!("No log retention periods configured, retention schedule cleared");
        return Ok(());
    }

    if trigger.next_scheduled().await?.is_none() {
        let first = clock.now();
        trigger.schedule_recurring(first, interval).await?;
        tracing::info!(
            first_run = %first,
            interval_secs = interval.as_secs(),
            "Registered recurring retention flush"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::{
        config::{RetentionLimits, RetentionPeriods},
        retention::{
            clock::{ManualClock, SystemClock},
            flusher::LogFlusher,
            state::CacheStateStore,
            testing::FakeLogRepo,
        },
    };

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn manual_timer() -> (RetentionTimer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (RetentionTimer::new(clock.clone()), clock)
    }

    fn periods(redirect: i32, not_found: i32) -> RetentionPeriods {
        RetentionPeriods {
            redirect_logs_days: redirect,
            not_found_logs_days: not_found,
        }
    }

    #[tokio::test]
    async fn test_next_scheduled_is_earliest() {
        let (timer, clock) = manual_timer();
        let now = clock.now();
        assert_eq!(timer.next_scheduled().await.unwrap(), None);

        timer.schedule_recurring(now + TimeDelta::hours(2), DAY).await.unwrap();
        timer.schedule_once(now + TimeDelta::hours(5)).await.unwrap();
        assert_eq!(
            timer.next_scheduled().await.unwrap(),
            Some(now + TimeDelta::hours(2))
        );

        timer.schedule_once(now + TimeDelta::minutes(10)).await.unwrap();
        assert_eq!(
            timer.next_scheduled().await.unwrap(),
            Some(now + TimeDelta::minutes(10))
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let (timer, clock) = manual_timer();
        let now = clock.now();
        timer.schedule_recurring(now, DAY).await.unwrap();
        timer.schedule_once(now).await.unwrap();

        timer.clear().await.unwrap();
        assert_eq!(timer.next_scheduled().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (timer, clock) = manual_timer();
        let result = timer.schedule_recurring(clock.now(), Duration::ZERO).await;
        assert!(matches!(result, Err(TriggerError::Internal(_))));
    }

    #[tokio::test]
    async fn test_closed_timer_refuses_scheduling() {
        let (timer, clock) = manual_timer();
        timer.close();

        assert!(matches!(
            timer.schedule_once(clock.now()).await,
            Err(TriggerError::Closed)
        ));
        assert!(matches!(
            timer.next_scheduled().await,
            Err(TriggerError::Closed)
        ));
    }

    #[test]
    fn test_take_due_consumes_past_one_offs() {
        let now = Utc::now();
        let mut schedule = Schedule::default();
        schedule.once.insert(now - TimeDelta::minutes(1));
        schedule.once.insert(now);
        schedule.once.insert(now + TimeDelta::minutes(1));

        assert!(schedule.take_due(now));
        assert_eq!(schedule.next(), Some(now + TimeDelta::minutes(1)));
        assert!(!schedule.take_due(now));
    }

    #[test]
    fn test_take_due_advances_recurring_past_now() {
        let start = Utc::now();
        let mut schedule = Schedule {
            recurring: Some(Recurring {
                next: start,
                interval: DAY,
            }),
            ..Default::default()
        };

        // Three missed days collapse into one due run
        let now = start + TimeDelta::days(3) + TimeDelta::hours(1);
        assert!(schedule.take_due(now));
        assert_eq!(schedule.next(), Some(start + TimeDelta::days(4)));
        assert!(!schedule.take_due(now));
    }

    #[tokio::test]
    async fn test_ensure_schedule_registers_recurring() {
        let (timer, clock) = manual_timer();

        ensure_schedule(&timer, &periods(7, 7), clock.as_ref(), DAY)
            .await
            .unwrap();
        assert_eq!(timer.next_scheduled().await.unwrap(), Some(clock.now()));
    }

    #[tokio::test]
    async fn test_ensure_schedule_keeps_existing() {
        let (timer, clock) = manual_timer();
        let existing = clock.now() + TimeDelta::hours(3);
        timer.schedule_recurring(existing, DAY).await.unwrap();

        ensure_schedule(&timer, &periods(7, 0), clock.as_ref(), DAY)
            .await
            .unwrap();
        assert_eq!(timer.next_scheduled().await.unwrap(), Some(existing));
    }

    #[tokio::test]
    async fn test_ensure_schedule_clears_when_disabled() {
        let (timer, clock) = manual_timer();
        timer.schedule_recurring(clock.now(), DAY).await.unwrap();
        timer
            .schedule_once(clock.now() + TimeDelta::minutes(3))
            .await
            .unwrap();

        ensure_schedule(&timer, &periods(0, 0), clock.as_ref(), DAY)
            .await
            .unwrap();
        assert_eq!(timer.next_scheduled().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_flushes_due_entry_and_stops() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timer = Arc::new(RetentionTimer::new(clock.clone()));
        let repo = Arc::new(FakeLogRepo::with_expired(10, 5));
        let flusher = Arc::new(LogFlusher::new(
            repo.clone(),
            Arc::new(periods(7, 7)),
            Arc::new(CacheStateStore::new(Arc::new(
                crate::cache::MemoryCache::new(),
            ))),
            timer.clone(),
            clock.clone(),
            RetentionLimits::default(),
        ));

        timer
            .schedule_once(clock.now() - TimeDelta::seconds(1))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let timer = timer.clone();
            let shutdown = shutdown.clone();
            async move { timer.run(flusher, shutdown).await }
        });

        for _ in 0..200 {
            if repo.expired(crate::models::LogDataset::RedirectLogs) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(repo.expired(crate::models::LogDataset::RedirectLogs), 0);
        assert_eq!(repo.expired(crate::models::LogDataset::NotFoundLogs), 0);

        shutdown.cancel();
        handle.await.unwrap();

        assert!(matches!(
            timer.schedule_once(clock.now()).await,
            Err(TriggerError::Closed)
        ));
    }
}
