//! One retention cycle: resolve mode, delete, estimate, reschedule, compact.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{
    clock::Clock,
    deleter::BatchDeleter,
    error::RetentionResult,
    estimator::BacklogEstimator,
    maintenance::{CompactionPolicy, Maintenance, RandomCompaction},
    mode::{RetentionMode, resolve_mode},
    rescheduler::{Rescheduler, Transition, decide, needs_estimate},
    settings::{DatasetPolicy, RetentionSettings},
    state::RetentionStateStore,
    trigger::Trigger,
};
use crate::{
    config::RetentionLimits, db::LogRepo, models::LogDataset, observability::metrics,
};

/// Results from a single flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushOutcome {
    pub redirect_logs_deleted: u64,
    pub not_found_logs_deleted: u64,
    pub total_deleted: u64,
    /// Mode the cycle ran in.
    pub was_aggressive: bool,
    pub batch_size: u64,
    /// Summed backlog estimate, when the estimator ran.
    pub estimate: Option<u64>,
    pub transition: Transition,
    /// Follow-up run newly scheduled by this cycle.
    pub next_run: Option<DateTime<Utc>>,
    /// Table whose compaction this cycle started in the background.
    pub compaction_started: Option<LogDataset>,
}

impl FlushOutcome {
    pub fn deleted(&self, dataset: LogDataset) -> u64 {
        match dataset {
            LogDataset::RedirectLogs => self.redirect_logs_deleted,
            LogDataset::NotFoundLogs => self.not_found_logs_deleted,
        }
    }
}

/// Current mode and remaining backlog, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionStatus {
    pub mode: RetentionMode,
    pub aggressive_until: Option<DateTime<Utc>>,
    pub redirect_logs: DatasetStatus,
    pub not_found_logs: DatasetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetStatus {
    pub retention_days: i32,
    /// Expired entries, capped at the estimator's limit.
    pub expired_estimate: u64,
}

/// Adaptive batched retention for the redirect and 404 logs.
pub struct LogFlusher {
    repo: Arc<dyn LogRepo>,
    settings: Arc<dyn RetentionSettings>,
    state: Arc<dyn RetentionStateStore>,
    clock: Arc<dyn Clock>,
    limits: RetentionLimits,
    deleter: BatchDeleter,
    estimator: BacklogEstimator,
    rescheduler: Rescheduler,
    maintenance: Maintenance,
}

impl LogFlusher {
    pub fn new(
        repo: Arc<dyn LogRepo>,
        settings: Arc<dyn RetentionSettings>,
        state: Arc<dyn RetentionStateStore>,
        trigger: Arc<dyn Trigger>,
        clock: Arc<dyn Clock>,
        limits: RetentionLimits,
    ) -> Self {
        Self {
            deleter: BatchDeleter::new(repo.clone()),
            estimator: BacklogEstimator::new(repo.clone(), limits.estimate_cap()),
            rescheduler: Rescheduler::new(state.clone(), trigger, limits.clone()),
            maintenance: Maintenance::new(
                repo.clone(),
                Box::new(RandomCompaction::new(limits.compaction_odds)),
            ),
            repo,
            settings,
            state,
            clock,
            limits,
        }
    }

    /// Replace the compaction policy.
    pub fn with_compaction(mut self, policy: Box<dyn CompactionPolicy>) -> Self {
        self.maintenance = Maintenance::new(self.repo.clone(), policy);
        self
    }

    fn policies(&self) -> (DatasetPolicy, DatasetPolicy) {
        (
            DatasetPolicy::from_settings(self.settings.as_ref(), LogDataset::RedirectLogs),
            DatasetPolicy::from_settings(self.settings.as_ref(), LogDataset::NotFoundLogs),
        )
    }

    /// Run one retention cycle.
    ///
    /// A store failure aborts before the flag is touched or anything is
    /// scheduled. A scheduling failure is reported after deletions and the
    /// flag write have already happened.
    pub async fn flush(&self) -> RetentionResult<FlushOutcome> {
        let result = self.run_cycle().await;
        metrics::record_flush(if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn run_cycle(&self) -> RetentionResult<FlushOutcome> {
        let now = self.clock.now();
        let resolved = resolve_mode(self.state.as_ref(), now, &self.limits).await;
        let (redirects, not_found) = self.policies();

        let (redirect_logs_deleted, not_found_logs_deleted) = tokio::try_join!(
            self.deleter
                .delete_expired(redirects, resolved.batch_size, now),
            self.deleter
                .delete_expired(not_found, resolved.batch_size, now),
        )?;
        let total_deleted = redirect_logs_deleted + not_found_logs_deleted;

        metrics::record_retention_deletion(redirects.dataset.table_name(), redirect_logs_deleted);
        metrics::record_retention_deletion(not_found.dataset.table_name(), not_found_logs_deleted);

        let estimate = if needs_estimate(total_deleted, resolved.mode, &self.limits) {
            let (a, b) = tokio::try_join!(
                self.estimator.estimate_remaining(redirects, now),
                self.estimator.estimate_remaining(not_found, now),
            )?;
            let estimate = a.saturating_add(b);
            metrics::record_backlog_estimate(estimate);
            Some(estimate)
        } else {
            None
        };

        let decision = decide(total_deleted, resolved.mode, estimate, &self.limits);
        if decision.transition != Transition::Stay {
            tracing::info!(
                transition = decision.transition.as_str(),
                total_deleted,
                estimate = ?estimate,
                "Retention mode changed"
            );
            metrics::record_mode_transition(decision.transition.as_str());
        }

        self.rescheduler.persist(&decision, now).await;
        let rearmed = self.rescheduler.rearm(&decision, now).await;
        let compaction_started = self.maintenance.maybe_compact();
        let next_run = rearmed?;

        Ok(FlushOutcome {
            redirect_logs_deleted,
            not_found_logs_deleted,
            total_deleted,
            was_aggressive: resolved.is_aggressive(),
            batch_size: resolved.batch_size,
            estimate,
            transition: decision.transition,
            next_run,
            compaction_started,
        })
    }

    /// Wait for a background compaction started by an earlier flush.
    pub async fn wait_for_maintenance(&self) {
        self.maintenance.wait_idle().await;
    }

    /// Report the current mode and a bounded backlog estimate per dataset.
    /// Deletes nothing and writes nothing.
    pub async fn status(&self) -> RetentionResult<RetentionStatus> {
        let now = self.clock.now();
        let resolved = resolve_mode(self.state.as_ref(), now, &self.limits).await;
        let (redirects, not_found) = self.policies();

        let (redirect_estimate, not_found_estimate) = tokio::try_join!(
            self.estimator.estimate_remaining(redirects, now),
            self.estimator.estimate_remaining(not_found, now),
        )?;

        Ok(RetentionStatus {
            mode: resolved.mode,
            aggressive_until: resolved.expires_at,
            redirect_logs: DatasetStatus {
                retention_days: redirects.retention_days,
                expired_estimate: redirect_estimate,
            },
            not_found_logs: DatasetStatus {
                retention_days: not_found.retention_days,
                expired_estimate: not_found_estimate,
            },
        })
    }
}
