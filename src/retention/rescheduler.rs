//! Mode transitions and self-rescheduling after a flush.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use super::{
    clock::add_delay,
    error::TriggerError,
    mode::RetentionMode,
    state::{RetentionState, RetentionStateStore},
    trigger::Trigger,
};
use crate::config::RetentionLimits;

/// What a flush did to the aggressive-mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Mode unchanged and no flag write.
    Stay,
    /// Normal → aggressive; flag set.
    Escalate,
    /// Still aggressive; flag expiry pushed out.
    Renew,
    /// Aggressive → normal; flag cleared.
    Relax,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Stay => "stay",
            Transition::Escalate => "escalate",
            Transition::Renew => "renew",
            Transition::Relax => "relax",
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub transition: Transition,
    /// Delay before the next run, when more work remains.
    pub delay: Option<Duration>,
}

/// Whether this cycle filled its batch in normal mode and so needs a
/// backlog estimate before [`decide`] can run.
pub fn needs_estimate(total_deleted: u64, mode: RetentionMode, limits: &RetentionLimits) -> bool {
    mode == RetentionMode::Normal && total_deleted >= limits.normal_batch
}

/// Pick the transition and next delay for a finished cycle.
///
/// `estimate` is the summed backlog estimate; a missing estimate counts as a
/// small backlog. Aggressive cycles never consult it.
pub fn decide(
    total_deleted: u64,
    mode: RetentionMode,
    estimate: Option<u64>,
    limits: &RetentionLimits,
) -> Decision {
    match mode {
        RetentionMode::Normal if total_deleted < limits.normal_batch => Decision {
            transition: Transition::Stay,
            delay: None,
        },
        RetentionMode::Normal if estimate.unwrap_or(0) >= limits.aggressive_threshold => {
            Decision {
                transition: Transition::Escalate,
                delay: Some(limits.fast_delay()),
            }
        }
        RetentionMode::Normal => Decision {
            transition: Transition::Stay,
            delay: Some(limits.keep_on_delay()),
        },
        RetentionMode::Aggressive if total_deleted < limits.aggressive_batch => Decision {
            transition: Transition::Relax,
            delay: None,
        },
        RetentionMode::Aggressive => Decision {
            transition: Transition::Renew,
            delay: Some(limits.fast_delay()),
        },
    }
}

/// Re-arm only when nothing is pending or the candidate is sooner.
pub fn should_rearm(existing: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> bool {
    existing.is_none_or(|existing| candidate < existing)
}

/// Applies a [`Decision`]: persists the flag and re-arms the trigger.
pub struct Rescheduler {
    state: Arc<dyn RetentionStateStore>,
    trigger: Arc<dyn Trigger>,
    limits: RetentionLimits,
}

impl Rescheduler {
    pub fn new(
        state: Arc<dyn RetentionStateStore>,
        trigger: Arc<dyn Trigger>,
        limits: RetentionLimits,
    ) -> Self {
        Self {
            state,
            trigger,
            limits,
        }
    }

    /// Persist the flag change for `decision`. Store failures are logged
    /// and otherwise ignored.
    pub async fn persist(&self, decision: &Decision, now: DateTime<Utc>) {
        let result = match decision.transition {
            Transition::Stay => return,
            Transition::Escalate | Transition::Renew => {
                let lifetime = self.limits.aggressive_lifetime();
                let state = RetentionState::aggressive_until(add_delay(now, lifetime));
                self.state.save(&state, lifetime).await
            }
            Transition::Relax => self.state.clear().await,
        };

        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                transition = decision.transition.as_str(),
                "Failed to persist retention mode"
            );
        }
    }

    /// Schedule the follow-up run, if any. Returns the time newly scheduled.
    pub async fn rearm(
        &self,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, TriggerError> {
        let Some(delay) = decision.delay else {
            return Ok(None);
        };

        let candidate = add_delay(now, delay);
        let existing = self.trigger.next_scheduled().await?;

        if !should_rearm(existing, candidate) {
            tracing::debug!(
                candidate = %candidate,
                existing = ?existing,
                "Earlier run already scheduled, not re-arming"
            );
            return Ok(None);
        }

        self.trigger.schedule_once(candidate).await?;
        Ok(Some(candidate))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rstest::rstest;

    use super::*;

    const NORMAL: RetentionMode = RetentionMode::Normal;
    const AGGRESSIVE: RetentionMode = RetentionMode::Aggressive;

    const KEEP_ON: Option<Duration> = Some(Duration::from_secs(600));
    const FAST: Option<Duration> = Some(Duration::from_secs(180));

    #[rstest]
    #[case::normal_idle(0, NORMAL, None, Transition::Stay, None)]
    #[case::normal_partial_batch(19_999, NORMAL, None, Transition::Stay, None)]
    #[case::normal_partial_batch_ignores_estimate(19_999, NORMAL, Some(500_000), Transition::Stay, None)]
    #[case::normal_full_small_backlog(20_000, NORMAL, Some(5_000), Transition::Stay, KEEP_ON)]
    #[case::normal_full_just_under_threshold(25_000, NORMAL, Some(99_999), Transition::Stay, KEEP_ON)]
    #[case::normal_full_at_threshold(20_000, NORMAL, Some(100_000), Transition::Escalate, FAST)]
    #[case::normal_full_capped_estimate(40_000, NORMAL, Some(100_001), Transition::Escalate, FAST)]
    #[case::normal_full_no_estimate(20_000, NORMAL, None, Transition::Stay, KEEP_ON)]
    #[case::aggressive_partial(10_000, AGGRESSIVE, None, Transition::Relax, None)]
    #[case::aggressive_just_short(49_999, AGGRESSIVE, None, Transition::Relax, None)]
    #[case::aggressive_full(50_000, AGGRESSIVE, None, Transition::Renew, FAST)]
    #[case::aggressive_full_ignores_estimate(100_000, AGGRESSIVE, Some(0), Transition::Renew, FAST)]
    fn test_decide(
        #[case] total: u64,
        #[case] mode: RetentionMode,
        #[case] estimate: Option<u64>,
        #[case] transition: Transition,
        #[case] delay: Option<Duration>,
    ) {
        let decision = decide(total, mode, estimate, &RetentionLimits::default());
        assert_eq!(decision, Decision { transition, delay });
    }

    #[rstest]
    #[case(0, NORMAL, false)]
    #[case(19_999, NORMAL, false)]
    #[case(20_000, NORMAL, true)]
    #[case(50_000, AGGRESSIVE, false)]
    fn test_needs_estimate(#[case] total: u64, #[case] mode: RetentionMode, #[case] expected: bool) {
        assert_eq!(
            needs_estimate(total, mode, &RetentionLimits::default()),
            expected
        );
    }

    #[test]
    fn test_escalation_needs_both_conditions() {
        let limits = RetentionLimits::default();
        for total in [0, 10_000, 19_999, 20_000, 35_000] {
            for estimate in [0, 99_999, 100_000, 100_001] {
                let escalated = decide(total, NORMAL, Some(estimate), &limits).transition
                    == Transition::Escalate;
                assert_eq!(
                    escalated,
                    total >= 20_000 && estimate >= 100_000,
                    "total={total} estimate={estimate}"
                );
            }
        }
    }

    #[test]
    fn test_should_rearm() {
        let now = Utc::now();
        let candidate = now + TimeDelta::minutes(10);

        assert!(should_rearm(None, candidate));
        assert!(should_rearm(Some(now + TimeDelta::hours(23)), candidate));
        assert!(!should_rearm(Some(now + TimeDelta::minutes(5)), candidate));
        assert!(!should_rearm(Some(candidate), candidate));
    }
}
