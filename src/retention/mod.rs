//! Adaptive batched retention for the redirect and 404 logs.
//!
//! Each flush deletes one bounded batch of expired entries per dataset. When
//! a batch fills up, a capped count of what is left decides whether to stay
//! in normal mode or escalate to aggressive mode (bigger batches, shorter
//! delays) until the backlog drains. The flusher re-arms its own trigger
//! while work remains and occasionally compacts one of the tables.

mod clock;
mod deleter;
mod error;
mod estimator;
mod flusher;
mod maintenance;
mod mode;
mod rescheduler;
mod settings;
mod state;
#[cfg(test)]
mod testing;
mod timer;
mod trigger;

pub use clock::{Clock, SystemClock};
pub use deleter::BatchDeleter;
pub use error::{RetentionError, RetentionResult, TriggerError};
pub use estimator::BacklogEstimator;
pub use flusher::{DatasetStatus, FlushOutcome, LogFlusher, RetentionStatus};
pub use maintenance::{CompactionPolicy, FixedCompaction, Maintenance, RandomCompaction};
pub use mode::{ResolvedMode, RetentionMode, resolve_mode};
pub use rescheduler::{Decision, Rescheduler, Transition, decide, needs_estimate, should_rearm};
pub use settings::{DatasetPolicy, RetentionSettings, any_retention_enabled};
pub use state::{CacheStateStore, RetentionState, RetentionStateStore};
pub use timer::{RetentionTimer, ensure_schedule};
pub use trigger::Trigger;
