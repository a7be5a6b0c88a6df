//! Occasional table compaction after a flush.
//!
//! Compaction runs on its own task so a slow `VACUUM` never holds up the
//! flush that started it.

use std::sync::Arc;

use rand::Rng;
use tokio_util::task::TaskTracker;

use crate::{db::LogRepo, models::LogDataset, observability::metrics};

/// Chooses which table, if any, to compact after a flush.
pub trait CompactionPolicy: Send + Sync {
    fn pick(&self) -> Option<LogDataset>;
}

/// Draws uniformly from `1..=odds`: 1 compacts the redirect log, 2 the 404
/// log, anything else nothing. `odds == 0` never compacts.
#[derive(Debug, Clone, Copy)]
pub struct RandomCompaction {
    odds: u32,
}

impl RandomCompaction {
    pub fn new(odds: u32) -> Self {
        Self { odds }
    }

    fn pick_from_draw(draw: u32) -> Option<LogDataset> {
        match draw {
            1 => Some(LogDataset::RedirectLogs),
            2 => Some(LogDataset::NotFoundLogs),
            _ => None,
        }
    }
}

impl CompactionPolicy for RandomCompaction {
    fn pick(&self) -> Option<LogDataset> {
        if self.odds == 0 {
            return None;
        }
        Self::pick_from_draw(rand::thread_rng().gen_range(1..=self.odds))
    }
}

/// Always makes the same choice.
#[derive(Debug, Clone, Copy)]
pub struct FixedCompaction(pub Option<LogDataset>);

impl CompactionPolicy for FixedCompaction {
    fn pick(&self) -> Option<LogDataset> {
        self.0
    }
}

pub struct Maintenance {
    repo: Arc<dyn LogRepo>,
    policy: Box<dyn CompactionPolicy>,
    tasks: TaskTracker,
}

impl Maintenance {
    pub fn new(repo: Arc<dyn LogRepo>, policy: Box<dyn CompactionPolicy>) -> Self {
        Self {
            repo,
            policy,
            tasks: TaskTracker::new(),
        }
    }

    /// Start compacting the table the policy picks and return it.
    ///
    /// At most one compaction runs at a time; a pick made while the previous
    /// one is still running is dropped.
    pub fn maybe_compact(&self) -> Option<LogDataset> {
        let dataset = self.policy.pick()?;

        if !self.tasks.is_empty() {
            tracing::debug!(
                table = dataset.table_name(),
                "Previous compaction still running, skipping"
            );
            return None;
        }

        self.tasks.spawn(compact_table(self.repo.clone(), dataset));
        Some(dataset)
    }

    /// Wait until no compaction is running.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

async fn compact_table(repo: Arc<dyn LogRepo>, dataset: LogDataset) {
    let table = dataset.table_name();

    match repo.compact(dataset).await {
        Ok(()) => {
            tracing::info!(table, "Compacted log table");
            metrics::record_compaction(table, true);
        }
        Err(e) => {
            tracing::warn!(table, error = %e, "Log table compaction failed");
            metrics::record_compaction(table, false);
        }
    }
}
