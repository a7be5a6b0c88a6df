//! In-crate fakes for exercising the flusher without a database.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use super::state::{RetentionState, RetentionStateStore};
use crate::{
    cache::{CacheError, CacheResult},
    db::{DbError, DbResult, LogRepo},
    models::{CreateLogEntry, LogDataset, LogEntry},
};

/// Log store that only tracks how many expired rows each dataset holds.
///
/// Every cutoff it is queried with is recorded, so callers can check the
/// retention window they pass down.
#[derive(Default)]
pub struct FakeLogRepo {
    pub(crate) expired: Mutex<HashMap<LogDataset, u64>>,
    pub delete_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    pub delete_cutoffs: Mutex<Vec<(LogDataset, DateTime<Utc>)>>,
    pub count_cutoffs: Mutex<Vec<(LogDataset, DateTime<Utc>)>>,
    pub compactions: Mutex<Vec<LogDataset>>,
    /// Compaction blocks until this is notified.
    pub compaction_gate: Option<Arc<Notify>>,
    pub fail_queries: bool,
    pub fail_compaction: bool,
}

impl FakeLogRepo {
    pub fn with_expired(redirect_logs: u64, not_found_logs: u64) -> Self {
        let repo = Self::default();
        repo.set_expired(LogDataset::RedirectLogs, redirect_logs);
        repo.set_expired(LogDataset::NotFoundLogs, not_found_logs);
        repo
    }

    pub fn failing() -> Self {
        Self {
            fail_queries: true,
            ..Self::with_expired(100, 100)
        }
    }

    pub fn set_expired(&self, dataset: LogDataset, rows: u64) {
        self.expired.lock().insert(dataset, rows);
    }

    pub fn expired(&self, dataset: LogDataset) -> u64 {
        self.expired.lock().get(&dataset).copied().unwrap_or(0)
    }

    pub fn store_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst) + self.count_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> DbResult<()> {
        if self.fail_queries {
            return Err(DbError::Internal("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LogRepo for FakeLogRepo {
    async fn create(&self, dataset: LogDataset, input: CreateLogEntry) -> DbResult<LogEntry> {
        self.check()?;
        *self.expired.lock().entry(dataset).or_default() += 1;
        Ok(LogEntry {
            id: Uuid::new_v4(),
            created_at: input.created_at.unwrap_or_else(Utc::now),
            url: input.url,
            sent_to: input.sent_to,
            referrer: input.referrer,
            user_agent: input.user_agent,
            ip_address: input.ip_address,
            http_code: input.http_code,
        })
    }

    async fn count(&self, dataset: LogDataset) -> DbResult<u64> {
        self.check()?;
        Ok(self.expired(dataset))
    }

    async fn delete_expired(
        &self,
        dataset: LogDataset,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> DbResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.delete_cutoffs.lock().push((dataset, cutoff));
        self.check()?;
        let mut expired = self.expired.lock();
        let rows = expired.entry(dataset).or_default();
        let deleted = (*rows).min(limit);
        *rows -= deleted;
        Ok(deleted)
    }

    async fn count_expired(
        &self,
        dataset: LogDataset,
        cutoff: DateTime<Utc>,
        cap: u64,
    ) -> DbResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.count_cutoffs.lock().push((dataset, cutoff));
        self.check()?;
        Ok(self.expired(dataset).min(cap))
    }

    async fn compact(&self, dataset: LogDataset) -> DbResult<()> {
        if let Some(gate) = &self.compaction_gate {
            gate.notified().await;
        }
        if self.fail_compaction {
            return Err(DbError::Internal("table is locked".into()));
        }
        self.compactions.lock().push(dataset);
        Ok(())
    }
}

/// Flag store whose backend is unreachable.
pub struct UnavailableStateStore;

#[async_trait]
impl RetentionStateStore for UnavailableStateStore {
    async fn load(&self) -> CacheResult<Option<RetentionState>> {
        Err(CacheError::Internal("cache unavailable".into()))
    }

    async fn save(&self, _state: &RetentionState, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::Internal("cache unavailable".into()))
    }

    async fn clear(&self) -> CacheResult<()> {
        Err(CacheError::Internal("cache unavailable".into()))
    }
}
