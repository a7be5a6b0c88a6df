//! Persisted aggressive-mode flag.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheKeys, CacheResult, decode_json, encode_json};

/// Aggressive-mode flag as stored between flushes.
///
/// A missing state, or one whose `expires_at` is not in the future, means
/// normal mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionState {
    pub aggressive: bool,
    pub expires_at: DateTime<Utc>,
}

impl RetentionState {
    pub fn aggressive_until(expires_at: DateTime<Utc>) -> Self {
        Self {
            aggressive: true,
            expires_at,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.aggressive && self.expires_at > now
    }
}

#[async_trait]
pub trait RetentionStateStore: Send + Sync {
    async fn load(&self) -> CacheResult<Option<RetentionState>>;

    /// Store the state. `ttl` bounds how long the backend keeps it.
    async fn save(&self, state: &RetentionState, ttl: Duration) -> CacheResult<()>;

    async fn clear(&self) -> CacheResult<()>;
}

/// Stores the flag as JSON under a fixed cache key.
pub struct CacheStateStore {
    cache: Arc<dyn Cache>,
}

impl CacheStateStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RetentionStateStore for CacheStateStore {
    async fn load(&self) -> CacheResult<Option<RetentionState>> {
        match self.cache.get_bytes(CacheKeys::retention_state()).await? {
            Some(bytes) => Ok(Some(decode_json(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &RetentionState, ttl: Duration) -> CacheResult<()> {
        let bytes = encode_json(state)?;
        self.cache
            .set_bytes(CacheKeys::retention_state(), &bytes, ttl)
            .await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.cache.delete(CacheKeys::retention_state()).await
    }
}
