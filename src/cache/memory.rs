use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{error::CacheResult, traits::Cache};

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// In-memory cache implementation using DashMap for concurrent access.
///
/// Values live only as long as the process. A restarted service therefore
/// always starts its first flush in normal mode.
#[derive(Default)]
pub struct MemoryCache {
    data: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if let Some(entry) = self.data.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove(key);
                return Ok(None);
            }

            Ok(Some(entry.data.clone()))
        } else {
            Ok(None)
        }
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let expires_at = if !ttl.is_zero() {
            Some(Instant::now() + ttl)
        } else {
            None
        };

        self.data.insert(
            key.to_string(),
            CacheEntry {
                data: value.to_vec(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.remove(key);
        Ok(())
    }
}
