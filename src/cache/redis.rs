use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::{
    error::{CacheError, CacheResult},
    traits::Cache,
};
use crate::config::RedisCacheConfig;

/// Redis-backed cache, shared by every process pointed at the same server.
pub struct RedisCache {
    client: redis::Client,
    key_prefix: String,
    connect_timeout: Duration,
}

impl RedisCache {
    pub fn from_config(config: &RedisCacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            key_prefix: config.key_prefix.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn get_connection(&self) -> CacheResult<MultiplexedConnection> {
        tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            CacheError::Internal(format!(
                "Timed out connecting to Redis after {}s",
                self.connect_timeout.as_secs()
            ))
        })?
        .map_err(CacheError::from)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let data: Option<Vec<u8>> = redis::cmd("GET")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;

        Ok(data)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        // SETEX takes whole seconds; round sub-second TTLs up so they still expire
        let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        if secs > 0 {
            let _: () = redis::cmd("SETEX")
                .arg(&full_key)
                .arg(secs)
                .arg(value)
                .query_async(&mut conn)
                .await?;
        } else {
            let _: () = redis::cmd("SET")
                .arg(&full_key)
                .arg(value)
                .query_async(&mut conn)
                .await?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let _: () = redis::cmd("DEL")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
