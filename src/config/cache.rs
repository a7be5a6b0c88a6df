use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Cache configuration.
///
/// The cache persists the aggressive-mode flag between flush runs. With
/// `memory`, the flag lives only as long as the process; use `redis` when
/// several processes flush the same database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CacheConfig {
    /// In-memory cache. Data is lost on restart.
    Memory(MemoryCacheConfig),

    /// Redis cache. Shared across processes.
    Redis(RedisCacheConfig),
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory(MemoryCacheConfig::default())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CacheConfig::Memory(_) => Ok(()),
            CacheConfig::Redis(c) => c.validate(),
        }
    }

    /// Whether a value written by one process is visible to the next one.
    pub fn is_shared(&self) -> bool {
        matches!(self, CacheConfig::Redis(_))
    }
}

/// In-memory cache configuration. Takes no options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryCacheConfig {}

/// Redis cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    /// Format: redis://[user:password@]host:port[/database]
    pub url: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_redis_timeout")]
    pub connect_timeout_secs: u64,

    /// Key prefix for all cache keys.
    /// Set a distinct prefix per tenant when several tenants share one Redis.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisCacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Validation("Redis URL cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_redis_timeout() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "rlr:".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory() {
        let config = CacheConfig::default();
        assert!(matches!(config, CacheConfig::Memory(_)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_redis() {
        let config: CacheConfig = toml::from_str(
            r#"
            type = "redis"
            url = "redis://localhost:6379"
            key_prefix = "tenant-a:"
        "#,
        )
        .unwrap();

        let CacheConfig::Redis(redis) = config else {
            panic!("expected redis config");
        };
        assert_eq!(redis.key_prefix, "tenant-a:");
        assert_eq!(redis.connect_timeout_secs, 5);
    }

    #[test]
    fn test_memory_is_not_shared() {
        assert!(!CacheConfig::default().is_shared());

        let config: CacheConfig = toml::from_str(r#"type = "memory""#).unwrap();
        assert!(!config.is_shared());
    }

    #[test]
    fn test_redis_is_shared() {
        let config: CacheConfig = toml::from_str(
            r#"
            type = "redis"
            url = "redis://localhost:6379"
        "#,
        )
        .unwrap();
        assert!(config.is_shared());
    }

    #[test]
    fn test_memory_rejects_old_options() {
        let result: Result<CacheConfig, _> = toml::from_str(
            r#"
            type = "memory"
            max_entries = 10
        "#,
        );
        assert!(result.is_err());
    }
}
