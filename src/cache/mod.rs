mod error;
mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod traits;

use std::sync::Arc;

pub use error::{CacheError, CacheResult};
pub use keys::CacheKeys;
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis::RedisCache;
pub use traits::{Cache, decode_json, encode_json};

use crate::config::CacheConfig;

/// Build the cache backend selected in configuration.
pub fn build_cache(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    match config {
        CacheConfig::Memory(_) => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "redis")]
        CacheConfig::Redis(cfg) => {
            tracing::debug!(prefix = %cfg.key_prefix, "Using Redis cache");
            Ok(Arc::new(RedisCache::from_config(cfg)?))
        }
        #[cfg(not(feature = "redis"))]
        CacheConfig::Redis(_) => Err(CacheError::NotConfigured),
    }
}
