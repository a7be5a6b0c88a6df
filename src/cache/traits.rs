use std::time::Duration;

use async_trait::async_trait;

use super::error::{CacheError, CacheResult};

#[async_trait]
pub trait Cache: Send + Sync {
    /// Get raw bytes from cache
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set raw bytes in cache with TTL. A zero TTL stores without expiry.
    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Decode a JSON value read from the cache.
pub fn decode_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
}

/// Encode a value as JSON for storage in the cache.
pub fn encode_json<T: serde::Serialize>(value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
}
