pub struct CacheKeys;

impl CacheKeys {
    /// Persisted aggressive-mode flag: retention:aggressive
    ///
    /// Redis deployments add the configured `key_prefix` in front.
    pub fn retention_state() -> &'static str {
        "retention:aggressive"
    }
}
