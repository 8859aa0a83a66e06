//! Cache configuration

use std::time::Duration;

/// Default number of assets kept on disk.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default number of prefetch hints remembered.
pub const DEFAULT_PREFETCH_HINT_LIMIT: usize = 32;

/// Configuration for the download cache manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached assets (default: 10)
    pub capacity: usize,

    /// Directory for finished assets, relative to the host cache directory
    pub cache_directory: String,

    /// Directory for in-progress moves, relative to `cache_directory`
    pub staging_directory: String,

    /// Upper bound on a single transfer (default: 300s)
    pub transfer_timeout: Duration,

    /// Prefetch hints kept before the oldest is forgotten (default: 32)
    pub prefetch_hint_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cache_directory: "video-playback-cache".to_string(),
            staging_directory: "staging".to_string(),
            transfer_timeout: Duration::from_secs(300),
            prefetch_hint_limit: DEFAULT_PREFETCH_HINT_LIMIT,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    pub fn with_staging_directory(mut self, dir: impl Into<String>) -> Self {
        self.staging_directory = dir.into();
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_prefetch_hint_limit(mut self, limit: usize) -> Self {
        self.prefetch_hint_limit = limit;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be at least 1".to_string());
        }

        if self.cache_directory.is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if self.staging_directory.is_empty() {
            return Err("staging_directory cannot be empty".to_string());
        }

        if self.transfer_timeout.is_zero() {
            return Err("transfer_timeout must be greater than zero".to_string());
        }

        if self.prefetch_hint_limit == 0 {
            return Err("prefetch_hint_limit must be at least 1".to_string());
        }

        Ok(())
    }
}
