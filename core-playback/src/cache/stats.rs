//! Cache statistics

use serde::{Deserialize, Serialize};

/// Point-in-time counters for the download cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Assets currently in the index
    pub entries: usize,

    /// Configured maximum number of assets
    pub capacity: usize,

    /// Downloads that have not reached a terminal state
    pub in_flight: usize,

    /// Local lookups answered from disk
    pub hits: u64,

    /// Local lookups that found nothing usable
    pub misses: u64,

    /// Assets removed to stay within capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served locally, `0.0` when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    pub fn is_full(&self) -> bool {
        self.entries >= self.capacity
    }
}
