//! Time-related operations.
//!
//! ```rust
//! use core_async::time::{interval, Duration};
//!
//! # async fn example() {
//! let mut ticker = interval(Duration::from_millis(200));
//! ticker.tick().await;
//! # }
//! ```

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
pub use tokio::time::{
    error::Elapsed, interval, sleep, timeout, Instant, Interval, MissedTickBehavior,
};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
