//! # Feed Playback Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Feed coordinator configuration.
///
/// Controls quality polling cadence and how the prepared slot is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Interval of the backend status poll that drives first-frame and
    /// rebuffer detection.
    ///
    /// Default: 200ms.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Minimum position spacing between `playback_progress` reports.
    ///
    /// Default: 1 second.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,

    /// Promote the prepared slot when it already holds the requested index.
    /// When disabled every index change reloads the active slot.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub use_prepared_slot: bool,

    /// Pre-roll the prepared backend once it reports ready.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub preroll_prepared: bool,

    /// Create both backends with volume at zero.
    ///
    /// Default: false.
    #[serde(default)]
    pub start_muted: bool,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            progress_interval: default_progress_interval(),
            use_prepared_slot: true,
            preroll_prepared: true,
            start_muted: false,
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_prepared_slot(mut self, enabled: bool) -> Self {
        self.use_prepared_slot = enabled;
        self
    }

    pub fn with_preroll(mut self, enabled: bool) -> Self {
        self.preroll_prepared = enabled;
        self
    }

    pub fn with_start_muted(mut self, muted: bool) -> Self {
        self.start_muted = muted;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than 0".to_string());
        }

        if self.progress_interval.is_zero() {
            return Err("progress_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
