//! Playback telemetry reporter.
//!
//! Shapes feed lifecycle and quality signals into named events for the
//! host's [`TelemetrySink`]. Every call is fire-and-forget.

use bridge_traits::{BackendFailure, MediaDescriptor, TelemetryProperties, TelemetrySink};
use std::sync::Arc;
use tracing::trace;

pub const FEED_ITEM_IMPRESSION: &str = "feed_item_impression";
pub const PLAY_START_REQUEST: &str = "play_start_request";
pub const FIRST_FRAME_RENDERED: &str = "first_frame_rendered";
pub const TIME_TO_FIRST_FRAME_MS: &str = "time_to_first_frame_ms";
pub const PLAYBACK_PROGRESS: &str = "playback_progress";
pub const REBUFFER_START: &str = "rebuffer_start";
pub const REBUFFER_END: &str = "rebuffer_end";
pub const REBUFFER_TOTAL_MS: &str = "rebuffer_total_ms";
pub const PLAYBACK_ERROR: &str = "playback_error";
pub const PLAYBACK_ENDED: &str = "playback_ended";
pub const PRELOAD_SCHEDULED: &str = "preload_scheduled";
pub const PRELOAD_COMPLETED: &str = "preload_completed";
pub const PRELOAD_CANCELED: &str = "preload_canceled";
pub const CACHE_HIT: &str = "cache_hit";
pub const CACHE_MISS: &str = "cache_miss";

/// Why playback of an item was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStartReason {
    /// The item became active through a feed index change.
    IndexChange,
    /// The item became active by promoting the prepared slot.
    Swap,
    /// The item ended and restarted.
    Loop,
}

impl PlayStartReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayStartReason::IndexChange => "index_change",
            PlayStartReason::Swap => "swap",
            PlayStartReason::Loop => "loop",
        }
    }
}

/// Why a preparation was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadCancelReason {
    /// The feed was replaced underneath the prepared slot.
    FeedUpdate,
    /// The prepared slot was retargeted before it was used.
    Retarget,
    /// The prepared backend reported a failure.
    Error,
    Released,
}

impl PreloadCancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadCancelReason::FeedUpdate => "feed_update",
            PreloadCancelReason::Retarget => "retarget",
            PreloadCancelReason::Error => "error",
            PreloadCancelReason::Released => "released",
        }
    }
}

/// Telemetry façade used by the coordinator.
#[derive(Clone)]
pub struct PlaybackReporter {
    sink: Arc<dyn TelemetrySink>,
}

impl PlaybackReporter {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    fn props(descriptor: &MediaDescriptor) -> TelemetryProperties {
        let mut props = TelemetryProperties::new();
        props.insert("descriptor_id".to_string(), descriptor.id.clone());
        props
    }

    fn event(&self, name: &str, props: TelemetryProperties) {
        trace!(target: "telemetry", event = name, ?props);
        self.sink.event(name, &props);
    }

    fn timing(&self, name: &str, duration_ms: u64, props: TelemetryProperties) {
        trace!(target: "telemetry", timing = name, duration_ms, ?props);
        self.sink.timing(name, duration_ms, &props);
    }

    pub fn impression(&self, descriptor: &MediaDescriptor, index: usize) {
        let mut props = Self::props(descriptor);
        props.insert("index".to_string(), index.to_string());
        self.event(FEED_ITEM_IMPRESSION, props);
    }

    pub fn play_start_request(
        &self,
        descriptor: &MediaDescriptor,
        index: usize,
        reason: PlayStartReason,
    ) {
        let mut props = Self::props(descriptor);
        props.insert("index".to_string(), index.to_string());
        props.insert("reason".to_string(), reason.as_str().to_string());
        self.event(PLAY_START_REQUEST, props);
    }

    /// Emits `first_frame_rendered` and the `time_to_first_frame_ms` timing.
    pub fn first_frame(&self, descriptor: &MediaDescriptor, latency_ms: u64) {
        self.event(FIRST_FRAME_RENDERED, Self::props(descriptor));
        self.timing(TIME_TO_FIRST_FRAME_MS, latency_ms, Self::props(descriptor));
    }

    pub fn progress(&self, descriptor: &MediaDescriptor, position_secs: u64) {
        let mut props = Self::props(descriptor);
        props.insert("position_s".to_string(), position_secs.to_string());
        self.event(PLAYBACK_PROGRESS, props);
    }

    pub fn rebuffer_start(&self, descriptor: &MediaDescriptor) {
        self.event(REBUFFER_START, Self::props(descriptor));
    }

    /// Emits `rebuffer_end` and the `rebuffer_total_ms` timing.
    pub fn rebuffer_end(&self, descriptor: &MediaDescriptor, stalled_ms: u64) {
        let mut props = Self::props(descriptor);
        props.insert("duration_ms".to_string(), stalled_ms.to_string());
        self.event(REBUFFER_END, props);
        self.timing(REBUFFER_TOTAL_MS, stalled_ms, Self::props(descriptor));
    }

    pub fn playback_error(&self, descriptor: &MediaDescriptor, failure: &BackendFailure) {
        let mut props = Self::props(descriptor);
        props.insert("category".to_string(), failure.kind.as_str().to_string());
        if let Some(code) = failure.code {
            props.insert("code".to_string(), code.to_string());
        }
        props.insert("message".to_string(), failure.message.clone());
        self.event(PLAYBACK_ERROR, props);
    }

    pub fn playback_ended(&self, descriptor: &MediaDescriptor) {
        self.event(PLAYBACK_ENDED, Self::props(descriptor));
    }

    pub fn preload_scheduled(&self, descriptor: &MediaDescriptor, distance: usize, mode: &str) {
        let mut props = Self::props(descriptor);
        props.insert("distance".to_string(), distance.to_string());
        props.insert("mode".to_string(), mode.to_string());
        self.event(PRELOAD_SCHEDULED, props);
    }

    pub fn preload_completed(&self, descriptor: &MediaDescriptor, elapsed_ms: u64) {
        let mut props = Self::props(descriptor);
        props.insert("elapsed_ms".to_string(), elapsed_ms.to_string());
        self.event(PRELOAD_COMPLETED, props);
    }

    pub fn preload_canceled(&self, descriptor: &MediaDescriptor, reason: PreloadCancelReason) {
        let mut props = Self::props(descriptor);
        props.insert("reason".to_string(), reason.as_str().to_string());
        self.event(PRELOAD_CANCELED, props);
    }

    pub fn cache_hit(&self, descriptor: &MediaDescriptor) {
        self.event(CACHE_HIT, Self::props(descriptor));
    }

    pub fn cache_miss(&self, descriptor: &MediaDescriptor) {
        self.event(CACHE_MISS, Self::props(descriptor));
    }
}

impl std::fmt::Debug for PlaybackReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackReporter").finish_non_exhaustive()
    }
}
