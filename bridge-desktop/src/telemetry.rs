//! Telemetry sink that forwards to `tracing`

use bridge_traits::telemetry::{TelemetryProperties, TelemetrySink};
use tracing::info;

/// Emits every event and timing as an `info` record under the
/// `telemetry` target, for desktop builds without an analytics pipeline.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetrySink;

impl TracingTelemetrySink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for TracingTelemetrySink {
    fn event(&self, name: &str, properties: &TelemetryProperties) {
        info!(target: "telemetry", event = name, properties = ?properties, "event");
    }

    fn timing(&self, name: &str, duration_ms: u64, properties: &TelemetryProperties) {
        info!(target: "telemetry", timing = name, duration_ms, properties = ?properties, "timing");
    }
}
