//! Telemetry sink consumed by the playback core.
//!
//! Calls are fire-and-forget: implementations must not block and must
//! swallow their own failures.

use std::collections::BTreeMap;

/// Structured properties attached to an event or timing.
pub type TelemetryProperties = BTreeMap<String, String>;

pub trait TelemetrySink: Send + Sync {
    fn event(&self, name: &str, properties: &TelemetryProperties);

    fn timing(&self, name: &str, duration_ms: u64, properties: &TelemetryProperties);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Default)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn event(&self, _name: &str, _properties: &TelemetryProperties) {}

    fn timing(&self, _name: &str, _duration_ms: u64, _properties: &TelemetryProperties) {}
}
