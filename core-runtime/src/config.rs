//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] holding every bridge and setting the
//! feed coordinator and download cache need. `build()` fails fast when a
//! required bridge is missing.
//!
//! ## Required Dependencies
//!
//! - `FileSystemAccess` - Cache directory operations (desktop default: tokio fs)
//! - `DownloadTransport` - Whole-file downloads (desktop default: reqwest)
//! - `ReferenceStore` - Persisted cache references (desktop default: SQLite,
//!   opened asynchronously by the service at `<cache_dir>/references.db`)
//!
//! ## Optional Dependencies
//!
//! - `TelemetrySink` - Defaults to `tracing` output on desktop, no-op elsewhere
//! - `Clock` - Defaults to the system clock
//! - `LoggerSink` - Host log forwarding
//!
//! Media backends are not part of the configuration; the host passes its
//! `MediaBackendFactory` to the service directly.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .cache_capacity(10)
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, DownloadTransport, FileSystemAccess, LoggerSink, ReferenceStore, SystemClock,
    TelemetrySink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default number of assets kept in the download cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;
/// Default quality polling interval for the feed coordinator.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Default minimum spacing between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

const MAX_CACHE_CAPACITY: usize = 1_000;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Root directory for cached media and staging files
    pub cache_dir: PathBuf,

    /// Maximum number of cached assets
    pub cache_capacity: usize,

    /// Interval of the coordinator's backend status poll
    pub poll_interval: Duration,

    /// Minimum spacing between `playback_progress` reports
    pub progress_interval: Duration,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,

    pub file_system: Arc<dyn FileSystemAccess>,

    pub transport: Arc<dyn DownloadTransport>,

    /// `None` only with `desktop-shims`, where the service opens the SQLite
    /// default on bootstrap.
    pub reference_store: Option<Arc<dyn ReferenceStore>>,

    pub telemetry_sink: Arc<dyn TelemetrySink>,

    pub clock: Arc<dyn Clock>,

    pub logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_capacity", &self.cache_capacity)
            .field("poll_interval", &self.poll_interval)
            .field("progress_interval", &self.progress_interval)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("file_system", &"FileSystemAccess { ... }")
            .field("transport", &"DownloadTransport { ... }")
            .field(
                "reference_store",
                &self
                    .reference_store
                    .as_ref()
                    .map(|_| "ReferenceStore { ... }"),
            )
            .field("telemetry_sink", &"TelemetrySink { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Location of the default SQLite reference database.
    pub fn reference_db_path(&self) -> PathBuf {
        self.cache_dir.join("references.db")
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.cache_capacity == 0 {
            return Err(Error::Config(
                "Cache capacity must be at least 1 asset".to_string(),
            ));
        }

        if self.cache_capacity > MAX_CACHE_CAPACITY {
            return Err(Error::Config(format!(
                "Cache capacity exceeds maximum of {} assets",
                MAX_CACHE_CAPACITY
            )));
        }

        if self.poll_interval < Duration::from_millis(10) || self.poll_interval > Duration::from_secs(5) {
            return Err(Error::Config(
                "Poll interval must be between 10ms and 5s".to_string(),
            ));
        }

        if self.progress_interval.is_zero() {
            return Err(Error::Config(
                "Progress interval must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, desktop_default: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: ensure the 'desktop-shims' feature is enabled to use the default {}. \
             Mobile: inject the platform-native adapter.",
            capability, purpose, desktop_default
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(cache_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> =
        Arc::new(TokioFileSystem::with_cache_directory(cache_dir.to_path_buf()));
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_cache_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "cache file operations",
        "TokioFileSystem",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_transport(cache_dir: &std::path::Path) -> Result<Arc<dyn DownloadTransport>> {
    use bridge_desktop::ReqwestTransport;

    let transport = ReqwestTransport::new(cache_dir.join("transfers")).map_err(|e| {
        Error::Internal(format!("Failed to initialize default DownloadTransport: {}", e))
    })?;
    let transport: Arc<dyn DownloadTransport> = Arc::new(transport);
    Ok(transport)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_transport(_cache_dir: &std::path::Path) -> Result<Arc<dyn DownloadTransport>> {
    Err(capability_missing(
        "DownloadTransport",
        "downloading feed media",
        "ReqwestTransport",
    ))
}

#[cfg(feature = "desktop-shims")]
fn check_reference_store(store: Option<Arc<dyn ReferenceStore>>) -> Result<Option<Arc<dyn ReferenceStore>>> {
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn check_reference_store(store: Option<Arc<dyn ReferenceStore>>) -> Result<Option<Arc<dyn ReferenceStore>>> {
    match store {
        Some(store) => Ok(Some(store)),
        None => Err(capability_missing(
            "ReferenceStore",
            "persisting cache references",
            "SqliteReferenceStore",
        )),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_telemetry() -> Arc<dyn TelemetrySink> {
    Arc::new(bridge_desktop::TracingTelemetrySink::new())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_telemetry() -> Arc<dyn TelemetrySink> {
    Arc::new(bridge_traits::NoopTelemetrySink)
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_capacity: Option<usize>,
    poll_interval: Option<Duration>,
    progress_interval: Option<Duration>,
    event_buffer_size: Option<usize>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    transport: Option<Arc<dyn DownloadTransport>>,
    reference_store: Option<Arc<dyn ReferenceStore>>,
    telemetry_sink: Option<Arc<dyn TelemetrySink>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl CoreConfigBuilder {
    /// Sets the cache root directory (required).
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the maximum number of cached assets (default 10).
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn DownloadTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn reference_store(mut self, store: Arc<dyn ReferenceStore>) -> Self {
        self.reference_store = Some(store);
        self
    }

    pub fn telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the cache directory is missing or a setting
    ///   is out of range
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and
    ///   no desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&cache_dir)?,
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => provide_default_transport(&cache_dir)?,
        };

        let reference_store = check_reference_store(self.reference_store)?;

        let config = CoreConfig {
            cache_dir,
            cache_capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            progress_interval: self.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            file_system,
            transport,
            reference_store,
            telemetry_sink: self
                .telemetry_sink
                .unwrap_or_else(provide_default_telemetry),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
        };

        config.validate()?;

        Ok(config)
    }
}
