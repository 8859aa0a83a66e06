//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that is implemented differently per platform (desktop,
//! iOS, Android).
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaBackend`](media::MediaBackend) - One native player instance
//! - [`MediaBackendFactory`](media::MediaBackendFactory) - Creates player instances
//! - [`RenderSurface`](media::RenderSurface) - UI-owned rendering target
//!
//! ### Networking & Storage
//! - [`DownloadTransport`](transfer::DownloadTransport) - Whole-file native downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Cache directory file operations
//! - [`ReferenceStore`](storage::ReferenceStore) - Persisted cache references
//!
//! ### Utilities
//! - [`TelemetrySink`](telemetry::TelemetrySink) - Fire-and-forget events and timings
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Storage, transport, telemetry |
//! | iOS      | Host app            | 📋 Planned |
//! | Android  | Host app            | 📋 Planned |
//!
//! Media backends and render surfaces always come from the host; there is no
//! desktop default.
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let transport = config.transport
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "DownloadTransport".to_string(),
//!         message: "No download transport provided. \
//!                  Desktop: enable the desktop-shims feature. \
//!                  Mobile: inject the platform-native adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! Fallible bridge calls return [`BridgeError`](error::BridgeError).
//! Implementations should convert platform errors into it and keep file paths
//! and URLs in the message. Telemetry is the exception: it never reports
//! failures back to the caller.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc<dyn Trait>`.

pub mod error;
pub mod media;
pub mod storage;
pub mod telemetry;
pub mod time;
pub mod transfer;

pub use error::BridgeError;

// Re-export commonly used types
pub use media::{
    BackendFailure, BackendId, BackendStatus, ContainerHint, FailureKind, MediaBackend,
    MediaBackendFactory, MediaDescriptor, MediaSource, PlayableItem, RenderSurface, SurfaceId,
};
pub use storage::{AssetReference, FileMetadata, FileSystemAccess, ReferenceStore};
pub use telemetry::{NoopTelemetrySink, TelemetryProperties, TelemetrySink};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
pub use transfer::{DownloadTransport, TransferOutput, TransferRequest};
