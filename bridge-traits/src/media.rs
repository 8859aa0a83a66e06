//! Media backend bridge traits and the value types shared with them.
//!
//! The core never decodes or renders video itself. Hosts hand it a
//! [`MediaBackendFactory`] producing native player instances and register
//! [`RenderSurface`]s owned by their UI layer; the feed coordinator only
//! drives those through the small capability surface defined here.

use crate::error::Result;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Length of the hex prefix used for cache keys.
const CACHE_KEY_LEN: usize = 16;

/// Container format hint supplied by the feed backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerHint {
    Mp4,
    Hls,
    Dash,
    #[default]
    Unknown,
}

impl ContainerHint {
    /// File extension used when the asset is stored on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerHint::Mp4 => "mp4",
            ContainerHint::Hls => "m3u8",
            ContainerHint::Dash => "mpd",
            ContainerHint::Unknown => "bin",
        }
    }
}

/// Immutable description of one playable feed item.
///
/// Feed position is not part of the descriptor; the coordinator tracks it as
/// an index into the current feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub container_hint: ContainerHint,
}

impl MediaDescriptor {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            headers: HashMap::new(),
            container_hint: ContainerHint::Unknown,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_container_hint(mut self, hint: ContainerHint) -> Self {
        self.container_hint = hint;
        self
    }

    /// Stable key derived from the source URI.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.uri.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..CACHE_KEY_LEN].to_string()
    }

    /// Logical file name under which the asset is cached.
    pub fn asset_title(&self) -> String {
        format!("{}.{}", self.cache_key(), self.container_hint.extension())
    }
}

/// Where a backend should read the media from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Fully downloaded asset in the local cache.
    LocalFile { path: PathBuf },
    /// Remote stream fetched by the native engine.
    Remote {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl MediaSource {
    pub fn remote(descriptor: &MediaDescriptor) -> Self {
        MediaSource::Remote {
            url: descriptor.uri.clone(),
            headers: descriptor.headers.clone(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaSource::LocalFile { .. })
    }
}

/// Item handed to [`MediaBackend::replace_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableItem {
    pub descriptor: MediaDescriptor,
    pub source: MediaSource,
}

impl PlayableItem {
    pub fn new(descriptor: MediaDescriptor, source: MediaSource) -> Self {
        Self { descriptor, source }
    }
}

/// Identity of one native player instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(Uuid);

impl BackendId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BackendId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of one render surface, assigned by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(String);

impl SurfaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broad classification of a native playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Decoder,
    Source,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Decoder => "decoder",
            FailureKind::Source => "source",
            FailureKind::Other => "other",
        }
    }
}

/// Unrecoverable error reported by a backend for its current item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub code: Option<i64>,
    pub message: String,
}

impl BackendFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

/// Observable state of a native player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    /// No item loaded.
    Idle,
    /// Item loaded and ready to render its first frame.
    Ready,
    /// Initial buffering of a freshly loaded item.
    Buffering,
    /// Playback requested but stalled waiting for data.
    WaitingToPlay,
    Playing,
    Paused,
    /// Reached the end of the current item.
    Ended,
    Failed(BackendFailure),
}

/// One native player instance.
///
/// Control calls issue work to the native engine and return; outcomes are
/// reported through [`MediaBackend::status_notifications`] and the
/// pull-based [`MediaBackend::status`].
#[async_trait::async_trait]
pub trait MediaBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Load `item`, or unload the current item when `None`.
    async fn replace_item(&self, item: Option<PlayableItem>) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek(&self, position: Duration) -> Result<()>;

    /// Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Start buffering the loaded item without playing it.
    async fn preroll(&self) -> Result<()> {
        Ok(())
    }

    async fn status(&self) -> BackendStatus;

    async fn current_position(&self) -> Duration;

    /// Push channel of status transitions. Each call returns a fresh
    /// subscription.
    fn status_notifications(&self) -> BoxStream<'static, BackendStatus>;

    /// Tear down native resources. Further calls are undefined.
    async fn release(&self) -> Result<()>;
}

impl fmt::Debug for dyn MediaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBackend").field("id", &self.id()).finish()
    }
}

/// Creates native player instances on demand.
pub trait MediaBackendFactory: Send + Sync {
    fn create_backend(&self) -> Result<Arc<dyn MediaBackend>>;
}

/// Rendering target owned by the UI layer.
///
/// A surface shows at most one backend at a time; callers detach the prior
/// attachment before attaching elsewhere.
pub trait RenderSurface: Send + Sync {
    fn id(&self) -> SurfaceId;

    fn attach(&self, backend: Arc<dyn MediaBackend>) -> Result<()>;

    fn detach(&self);

    /// Backend currently rendered by this surface, if any.
    fn attached_backend(&self) -> Option<BackendId>;
}
