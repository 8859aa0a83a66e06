//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges from a [`CoreConfig`] into the two
//! playback components: the download cache and the feed coordinator that
//! resolves its items through that cache. Desktop apps typically enable the
//! `desktop-shims` feature, which opens a SQLite reference store under the
//! cache directory when the host did not supply one.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{MediaBackendFactory, ReferenceStore};
use core_playback::{
    CacheConfig, DownloadCacheManager, FeedConfig, FeedPlaybackCoordinator,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
///
/// Owns the feed coordinator and the download cache it reads from. Both share
/// one event bus.
pub struct FeedCore {
    coordinator: FeedPlaybackCoordinator,
    cache: DownloadCacheManager,
    event_bus: EventBus,
}

impl FeedCore {
    pub fn coordinator(&self) -> &FeedPlaybackCoordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &DownloadCacheManager {
        &self.cache
    }

    /// Subscribe to playback and cache events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Release both backends. In-flight downloads keep running so a later
    /// session can pick the files up.
    pub async fn shutdown(&self) {
        self.coordinator.release().await;
        info!("Feed core shut down");
    }
}

impl std::fmt::Debug for FeedCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCore")
            .field("coordinator", &self.coordinator)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Build and initialize a [`FeedCore`].
///
/// Must run inside an async runtime. The cache index is loaded before the
/// coordinator exists, so the first configured item can already resolve to
/// a local file.
///
/// ```ignore
/// let config = CoreConfig::builder().cache_dir(dir).build()?;
/// let core = core_service::bootstrap(config, &factory).await?;
/// core.coordinator().set_feed(items).await?;
/// ```
#[instrument(skip_all, fields(cache_dir = ?config.cache_dir))]
pub async fn bootstrap(
    config: CoreConfig,
    backend_factory: &dyn MediaBackendFactory,
) -> Result<FeedCore> {
    config.validate()?;
    let references = open_reference_store(&config).await?;
    let event_bus = EventBus::new(config.event_buffer_size);

    let cache_config = CacheConfig::new().with_capacity(config.cache_capacity);
    let cache = DownloadCacheManager::new(
        cache_config,
        Arc::clone(&config.file_system),
        Arc::clone(&config.transport),
        references,
        Arc::clone(&config.clock),
        event_bus.clone(),
    );
    cache.initialize().await?;

    let feed_config = FeedConfig::new()
        .with_poll_interval(config.poll_interval)
        .with_progress_interval(config.progress_interval);
    let coordinator = FeedPlaybackCoordinator::new(
        feed_config,
        backend_factory,
        Arc::new(cache.clone()),
        Arc::clone(&config.telemetry_sink),
        Arc::clone(&config.clock),
        event_bus.clone(),
    )?;

    info!(capacity = config.cache_capacity, "Feed core ready");
    Ok(FeedCore {
        coordinator,
        cache,
        event_bus,
    })
}

#[cfg(feature = "desktop-shims")]
async fn open_reference_store(config: &CoreConfig) -> Result<Arc<dyn ReferenceStore>> {
    if let Some(store) = &config.reference_store {
        return Ok(Arc::clone(store));
    }

    let path = config.reference_db_path();
    let store = bridge_desktop::SqliteReferenceStore::new(path)
        .await
        .map_err(|e| CoreError::InitializationFailed(format!("reference store: {}", e)))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
async fn open_reference_store(config: &CoreConfig) -> Result<Arc<dyn ReferenceStore>> {
    config
        .reference_store
        .as_ref()
        .map(Arc::clone)
        .ok_or_else(|| CoreError::CapabilityMissing {
            capability: "ReferenceStore".to_string(),
            message: "inject a ReferenceStore or enable the 'desktop-shims' feature".to_string(),
        })
}
