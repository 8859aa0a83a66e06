//! # Download Cache Manager
//!
//! Downloads remote feed media to local files and keeps the most recently
//! used assets on disk.
//!
//! - Single-flight: one transfer per URL, all callers share its result
//! - Transfers land in a staging directory before a rename into place
//! - LRU eviction at a fixed asset count
//! - References persisted through the host [`ReferenceStore`]
//!
//! Index and task maps live behind one mutex that is never held across an
//! await; file and network I/O happen outside it.

use crate::cache::{
    config::CacheConfig,
    index::{CacheEntry, CacheIndex},
    stats::CacheStats,
    task::{await_waiter, resolve_waiters, DownloadState, DownloadTask},
};
use crate::error::{CacheError, CacheResult};
use crate::feed::AssetResolver;
use bridge_traits::{
    Clock, DownloadTransport, FileSystemAccess, MediaDescriptor, MediaSource, ReferenceStore,
    TransferOutput, TransferRequest,
};
use core_async::sync::CancellationToken;
use core_async::time::timeout;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::{self, Either};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where a feed item can be played from right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// Fully downloaded file.
    Cached(PathBuf),
    /// Not on disk yet, but known to the cache; stream from the source.
    Streaming { url: String },
}

#[derive(Debug, Clone)]
struct CacheDirs {
    assets: PathBuf,
    staging: PathBuf,
}

struct CacheState {
    dirs: Option<CacheDirs>,
    index: CacheIndex,
    tasks: HashMap<String, DownloadTask>,
    /// url -> asset title registered by `prefetch`, oldest hint first out
    prefetched: LruCache<String, String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn new(prefetch_hint_limit: usize) -> Self {
        let limit = NonZeroUsize::new(prefetch_hint_limit).unwrap_or(NonZeroUsize::MIN);
        Self {
            dirs: None,
            index: CacheIndex::default(),
            tasks: HashMap::new(),
            prefetched: LruCache::new(limit),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }
}

struct Inner {
    config: CacheConfig,
    fs: Arc<dyn FileSystemAccess>,
    transport: Arc<dyn DownloadTransport>,
    references: Arc<dyn ReferenceStore>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    state: Mutex<CacheState>,
}

/// Bounded, single-flight download cache.
///
/// Cloning is cheap and shares the same cache.
#[derive(Clone)]
pub struct DownloadCacheManager {
    inner: Arc<Inner>,
}

impl DownloadCacheManager {
    /// Create a new download cache manager.
    ///
    /// Call [`initialize`](Self::initialize) before starting downloads.
    pub fn new(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        transport: Arc<dyn DownloadTransport>,
        references: Arc<dyn ReferenceStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        let state = CacheState::new(config.prefetch_hint_limit);
        Self {
            inner: Arc::new(Inner {
                config,
                fs,
                transport,
                references,
                clock,
                event_bus,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Create cache directories and load persisted references.
    ///
    /// References are loaded oldest first, so recency order survives a
    /// restart. Anything beyond capacity is dropped.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> CacheResult<()> {
        info!("Initializing download cache");

        self.inner
            .config
            .validate()
            .map_err(CacheError::InvalidConfig)?;

        let root = self
            .inner
            .fs
            .get_cache_directory()
            .await
            .map_err(|e| CacheError::storage(&self.inner.config.cache_directory, e))?;
        let assets = root.join(&self.inner.config.cache_directory);
        let staging = assets.join(&self.inner.config.staging_directory);

        for dir in [&assets, &staging] {
            self.inner
                .fs
                .create_dir_all(dir)
                .await
                .map_err(|e| CacheError::storage(&dir.to_string_lossy(), e))?;
        }

        let mut references = self
            .inner
            .references
            .list_references()
            .await
            .map_err(|e| CacheError::storage("references", e))?;
        references.sort_by(|a, b| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then_with(|| a.asset_title.cmp(&b.asset_title))
        });

        let overflow = {
            let mut state = self.inner.state.lock();
            for reference in references {
                state.index.insert(CacheEntry::from(reference));
            }
            let mut overflow = Vec::new();
            while state.index.len() > self.inner.config.capacity {
                if let Some(victim) = state.index.pop_lru() {
                    overflow.push(victim);
                }
            }
            state.dirs = Some(CacheDirs { assets, staging });
            info!(entries = state.index.len(), "Loaded cache index");
            overflow
        };

        for victim in overflow {
            self.inner.purge_entry(&victim).await;
        }

        Ok(())
    }

    /// Download `url` into the cache as `asset_title` and return its path.
    ///
    /// Concurrent calls for the same URL share one transfer and receive the
    /// same result.
    pub async fn start_download(&self, url: &str, asset_title: &str) -> CacheResult<PathBuf> {
        self.start_transfer(TransferRequest::new(url, asset_title))
            .await
    }

    /// Download a feed item, forwarding its request headers.
    pub async fn download_descriptor(&self, descriptor: &MediaDescriptor) -> CacheResult<PathBuf> {
        let request = TransferRequest::new(&descriptor.uri, descriptor.asset_title())
            .with_headers(descriptor.headers.clone());
        self.start_transfer(request).await
    }

    #[instrument(skip(self, request), fields(url = %request.url, asset_title = %request.asset_title))]
    async fn start_transfer(&self, request: TransferRequest) -> CacheResult<PathBuf> {
        let url = request.url.clone();
        let (rx, driver) = {
            let mut state = self.inner.state.lock();
            let dirs = state.dirs.clone().ok_or(CacheError::NotInitialized)?;

            let joined = state
                .tasks
                .get_mut(&url)
                .filter(|task| !task.state.is_terminal())
                .map(DownloadTask::join);

            match joined {
                Some(rx) => {
                    debug!("Joining in-flight download");
                    (rx, None)
                }
                None => {
                    let mut task = DownloadTask::new(&url, &request.asset_title);
                    let rx = task.join();
                    let token = task.token.clone();
                    state.tasks.insert(url.clone(), task);
                    (rx, Some((token, dirs)))
                }
            }
        };

        if let Some((token, dirs)) = driver {
            let inner = Arc::clone(&self.inner);
            core_async::spawn(async move {
                inner.drive(request, token, dirs).await;
            });
        }

        await_waiter(rx, &url).await
    }

    /// Cancel the download for `url` and wait until it has settled.
    ///
    /// Unknown URLs are ignored.
    #[instrument(skip(self))]
    pub async fn cancel_download(&self, url: &str) {
        let rx = {
            let mut state = self.inner.state.lock();
            let Some(task) = state.tasks.get_mut(url) else {
                debug!("No download to cancel");
                return;
            };
            task.token.cancel();
            task.join()
        };
        let _ = await_waiter(rx, url).await;
    }

    /// Register `url` as a known source without downloading it.
    pub fn prefetch(&self, url: &str, asset_title: &str) {
        let mut state = self.inner.state.lock();
        if state.index.title_for_url(url).is_some() || state.tasks.contains_key(url) {
            return;
        }
        state
            .prefetched
            .put(url.to_string(), asset_title.to_string());
        debug!(url, asset_title, "Registered prefetch hint");
    }

    /// Ask the transport to favor the transfer for `url`.
    pub fn elevate_priority(&self, url: &str) {
        let known = self.inner.state.lock().tasks.contains_key(url);
        if known {
            self.inner.transport.elevate_priority(url);
        } else {
            debug!(url, "Priority hint for unknown download ignored");
        }
    }

    /// Synchronous lookup of a finished asset.
    ///
    /// A hit refreshes the entry's access time. An entry whose file is gone is
    /// purged and reported as unavailable.
    pub fn create_local_asset_if_available(&self, url: &str) -> Option<PathBuf> {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock();

        let Some(title) = state.index.title_for_url(url).map(str::to_string) else {
            state.misses += 1;
            return None;
        };

        let local_path = state.index.peek(&title)?.local_path.clone();
        if self.inner.fs.is_file(&local_path) {
            state.index.touch(&title, now);
            state.hits += 1;
            drop(state);

            let references = Arc::clone(&self.inner.references);
            spawn_detached(async move {
                if let Err(e) = references.touch_reference(&title, now).await {
                    warn!(asset_title = %title, error = %e, "Failed to refresh reference");
                }
            });
            return Some(local_path);
        }

        let stale = CacheError::StaleReference {
            asset_title: title.clone(),
        };
        warn!(url, category = stale.category(), error = %stale, "Purging cache reference");
        state.index.remove(&title);
        state.misses += 1;
        drop(state);

        let references = Arc::clone(&self.inner.references);
        spawn_detached(async move {
            if let Err(e) = references.remove_reference(&title).await {
                warn!(asset_title = %title, error = %e, "Failed to remove stale reference");
            }
        });
        None
    }

    /// Cached file if present, otherwise the source URL when a download is in
    /// flight or the URL was registered through [`prefetch`](Self::prefetch).
    pub fn local_or_inflight_asset(&self, url: &str) -> Option<AssetLocation> {
        if let Some(path) = self.create_local_asset_if_available(url) {
            return Some(AssetLocation::Cached(path));
        }

        let state = self.inner.state.lock();
        if state.tasks.contains_key(url) || state.prefetched.contains(url) {
            Some(AssetLocation::Streaming {
                url: url.to_string(),
            })
        } else {
            None
        }
    }

    /// Remove the file, index entry and reference for one asset.
    #[instrument(skip(self))]
    pub async fn clear_mappings_and_cache(&self, url: &str, asset_title: &str) -> CacheResult<()> {
        let (entry, final_path) = {
            let mut state = self.inner.state.lock();
            state.prefetched.pop(url);
            let final_path = state
                .dirs
                .as_ref()
                .map(|dirs| dirs.assets.join(asset_title));
            (state.index.remove(asset_title), final_path)
        };

        let mut paths: Vec<PathBuf> = entry.iter().map(|e| e.local_path.clone()).collect();
        if let Some(path) = final_path {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        for path in paths {
            self.inner
                .fs
                .remove_if_exists(&path)
                .await
                .map_err(|e| CacheError::storage(asset_title, e))?;
        }

        self.inner
            .references
            .remove_reference(asset_title)
            .await
            .map_err(|e| CacheError::storage(asset_title, e))?;

        self.inner.emit(CacheEvent::AssetCleared {
            url: url.to_string(),
            asset_title: asset_title.to_string(),
        });
        debug!("Cleared cached asset");
        Ok(())
    }

    /// Delete every asset left by a previous process and clear the index.
    ///
    /// Returns the number of references removed.
    #[instrument(skip(self))]
    pub async fn remove_all_bookmarked_assets_on_launch(&self) -> CacheResult<usize> {
        let references = self
            .inner
            .references
            .list_references()
            .await
            .map_err(|e| CacheError::storage("references", e))?;

        let (indexed, staging) = {
            let mut state = self.inner.state.lock();
            state.prefetched.clear();
            (
                state.index.drain(),
                state.dirs.as_ref().map(|dirs| dirs.staging.clone()),
            )
        };

        for entry in &indexed {
            if !references.iter().any(|r| r.asset_title == entry.asset_title) {
                self.inner.remove_file_quietly(&entry.local_path).await;
            }
        }

        for reference in &references {
            self.inner.remove_file_quietly(&reference.local_path).await;
            self.inner
                .references
                .remove_reference(&reference.asset_title)
                .await
                .map_err(|e| CacheError::storage(&reference.asset_title, e))?;
        }

        if let Some(staging) = staging {
            self.inner.sweep_staging(&staging).await;
        }

        info!(removed = references.len(), "Removed assets from previous launch");
        Ok(references.len())
    }

    pub fn download_state(&self, url: &str) -> Option<DownloadState> {
        self.inner.state.lock().tasks.get(url).map(|task| task.state)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        CacheStats {
            entries: state.index.len(),
            capacity: self.inner.config.capacity,
            in_flight: state.tasks.len(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    /// Asset titles from least to most recently used.
    pub fn cached_titles(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .index
            .entries_lru_first()
            .into_iter()
            .map(|entry| entry.asset_title.clone())
            .collect()
    }
}

impl std::fmt::Debug for DownloadCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCacheManager")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl AssetResolver for DownloadCacheManager {
    fn resolve(&self, descriptor: &MediaDescriptor) -> MediaSource {
        match self.create_local_asset_if_available(&descriptor.uri) {
            Some(path) => MediaSource::LocalFile { path },
            None => MediaSource::remote(descriptor),
        }
    }

    fn prefetch(&self, descriptor: &MediaDescriptor) {
        DownloadCacheManager::prefetch(self, &descriptor.uri, &descriptor.asset_title());
    }
}

impl Inner {
    fn emit(&self, event: CacheEvent) {
        self.event_bus.emit(CoreEvent::Cache(event)).ok();
    }

    fn set_state(&self, url: &str, new_state: DownloadState) {
        if let Some(task) = self.state.lock().tasks.get_mut(url) {
            task.state = new_state;
        }
    }

    async fn remove_file_quietly(&self, path: &Path) {
        if let Err(e) = self.fs.remove_if_exists(path).await {
            warn!(path = ?path, error = %e, "Failed to remove cache file");
        }
    }

    async fn sweep_staging(&self, staging: &Path) {
        match self.fs.list_directory(staging).await {
            Ok(leftovers) => {
                for path in leftovers {
                    self.remove_file_quietly(&path).await;
                }
            }
            Err(e) => debug!(path = ?staging, error = %e, "Staging directory not swept"),
        }
    }

    async fn purge_entry(&self, entry: &CacheEntry) {
        self.remove_file_quietly(&entry.local_path).await;
        if let Err(e) = self.references.remove_reference(&entry.asset_title).await {
            warn!(asset_title = %entry.asset_title, error = %e, "Failed to remove reference");
        }
    }

    /// Runs one download task to a terminal state.
    async fn drive(self: Arc<Self>, request: TransferRequest, token: CancellationToken, dirs: CacheDirs) {
        let url = request.url.clone();
        let asset_title = request.asset_title.clone();

        let result = self.run(request, &token, &dirs).await;
        match result {
            Ok(path) => self.complete(&url, &asset_title, path, &token).await,
            Err(err) => self.fail(&url, &asset_title, err),
        }
    }

    async fn run(
        &self,
        request: TransferRequest,
        token: &CancellationToken,
        dirs: &CacheDirs,
    ) -> CacheResult<PathBuf> {
        let url = request.url.clone();
        let asset_title = request.asset_title.clone();
        let cancelled = || CacheError::Cancelled { url: url.clone() };

        // A fresh fetch must not be shadowed by an older file.
        let stale = self.state.lock().index.remove(&asset_title);
        if let Some(stale) = stale {
            debug!(asset_title = %asset_title, "Invalidating previous cache entry");
            self.purge_entry(&stale).await;
        }

        self.set_state(&url, DownloadState::Downloading);
        self.emit(CacheEvent::DownloadStarted {
            url: url.clone(),
            asset_title: asset_title.clone(),
        });

        let transfer = timeout(self.config.transfer_timeout, self.transport.download(request));
        futures::pin_mut!(transfer);
        let cancel = token.cancelled();
        futures::pin_mut!(cancel);

        let output: TransferOutput = match future::select(cancel, transfer).await {
            Either::Left(_) => return Err(cancelled()),
            Either::Right((Err(_elapsed), _)) => {
                return Err(CacheError::Transfer {
                    url: url.clone(),
                    status: None,
                    message: format!(
                        "timed out after {}s",
                        self.config.transfer_timeout.as_secs()
                    ),
                })
            }
            Either::Right((Ok(result), _)) => result.map_err(|e| CacheError::transfer(&url, e))?,
        };
        debug!(bytes = output.bytes, "Transfer finished");

        self.set_state(&url, DownloadState::Staging);
        let staged = dirs.staging.join(format!("{}.part", uuid::Uuid::new_v4()));
        if let Err(e) = self.fs.move_file(&output.temp_path, &staged).await {
            self.remove_file_quietly(&output.temp_path).await;
            return Err(CacheError::storage(&asset_title, e));
        }

        if token.is_cancelled() {
            self.remove_file_quietly(&staged).await;
            return Err(cancelled());
        }

        let final_path = dirs.assets.join(&asset_title);
        if let Err(e) = self.fs.move_file(&staged, &final_path).await {
            self.remove_file_quietly(&staged).await;
            return Err(CacheError::storage(&asset_title, e));
        }

        Ok(final_path)
    }

    async fn complete(&self, url: &str, asset_title: &str, path: PathBuf, token: &CancellationToken) {
        let entry = CacheEntry {
            asset_title: asset_title.to_string(),
            local_path: path.clone(),
            source_url: url.to_string(),
            last_accessed_at: self.clock.now(),
        };

        let committed = {
            let mut state = self.state.lock();
            if token.is_cancelled() {
                None
            } else {
                let mut victims = Vec::new();
                state.index.remove(asset_title);
                while state.index.len() >= self.config.capacity {
                    let Some(victim) = state.index.pop_lru() else {
                        break;
                    };
                    for task in state.tasks.values() {
                        if task.url != url
                            && (task.asset_title == victim.asset_title
                                || task.url == victim.source_url)
                        {
                            task.token.cancel();
                        }
                    }
                    state.prefetched.pop(&victim.source_url);
                    victims.push(victim);
                }
                state.evictions += victims.len() as u64;
                state.index.insert(entry.clone());
                state.prefetched.pop(url);
                let waiters = state
                    .tasks
                    .remove(url)
                    .map(|mut task| {
                        task.state = DownloadState::Completed;
                        std::mem::take(&mut task.waiters)
                    })
                    .unwrap_or_default();
                Some((victims, waiters))
            }
        };

        let Some((victims, waiters)) = committed else {
            // Cancellation won the race with the final move.
            self.remove_file_quietly(&path).await;
            self.fail(
                url,
                asset_title,
                CacheError::Cancelled {
                    url: url.to_string(),
                },
            );
            return;
        };

        for victim in victims {
            info!(asset_title = %victim.asset_title, "Evicting least recently used asset");
            self.purge_entry(&victim).await;
            self.emit(CacheEvent::AssetEvicted {
                asset_title: victim.asset_title.clone(),
            });
        }

        if let Err(e) = self.references.persist_reference(&entry.to_reference()).await {
            warn!(asset_title, error = %e, "Failed to persist cache reference");
        }

        let bytes = self
            .fs
            .metadata(&path)
            .await
            .map(|m| m.size)
            .unwrap_or_default();
        info!(url, asset_title, bytes, "Download completed");
        self.emit(CacheEvent::DownloadCompleted {
            url: url.to_string(),
            asset_title: asset_title.to_string(),
            bytes,
        });

        resolve_waiters(waiters, &Ok(path));
    }

    fn fail(&self, url: &str, asset_title: &str, err: CacheError) {
        let waiters = {
            let mut state = self.state.lock();
            state
                .tasks
                .remove(url)
                .map(|mut task| {
                    task.state = if err.is_cancelled() {
                        DownloadState::Cancelled
                    } else {
                        DownloadState::Failed
                    };
                    std::mem::take(&mut task.waiters)
                })
                .unwrap_or_default()
        };

        if err.is_cancelled() {
            info!(url, asset_title, "Download cancelled");
            self.emit(CacheEvent::DownloadCancelled {
                url: url.to_string(),
                asset_title: asset_title.to_string(),
            });
        } else {
            warn!(url, asset_title, category = err.category(), error = %err, "Download failed");
            self.emit(CacheEvent::DownloadFailed {
                url: url.to_string(),
                asset_title: asset_title.to_string(),
                category: err.category().to_string(),
                message: err.to_string(),
            });
        }

        resolve_waiters(waiters, &Err(err));
    }
}

/// Runs follow-up persistence on the current runtime, if there is one.
fn spawn_detached<F>(future: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match core_async::runtime::try_current() {
        Some(handle) => {
            handle.spawn(future);
        }
        None => debug!("No runtime available; skipping reference update"),
    }
}
