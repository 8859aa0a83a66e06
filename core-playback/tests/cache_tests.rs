//! Download cache behavior against in-memory storage and a gated transport.

mod common;

use bridge_traits::{AssetReference, ManualClock, MediaSource};
use chrono::{Duration as ChronoDuration, Utc};
use common::{descriptor, eventually, GatedTransport, MemoryFileSystem, MemoryReferenceStore};
use core_playback::cache::{AssetLocation, CacheConfig, DownloadCacheManager, DownloadState};
use core_playback::error::CacheError;
use core_playback::feed::AssetResolver;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

const ASSETS: &str = "/mem/video-playback-cache";
const STAGING: &str = "/mem/video-playback-cache/staging";

struct Harness {
    cache: DownloadCacheManager,
    fs: Arc<MemoryFileSystem>,
    transport: Arc<GatedTransport>,
    references: Arc<MemoryReferenceStore>,
    clock: Arc<ManualClock>,
    bus: EventBus,
}

impl Harness {
    fn open() -> Self {
        let fs = MemoryFileSystem::new();
        let transport = GatedTransport::open(Arc::clone(&fs));
        Self::build(CacheConfig::default(), fs, transport)
    }

    fn gated() -> Self {
        let fs = MemoryFileSystem::new();
        let transport = GatedTransport::gated(Arc::clone(&fs));
        Self::build(CacheConfig::default(), fs, transport)
    }

    fn build(
        config: CacheConfig,
        fs: Arc<MemoryFileSystem>,
        transport: Arc<GatedTransport>,
    ) -> Self {
        let references = Arc::new(MemoryReferenceStore::default());
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::default();
        let cache = DownloadCacheManager::new(
            config,
            fs.clone(),
            transport.clone(),
            references.clone(),
            clock.clone(),
            bus.clone(),
        );
        Self {
            cache,
            fs,
            transport,
            references,
            clock,
            bus,
        }
    }

    async fn ready(self) -> Self {
        self.cache.initialize().await.unwrap();
        self
    }
}

fn url(name: &str) -> String {
    format!("https://cdn.example.com/{}.mp4", name)
}

fn asset(title: &str) -> PathBuf {
    Path::new(ASSETS).join(title)
}

fn cache_events(rx: &mut Receiver<CoreEvent>) -> Vec<CacheEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Cache(event) = event {
            events.push(event);
        }
    }
    events
}

#[tokio::test]
async fn test_download_before_initialize_fails() {
    let h = Harness::open();
    let result = h.cache.start_download(&url("a"), "a.mp4").await;
    assert_eq!(result, Err(CacheError::NotInitialized));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_download_lands_in_cache_directory() {
    let h = Harness::open().ready().await;
    let mut rx = h.bus.subscribe();

    let path = h.cache.start_download(&url("a"), "a.mp4").await.unwrap();

    assert_eq!(path, asset("a.mp4"));
    assert!(h.fs.has(&path));
    assert!(h.references.contains("a.mp4"));
    assert_eq!(h.cache.cached_titles(), vec!["a.mp4".to_string()]);
    assert_eq!(h.cache.download_state(&url("a")), None);

    let events = cache_events(&mut rx);
    assert!(matches!(events[0], CacheEvent::DownloadStarted { .. }));
    assert_eq!(
        events[1],
        CacheEvent::DownloadCompleted {
            url: url("a"),
            asset_title: "a.mp4".to_string(),
            bytes: url("a").len() as u64,
        }
    );

    // nothing left behind in staging or the transport's temp area
    assert_eq!(h.fs.paths(), vec![path]);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_transfer() {
    let h = Harness::gated().ready().await;
    let target = url("shared");

    let transport = h.transport.clone();
    let (a, b, c, _) = tokio::join!(
        h.cache.start_download(&target, "shared.mp4"),
        h.cache.start_download(&target, "shared.mp4"),
        h.cache.start_download(&target, "shared.mp4"),
        async move {
            let gate = transport.clone();
            eventually(move || gate.calls().len() == 1).await;
            transport.release(1);
        }
    );

    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(h.transport.calls(), vec![target]);
}

#[tokio::test]
async fn test_download_descriptor_uses_asset_title() {
    let h = Harness::open().ready().await;
    let item = descriptor("clip");

    let path = h.cache.download_descriptor(&item).await.unwrap();

    assert_eq!(path, asset(&item.asset_title()));
    assert_eq!(
        h.cache.resolve(&item),
        MediaSource::LocalFile { path: path.clone() }
    );
}

#[tokio::test]
async fn test_cancel_leaves_no_files() {
    let h = Harness::gated().ready().await;
    let mut rx = h.bus.subscribe();
    let target = url("slow");

    let cache = h.cache.clone();
    let pending = {
        let target = target.clone();
        tokio::spawn(async move { cache.start_download(&target, "slow.mp4").await })
    };
    let cache = h.cache.clone();
    let probe = target.clone();
    eventually(move || cache.download_state(&probe) == Some(DownloadState::Downloading)).await;
    let fs = h.fs.clone();
    eventually(move || !fs.paths().is_empty()).await;

    h.cache.cancel_download(&target).await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(CacheError::Cancelled { .. })));
    assert!(h.fs.paths().is_empty());
    assert!(!h.references.contains("slow.mp4"));
    assert_eq!(h.cache.download_state(&target), None);
    assert!(cache_events(&mut rx).contains(&CacheEvent::DownloadCancelled {
        url: target,
        asset_title: "slow.mp4".to_string(),
    }));
}

#[tokio::test]
async fn test_cancel_unknown_url_is_noop() {
    let h = Harness::open().ready().await;
    h.cache.cancel_download(&url("nothing")).await;
    assert_eq!(h.cache.stats().in_flight, 0);
}

#[tokio::test]
async fn test_eleventh_asset_evicts_least_recently_used() {
    let h = Harness::open().ready().await;
    let mut rx = h.bus.subscribe();

    for i in 0..10 {
        h.clock.advance(Duration::from_secs(1));
        h.cache
            .start_download(&url(&format!("a{}", i)), &format!("a{}.mp4", i))
            .await
            .unwrap();
    }
    assert_eq!(h.cache.stats().entries, 10);

    // a0 becomes most recent, so a1 is the victim
    h.clock.advance(Duration::from_secs(1));
    assert!(h.cache.create_local_asset_if_available(&url("a0")).is_some());

    h.clock.advance(Duration::from_secs(1));
    h.cache
        .start_download(&url("a10"), "a10.mp4")
        .await
        .unwrap();

    let stats = h.cache.stats();
    assert_eq!(stats.entries, 10);
    assert_eq!(stats.evictions, 1);
    assert!(!h.fs.has(&asset("a1.mp4")));
    assert!(!h.references.contains("a1.mp4"));
    assert!(h.fs.has(&asset("a0.mp4")));
    assert!(h.fs.has(&asset("a10.mp4")));
    assert_eq!(
        h.cache.cached_titles().last().map(String::as_str),
        Some("a10.mp4")
    );
    assert!(cache_events(&mut rx).contains(&CacheEvent::AssetEvicted {
        asset_title: "a1.mp4".to_string(),
    }));
}

#[tokio::test]
async fn test_eviction_cancels_download_of_victim_url() {
    let fs = MemoryFileSystem::new();
    let transport = GatedTransport::open(Arc::clone(&fs));
    let h = Harness::build(CacheConfig::default().with_capacity(2), fs, transport)
        .ready()
        .await;
    let mut rx = h.bus.subscribe();

    h.cache.start_download(&url("a"), "a.mp4").await.unwrap();
    h.clock.advance(Duration::from_secs(1));
    h.cache.start_download(&url("b"), "b.mp4").await.unwrap();

    // the LRU entry's source is fetched again under another title
    h.transport.hold(&url("a"));
    let cache = h.cache.clone();
    let refetch = tokio::spawn(async move { cache.start_download(&url("a"), "a-hd.mp4").await });
    let transport = h.transport.clone();
    eventually(move || transport.calls().len() == 3).await;

    h.clock.advance(Duration::from_secs(1));
    h.cache.start_download(&url("c"), "c.mp4").await.unwrap();

    let result = refetch.await.unwrap();
    assert!(matches!(result, Err(CacheError::Cancelled { .. })));
    assert_eq!(
        h.cache.cached_titles(),
        vec!["b.mp4".to_string(), "c.mp4".to_string()]
    );
    assert_eq!(h.cache.stats().evictions, 1);
    assert_eq!(h.cache.download_state(&url("a")), None);
    assert_eq!(h.fs.paths(), vec![asset("b.mp4"), asset("c.mp4")]);

    let events = cache_events(&mut rx);
    assert!(events.contains(&CacheEvent::AssetEvicted {
        asset_title: "a.mp4".to_string(),
    }));
    assert!(events.contains(&CacheEvent::DownloadCancelled {
        url: url("a"),
        asset_title: "a-hd.mp4".to_string(),
    }));
}

#[tokio::test]
async fn test_cancel_during_staging_resolves_every_waiter() {
    let h = Harness::open().ready().await;
    h.fs.hold_moves_into(STAGING);
    let target = url("late");

    let first = {
        let cache = h.cache.clone();
        let target = target.clone();
        tokio::spawn(async move { cache.start_download(&target, "late.mp4").await })
    };
    let fs = h.fs.clone();
    eventually(move || fs.moves_waiting() == 1).await;
    assert_eq!(h.cache.download_state(&target), Some(DownloadState::Staging));

    // a late caller joins, then the cancel lands before the staging move
    let fs = h.fs.clone();
    let (second, _, _) = tokio::join!(
        h.cache.start_download(&target, "late.mp4"),
        h.cache.cancel_download(&target),
        async move {
            tokio::task::yield_now().await;
            fs.release_moves(1);
        }
    );

    assert!(matches!(second, Err(CacheError::Cancelled { .. })));
    let first = first.await.unwrap();
    assert!(matches!(first, Err(CacheError::Cancelled { .. })));
    assert!(h.fs.paths().is_empty());
    assert!(h.cache.cached_titles().is_empty());
    assert!(!h.references.contains("late.mp4"));
}

#[tokio::test]
async fn test_cancel_racing_final_move_discards_asset() {
    let h = Harness::open().ready().await;
    let mut rx = h.bus.subscribe();
    h.fs.hold_moves_into(ASSETS);
    let target = url("photo-finish");

    let pending = {
        let cache = h.cache.clone();
        let target = target.clone();
        tokio::spawn(async move { cache.start_download(&target, "photo-finish.mp4").await })
    };
    let fs = h.fs.clone();
    eventually(move || fs.moves_waiting() == 1).await;

    let fs = h.fs.clone();
    tokio::join!(h.cache.cancel_download(&target), async move {
        tokio::task::yield_now().await;
        fs.release_moves(1);
    });

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(CacheError::Cancelled { .. })));
    assert!(h.fs.paths().is_empty());
    assert!(h.cache.cached_titles().is_empty());
    assert!(!h.references.contains("photo-finish.mp4"));
    let events = cache_events(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, CacheEvent::DownloadCompleted { .. })));
    assert!(events.contains(&CacheEvent::DownloadCancelled {
        url: target,
        asset_title: "photo-finish.mp4".to_string(),
    }));
}

#[tokio::test]
async fn test_missing_file_purges_stale_reference() {
    let h = Harness::open().ready().await;
    let path = h.cache.start_download(&url("gone"), "gone.mp4").await.unwrap();
    h.fs.remove(&path);

    assert_eq!(h.cache.create_local_asset_if_available(&url("gone")), None);

    let references = h.references.clone();
    eventually(move || !references.contains("gone.mp4")).await;
    assert!(h.cache.cached_titles().is_empty());
    assert_eq!(h.cache.stats().misses, 1);
}

#[tokio::test]
async fn test_hit_counts_and_unknown_url_miss() {
    let h = Harness::open().ready().await;
    h.cache.start_download(&url("a"), "a.mp4").await.unwrap();

    assert_eq!(
        h.cache.create_local_asset_if_available(&url("a")),
        Some(asset("a.mp4"))
    );
    assert_eq!(h.cache.create_local_asset_if_available(&url("b")), None);

    let stats = h.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_transfer_failure_then_retry() {
    let h = Harness::open().ready().await;
    let mut rx = h.bus.subscribe();
    let target = url("broken");
    h.transport.fail(&target);

    let err = h
        .cache
        .start_download(&target, "broken.mp4")
        .await
        .unwrap_err();
    assert!(err.is_transfer());
    assert_eq!(err.category(), "transfer");
    assert!(matches!(err, CacheError::Transfer { status: Some(500), .. }));
    assert!(h.fs.paths().is_empty());

    let failed = cache_events(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            CacheEvent::DownloadFailed { category, .. } => Some(category),
            _ => None,
        });
    assert_eq!(failed.as_deref(), Some("transfer"));

    // a failed task is not reused
    let _ = h.cache.start_download(&target, "broken.mp4").await;
    assert_eq!(h.transport.calls().len(), 2);
}

#[tokio::test]
async fn test_storage_failure_cleans_up() {
    let h = Harness::open().ready().await;
    h.fs.fail_moves_into(STAGING);

    let err = h
        .cache
        .start_download(&url("full"), "full.mp4")
        .await
        .unwrap_err();

    assert_eq!(err.category(), "storage");
    assert!(h.fs.paths().is_empty());
    assert!(!h.references.contains("full.mp4"));
}

#[tokio::test]
async fn test_local_or_inflight_asset() {
    let h = Harness::gated().ready().await;
    let target = url("inflight");
    assert_eq!(h.cache.local_or_inflight_asset(&target), None);

    let cache = h.cache.clone();
    let pending = {
        let target = target.clone();
        tokio::spawn(async move { cache.start_download(&target, "inflight.mp4").await })
    };
    let transport = h.transport.clone();
    eventually(move || transport.calls().len() == 1).await;

    assert_eq!(
        h.cache.local_or_inflight_asset(&target),
        Some(AssetLocation::Streaming { url: target.clone() })
    );

    h.transport.release(1);
    let path = pending.await.unwrap().unwrap();
    assert_eq!(
        h.cache.local_or_inflight_asset(&target),
        Some(AssetLocation::Cached(path))
    );
}

#[tokio::test]
async fn test_prefetch_registers_streaming_source() {
    let h = Harness::open().ready().await;
    let item = descriptor("next");

    AssetResolver::prefetch(&h.cache, &item);

    assert!(h.transport.calls().is_empty());
    assert_eq!(
        h.cache.local_or_inflight_asset(&item.uri),
        Some(AssetLocation::Streaming { url: item.uri.clone() })
    );
    assert_eq!(h.cache.resolve(&item), MediaSource::remote(&item));
}

#[tokio::test]
async fn test_prefetch_hints_are_bounded() {
    let fs = MemoryFileSystem::new();
    let transport = GatedTransport::open(Arc::clone(&fs));
    let h = Harness::build(CacheConfig::default().with_prefetch_hint_limit(2), fs, transport)
        .ready()
        .await;

    for name in ["p1", "p2", "p3"] {
        h.cache.prefetch(&url(name), &format!("{}.mp4", name));
    }

    assert_eq!(h.cache.local_or_inflight_asset(&url("p1")), None);
    for name in ["p2", "p3"] {
        assert_eq!(
            h.cache.local_or_inflight_asset(&url(name)),
            Some(AssetLocation::Streaming { url: url(name) })
        );
    }

    // a finished download drops its hint
    h.cache.start_download(&url("p3"), "p3.mp4").await.unwrap();
    h.fs.remove(&asset("p3.mp4"));
    assert_eq!(h.cache.local_or_inflight_asset(&url("p3")), None);
}

#[tokio::test]
async fn test_elevate_priority_only_for_known_downloads() {
    let h = Harness::gated().ready().await;
    let target = url("urgent");

    h.cache.elevate_priority(&target);
    assert!(h.transport.elevated().is_empty());

    let cache = h.cache.clone();
    let pending = {
        let target = target.clone();
        tokio::spawn(async move { cache.start_download(&target, "urgent.mp4").await })
    };
    let transport = h.transport.clone();
    eventually(move || transport.calls().len() == 1).await;

    h.cache.elevate_priority(&target);
    assert_eq!(h.transport.elevated(), vec![target]);

    h.transport.release(1);
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_clear_mappings_and_cache() {
    let h = Harness::open().ready().await;
    let path = h.cache.start_download(&url("a"), "a.mp4").await.unwrap();
    let mut rx = h.bus.subscribe();

    h.cache
        .clear_mappings_and_cache(&url("a"), "a.mp4")
        .await
        .unwrap();

    assert!(!h.fs.has(&path));
    assert!(!h.references.contains("a.mp4"));
    assert!(h.cache.cached_titles().is_empty());
    assert_eq!(
        cache_events(&mut rx),
        vec![CacheEvent::AssetCleared {
            url: url("a"),
            asset_title: "a.mp4".to_string(),
        }]
    );

    // clearing again is harmless
    h.cache
        .clear_mappings_and_cache(&url("a"), "a.mp4")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_redownload_replaces_existing_asset() {
    let h = Harness::open().ready().await;
    h.cache.start_download(&url("a"), "a.mp4").await.unwrap();
    h.cache.start_download(&url("a"), "a.mp4").await.unwrap();

    assert_eq!(h.transport.calls().len(), 2);
    assert_eq!(h.cache.cached_titles(), vec!["a.mp4".to_string()]);
    assert_eq!(h.fs.paths(), vec![asset("a.mp4")]);
}

fn reference(title: &str, age_secs: i64) -> AssetReference {
    AssetReference {
        asset_title: title.to_string(),
        local_path: asset(title),
        source_url: format!("https://cdn.example.com/{}", title),
        last_accessed_at: Utc::now() - ChronoDuration::seconds(age_secs),
    }
}

#[tokio::test]
async fn test_initialize_restores_recency_order() {
    let h = Harness::open();
    for (title, age) in [("b.mp4", 20), ("a.mp4", 30), ("c.mp4", 10)] {
        h.references.insert(reference(title, age));
        h.fs.write(asset(title), b"cached");
    }

    let h = h.ready().await;

    assert_eq!(
        h.cache.cached_titles(),
        vec!["a.mp4".to_string(), "b.mp4".to_string(), "c.mp4".to_string()]
    );
    assert_eq!(
        h.cache
            .create_local_asset_if_available("https://cdn.example.com/b.mp4"),
        Some(asset("b.mp4"))
    );
}

#[tokio::test]
async fn test_initialize_drops_references_beyond_capacity() {
    let fs = MemoryFileSystem::new();
    let transport = GatedTransport::open(Arc::clone(&fs));
    let h = Harness::build(CacheConfig::default().with_capacity(2), fs, transport);
    for (title, age) in [("old.mp4", 30), ("mid.mp4", 20), ("new.mp4", 10)] {
        h.references.insert(reference(title, age));
        h.fs.write(asset(title), b"cached");
    }

    let h = h.ready().await;

    assert_eq!(
        h.cache.cached_titles(),
        vec!["mid.mp4".to_string(), "new.mp4".to_string()]
    );
    assert!(!h.references.contains("old.mp4"));
    assert!(!h.fs.has(&asset("old.mp4")));
}

#[tokio::test]
async fn test_launch_sweep_removes_previous_assets() {
    let h = Harness::open();
    for (title, age) in [("x.mp4", 20), ("y.mp4", 10)] {
        h.references.insert(reference(title, age));
        h.fs.write(asset(title), b"cached");
    }
    h.fs.write(Path::new(STAGING).join("leftover.part"), b"partial");
    let h = h.ready().await;

    let removed = h.cache.remove_all_bookmarked_assets_on_launch().await.unwrap();

    assert_eq!(removed, 2);
    assert!(h.fs.paths().is_empty());
    assert!(h.references.titles().is_empty());
    assert!(h.cache.cached_titles().is_empty());

    // the cache keeps working afterwards
    h.cache.start_download(&url("fresh"), "fresh.mp4").await.unwrap();
    assert_eq!(h.cache.cached_titles(), vec!["fresh.mp4".to_string()]);
}
