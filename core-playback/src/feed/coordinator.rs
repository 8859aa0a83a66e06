//! # Feed Playback Coordinator
//!
//! Drives two native players through a vertically scrolling feed.
//!
//! One slot plays the active item on its surface; the other pre-buffers the
//! next item without a surface. When the user advances onto the prepared
//! item the slots swap labels instead of reloading, so the transition shows
//! no rebuffer.
//!
//! All slot and surface mutations happen under a single async mutex. A
//! background poll and one notification listener per backend feed quality
//! telemetry and lifecycle events; both stop on [`release`].
//!
//! [`release`]: FeedPlaybackCoordinator::release

use crate::error::{PlaybackError, Result};
use crate::feed::{
    config::FeedConfig,
    quality::{QualitySignal, QualityTracker},
    resolver::AssetResolver,
    slot::PlaybackSlot,
};
use crate::telemetry::{PlayStartReason, PlaybackReporter, PreloadCancelReason};
use bridge_traits::{
    BackendId, BackendStatus, Clock, MediaBackend, MediaBackendFactory, MediaDescriptor,
    PlayableItem, RenderSurface, SurfaceId, TelemetrySink,
};
use core_async::runtime::Handle;
use core_async::sync::{CancellationToken, Mutex};
use core_async::task::JoinHandle;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use futures::future::{self, Either};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

const SLOT_COUNT: usize = 2;

struct SurfaceBinding {
    surface_id: SurfaceId,
    surface: Weak<dyn RenderSurface>,
}

struct FeedState {
    feed: Vec<MediaDescriptor>,
    slots: [PlaybackSlot; SLOT_COUNT],
    /// Position in `slots` currently labelled active.
    active_slot: usize,
    active_index: Option<usize>,
    scroll_hint: Option<usize>,
    surfaces: HashMap<usize, SurfaceBinding>,
    foreground: bool,
    quality: QualityTracker,
}

impl FeedState {
    fn prepared_slot(&self) -> usize {
        self.active_slot ^ 1
    }

    fn slot_of(&self, backend: BackendId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.backend_id() == Some(backend))
    }

    fn bound_surface(&self, index: usize) -> Option<Arc<dyn RenderSurface>> {
        self.surfaces.get(&index).and_then(|b| b.surface.upgrade())
    }

    /// Descriptor the active slot is playing, if it matches the active index.
    fn active_item(&self) -> Option<(usize, MediaDescriptor)> {
        let index = self.active_index?;
        if self.slots[self.active_slot].bound_index != Some(index) {
            return None;
        }
        self.feed.get(index).map(|d| (index, d.clone()))
    }
}

struct Inner {
    config: FeedConfig,
    reporter: PlaybackReporter,
    resolver: Arc<dyn AssetResolver>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    token: CancellationToken,
    released: AtomicBool,
    state: Mutex<FeedState>,
}

/// Two-slot player coordinator for a short-video feed.
pub struct FeedPlaybackCoordinator {
    inner: Arc<Inner>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl FeedPlaybackCoordinator {
    /// Create the coordinator and its two backends.
    ///
    /// Must be called from within an async runtime; the status poll and the
    /// notification listeners start immediately.
    pub fn new(
        config: FeedConfig,
        factory: &dyn MediaBackendFactory,
        resolver: Arc<dyn AssetResolver>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        let handle = core_async::runtime::try_current().ok_or_else(|| {
            PlaybackError::Internal(
                "FeedPlaybackCoordinator must be created inside an async runtime".to_string(),
            )
        })?;

        let first = factory.create_backend()?;
        let second = factory.create_backend()?;
        let backends = [first, second];

        let inner = Arc::new(Inner {
            reporter: PlaybackReporter::new(telemetry),
            config: config.clone(),
            resolver,
            clock,
            event_bus,
            token: CancellationToken::new(),
            released: AtomicBool::new(false),
            state: Mutex::new(FeedState {
                feed: Vec::new(),
                slots: [
                    PlaybackSlot::new(Arc::clone(&backends[0])),
                    PlaybackSlot::new(Arc::clone(&backends[1])),
                ],
                active_slot: 0,
                active_index: None,
                scroll_hint: None,
                surfaces: HashMap::new(),
                foreground: true,
                quality: QualityTracker::new(config.progress_interval),
            }),
        });

        let mut tasks = Vec::with_capacity(SLOT_COUNT + 1);
        tasks.push(spawn_poller(&handle, &inner));
        for backend in &backends {
            tasks.push(spawn_status_listener(&handle, &inner, backend.as_ref()));
        }

        if config.start_muted {
            let muted = backends.clone();
            handle.spawn(async move {
                for backend in muted {
                    if let Err(e) = backend.set_volume(0.0).await {
                        warn!(backend = %backend.id(), error = %e, "Failed to mute backend");
                    }
                }
            });
        }

        info!(backends = backends.len(), "Feed coordinator created");
        Ok(Self {
            inner,
            tasks: parking_lot::Mutex::new(tasks),
        })
    }

    /// Replace the feed.
    ///
    /// A strict extension of the current feed keeps both slots. Anything else
    /// unloads the prepared slot and marks the active one stale: it keeps
    /// playing, resuming and looping at its index until the next index change
    /// reloads it. If the active index no longer exists, the last item
    /// becomes active.
    #[instrument(skip(self, items), fields(len = items.len()))]
    pub async fn set_feed(&self, items: Vec<MediaDescriptor>) -> Result<()> {
        if items.is_empty() {
            debug!("Ignoring empty feed");
            return Ok(());
        }
        self.inner.ensure_live()?;
        let mut state = self.inner.state.lock().await;

        if items.len() >= state.feed.len() && items.starts_with(&state.feed) {
            state.feed = items;
            if let Some(index) = state.active_index {
                self.inner.prepare_next(&mut state, index).await;
            }
            return Ok(());
        }

        let prepared = state.prepared_slot();
        if let Some(old) = state.slots[prepared].bound_index {
            if state.slots[prepared].prepared_at.is_some() {
                if let Some(descriptor) = state.feed.get(old) {
                    self.inner
                        .reporter
                        .preload_canceled(descriptor, PreloadCancelReason::FeedUpdate);
                }
            }
            state.slots[prepared].pause().await;
        }
        state.slots[prepared].bound_index = None;
        for slot in state.slots.iter_mut() {
            slot.prepared_at = None;
            slot.stale = true;
        }

        state.feed = items;
        debug!(len = state.feed.len(), "Feed replaced; slots are stale");

        let last = state.feed.len() - 1;
        if let Some(active) = state.active_index {
            if active > last {
                state.active_index = None;
                self.inner.activate(&mut state, last).await?;
            }
        }
        Ok(())
    }

    /// Extend the feed. The first item of a previously empty feed becomes
    /// active.
    pub async fn append_feed(&self, items: Vec<MediaDescriptor>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.inner.ensure_live()?;
        let mut state = self.inner.state.lock().await;

        let was_empty = state.feed.is_empty();
        state.feed.extend(items);

        match state.active_index {
            None if was_empty => self.inner.activate(&mut state, 0).await,
            Some(index) => {
                self.inner.prepare_next(&mut state, index).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Make `index` the playing item.
    ///
    /// Out-of-range indices and the already active index are ignored.
    #[instrument(skip(self))]
    pub async fn set_active_index(&self, index: usize) -> Result<()> {
        self.inner.ensure_live()?;
        let mut state = self.inner.state.lock().await;

        if index >= state.feed.len() {
            debug!(len = state.feed.len(), "Active index out of bounds");
            return Ok(());
        }
        let current = &state.slots[state.active_slot];
        let loaded = current.bound_index == Some(index) && !current.stale;
        if state.active_index == Some(index) && loaded {
            return Ok(());
        }

        self.inner.activate(&mut state, index).await
    }

    /// Advisory prediction of the next position while scrolling.
    pub async fn set_scroll_hint(&self, predicted_index: usize, velocity: f32) {
        if self.inner.is_released() {
            return;
        }
        let mut state = self.inner.state.lock().await;
        if predicted_index >= state.feed.len() || state.scroll_hint == Some(predicted_index) {
            return;
        }

        state.scroll_hint = Some(predicted_index);
        debug!(predicted_index, velocity, "Scroll hint");
        if state.active_index != Some(predicted_index) {
            self.inner.resolver.prefetch(&state.feed[predicted_index]);
        }
    }

    /// Associate a surface with a feed position.
    ///
    /// The coordinator keeps only a weak reference; the UI owns the surface.
    pub async fn bind_surface(&self, index: usize, surface: &Arc<dyn RenderSurface>) -> Result<()> {
        self.inner.ensure_live()?;
        let mut state = self.inner.state.lock().await;

        state.surfaces.insert(
            index,
            SurfaceBinding {
                surface_id: surface.id(),
                surface: Arc::downgrade(surface),
            },
        );

        let active = state.active_slot;
        let prepared = state.prepared_slot();
        let target = if state.active_index == Some(index)
            && state.slots[active].bound_index == Some(index)
        {
            Some(active)
        } else if state.slots[prepared].bound_index == Some(index) {
            Some(prepared)
        } else {
            None
        };

        if let Some(slot) = target {
            state.slots[slot]
                .attach_surface(index, surface)
                .map_err(|e| PlaybackError::Surface(e.to_string()))?;
        }
        Ok(())
    }

    /// Forget the surface bound at `index` if it is still `surface_id`.
    ///
    /// A slot is detached only while that surface still shows the slot's own
    /// backend, so a late unbind cannot undo a newer attachment.
    pub async fn unbind_surface(&self, index: usize, surface_id: &SurfaceId) {
        if self.inner.is_released() {
            return;
        }
        let mut state = self.inner.state.lock().await;

        let matches = state
            .surfaces
            .get(&index)
            .map_or(false, |b| &b.surface_id == surface_id);
        if !matches {
            debug!(index, surface = %surface_id, "Ignoring stale unbind");
            return;
        }
        state.surfaces.remove(&index);

        for slot in state.slots.iter_mut() {
            let attached_here = slot
                .attachment
                .as_ref()
                .map_or(false, |a| a.index == index && &a.surface_id == surface_id);
            if attached_here {
                slot.detach_surface();
            }
        }
    }

    /// Resume the active item. The prepared slot stays paused.
    pub async fn on_app_foreground(&self) -> Result<()> {
        self.inner.ensure_live()?;
        let mut state = self.inner.state.lock().await;
        state.foreground = true;

        state.slots[state.prepared_slot()].pause().await;
        if state.active_item().is_some() {
            state.slots[state.active_slot].play().await?;
        }
        Ok(())
    }

    /// Pause both slots without discarding what they buffered.
    pub async fn on_app_background(&self) -> Result<()> {
        self.inner.ensure_live()?;
        let mut state = self.inner.state.lock().await;
        state.foreground = false;

        state.slots[state.active_slot].pause().await;
        state.slots[state.prepared_slot()].pause().await;
        Ok(())
    }

    /// Stop polling, detach surfaces and release both backends.
    ///
    /// Safe to call more than once; later calls do nothing.
    #[instrument(skip(self))]
    pub async fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.token.cancel();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let mut state = self.inner.state.lock().await;
        let prepared = state.prepared_slot();
        if state.slots[prepared].prepared_at.is_some() {
            if let Some(descriptor) = state.slots[prepared]
                .bound_index
                .and_then(|i| state.feed.get(i))
            {
                self.inner
                    .reporter
                    .preload_canceled(descriptor, PreloadCancelReason::Released);
            }
        }

        for slot in state.slots.iter_mut() {
            slot.release().await;
        }
        state.surfaces.clear();
        state.active_index = None;
        state.quality.reset();
        info!("Feed coordinator released");
    }

    /// Run one quality poll immediately.
    pub async fn poll_now(&self) {
        self.inner.poll().await;
    }

    /// Backends not yet released: 2 until [`release`](Self::release), then 0.
    pub async fn live_backend_count(&self) -> usize {
        let state = self.inner.state.lock().await;
        state.slots.iter().filter(|slot| slot.is_live()).count()
    }

    pub async fn active_index(&self) -> Option<usize> {
        self.inner.state.lock().await.active_index
    }

    /// Feed index loaded in the prepared slot.
    pub async fn prepared_index(&self) -> Option<usize> {
        let state = self.inner.state.lock().await;
        state.slots[state.prepared_slot()].bound_index
    }

    /// Backend currently labelled active.
    pub async fn active_backend(&self) -> Option<BackendId> {
        let state = self.inner.state.lock().await;
        state.slots[state.active_slot].backend_id()
    }

    pub async fn feed_len(&self) -> usize {
        self.inner.state.lock().await.feed.len()
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_released()
    }
}

impl Drop for FeedPlaybackCoordinator {
    fn drop(&mut self) {
        self.inner.token.cancel();
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for FeedPlaybackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPlaybackCoordinator")
            .field("config", &self.inner.config)
            .field("released", &self.inner.is_released())
            .finish()
    }
}

impl Inner {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(PlaybackError::Released)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        self.event_bus.emit(CoreEvent::Playback(event)).ok();
    }

    fn playable(&self, descriptor: &MediaDescriptor) -> PlayableItem {
        let source = self.resolver.resolve(descriptor);
        if source.is_local() {
            self.reporter.cache_hit(descriptor);
        } else {
            self.reporter.cache_miss(descriptor);
        }
        PlayableItem::new(descriptor.clone(), source)
    }

    async fn activate(&self, state: &mut FeedState, index: usize) -> Result<()> {
        let descriptor = state.feed[index].clone();
        self.reporter.impression(&descriptor, index);

        let prepared = state.prepared_slot();
        let swapped = self.config.use_prepared_slot
            && state.slots[prepared].is_live()
            && state.slots[prepared].bound_index == Some(index)
            && !state.slots[prepared].stale;

        if swapped {
            let demoted = state.active_slot;
            state.active_slot = prepared;
            state.slots[prepared].prepared_at = None;
            state.slots[demoted].pause().await;
            state.slots[demoted].detach_surface();
            self.reporter
                .play_start_request(&descriptor, index, PlayStartReason::Swap);
            debug!(index, "Promoted prepared slot");
        } else {
            self.reporter
                .play_start_request(&descriptor, index, PlayStartReason::IndexChange);
            let item = self.playable(&descriptor);
            let active = state.active_slot;
            state.slots[active].load(item, index).await?;
            debug!(index, "Reloaded active slot");
        }

        state.active_index = Some(index);
        if state.foreground {
            state.slots[state.active_slot].play().await?;
        }

        let active = state.active_slot;
        self.attach_bound_surface(state, active, index);
        state.quality.start(self.clock.now());
        self.prepare_next(state, index).await;

        self.emit(PlaybackEvent::ActiveChanged {
            index,
            descriptor_id: descriptor.id.clone(),
            swapped,
        });
        Ok(())
    }

    fn attach_bound_surface(&self, state: &mut FeedState, slot: usize, index: usize) {
        match state.bound_surface(index) {
            Some(surface) => {
                if let Err(e) = state.slots[slot].attach_surface(index, &surface) {
                    warn!(index, surface = %surface.id(), error = %e, "Failed to attach surface");
                }
            }
            None => state.slots[slot].detach_surface(),
        }
    }

    /// Load `index + 1` into the prepared slot, paused and without a surface
    /// unless one is already bound for it.
    async fn prepare_next(&self, state: &mut FeedState, index: usize) {
        if !self.config.use_prepared_slot {
            return;
        }
        let prepared = state.prepared_slot();
        let next = index + 1;

        if next >= state.feed.len() {
            if state.slots[prepared].bound_index.is_some() {
                state.slots[prepared].detach_surface();
                state.slots[prepared].unload().await;
                debug!(index, "No next item; prepared slot idle");
            }
            return;
        }
        if state.slots[prepared].bound_index == Some(next) && !state.slots[prepared].stale {
            return;
        }

        if state.slots[prepared].prepared_at.is_some() {
            if let Some(old) = state.slots[prepared]
                .bound_index
                .and_then(|i| state.feed.get(i))
            {
                self.reporter
                    .preload_canceled(old, PreloadCancelReason::Retarget);
            }
        }
        state.slots[prepared].detach_surface();

        let descriptor = state.feed[next].clone();
        let item = self.playable(&descriptor);
        let mode = if item.source.is_local() { "local" } else { "remote" };

        let slot = &mut state.slots[prepared];
        if let Err(e) = slot.load(item, next).await {
            warn!(index = next, error = %e, "Failed to prepare next item");
            self.reporter
                .preload_canceled(&descriptor, PreloadCancelReason::Error);
            return;
        }
        slot.pause().await;
        slot.prepared_at = Some(self.clock.now());
        self.reporter.preload_scheduled(&descriptor, 1, mode);

        if let Some(surface) = state.bound_surface(next) {
            if let Err(e) = state.slots[prepared].attach_surface(next, &surface) {
                warn!(index = next, error = %e, "Failed to attach prepared surface");
            }
        }
    }

    async fn poll(&self) {
        if self.is_released() {
            return;
        }
        let mut state = self.state.lock().await;
        let Some((_, descriptor)) = state.active_item() else {
            return;
        };
        let Some(backend) = state.slots[state.active_slot].backend.clone() else {
            return;
        };

        let status = backend.status().await;
        let position = backend.current_position().await;
        let signals = state.quality.observe(&status, position, self.clock.now());

        for signal in signals {
            match signal {
                QualitySignal::FirstFrame { latency_ms } => {
                    debug!(descriptor_id = %descriptor.id, latency_ms, "First frame");
                    self.reporter.first_frame(&descriptor, latency_ms);
                }
                QualitySignal::RebufferStart => self.reporter.rebuffer_start(&descriptor),
                QualitySignal::RebufferEnd { stalled_ms } => {
                    self.reporter.rebuffer_end(&descriptor, stalled_ms)
                }
                QualitySignal::Progress { position_secs } => {
                    self.reporter.progress(&descriptor, position_secs)
                }
            }
        }
    }

    async fn on_status(&self, backend: BackendId, status: BackendStatus) {
        if self.is_released() {
            return;
        }
        let mut state = self.state.lock().await;
        let Some(slot) = state.slot_of(backend) else {
            return;
        };

        if slot == state.active_slot {
            self.on_active_status(&mut state, status).await;
        } else {
            self.on_prepared_status(&mut state, slot, status).await;
        }
    }

    async fn on_active_status(&self, state: &mut FeedState, status: BackendStatus) {
        let Some((index, descriptor)) = state.active_item() else {
            return;
        };

        match status {
            BackendStatus::Ended => {
                self.reporter.playback_ended(&descriptor);
                state.quality.mark_ended();
                self.emit(PlaybackEvent::Ended {
                    index,
                    descriptor_id: descriptor.id.clone(),
                });

                self.reporter
                    .play_start_request(&descriptor, index, PlayStartReason::Loop);
                let item = self.playable(&descriptor);
                let active = state.active_slot;
                if let Err(e) = state.slots[active].load(item, index).await {
                    warn!(index, error = %e, "Failed to restart item");
                    return;
                }
                if state.foreground {
                    if let Err(e) = state.slots[active].play().await {
                        warn!(index, error = %e, "Failed to resume looped item");
                    }
                }
                state.quality.start(self.clock.now());
            }
            BackendStatus::Failed(failure) => {
                warn!(
                    index,
                    descriptor_id = %descriptor.id,
                    category = failure.kind.as_str(),
                    "Playback failed"
                );
                self.reporter.playback_error(&descriptor, &failure);
                self.emit(PlaybackEvent::Error {
                    index,
                    descriptor_id: descriptor.id.clone(),
                    category: failure.kind.as_str().to_string(),
                    code: failure.code,
                    message: failure.message.clone(),
                });
            }
            _ => {}
        }
    }

    async fn on_prepared_status(&self, state: &mut FeedState, slot: usize, status: BackendStatus) {
        let Some(index) = state.slots[slot].bound_index else {
            return;
        };
        let Some(descriptor) = state.feed.get(index).cloned() else {
            return;
        };

        match status {
            BackendStatus::Ready => {
                let Some(scheduled_at) = state.slots[slot].prepared_at else {
                    return;
                };
                if state.slots[slot].ready_reported {
                    return;
                }
                state.slots[slot].ready_reported = true;
                let elapsed = (self.clock.now() - scheduled_at).num_milliseconds().max(0) as u64;
                self.reporter.preload_completed(&descriptor, elapsed);

                if self.config.preroll_prepared {
                    if let Some(backend) = &state.slots[slot].backend {
                        if let Err(e) = backend.preroll().await {
                            debug!(index, error = %e, "Preroll failed");
                        }
                    }
                }
            }
            BackendStatus::Failed(failure) => {
                warn!(index, category = failure.kind.as_str(), "Prepared item failed");
                self.reporter
                    .preload_canceled(&descriptor, PreloadCancelReason::Error);
                state.slots[slot].bound_index = None;
                state.slots[slot].prepared_at = None;
            }
            _ => {}
        }
    }
}

fn spawn_poller(handle: &Handle, inner: &Arc<Inner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let token = inner.token.clone();
    let interval = inner.config.poll_interval;

    handle.spawn(async move {
        loop {
            let tick = core_async::time::sleep(interval);
            futures::pin_mut!(tick);
            let cancelled = token.cancelled();
            futures::pin_mut!(cancelled);
            if let Either::Left(_) = future::select(cancelled, tick).await {
                break;
            }

            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.poll().await;
        }
        debug!("Quality poll stopped");
    })
}

fn spawn_status_listener(
    handle: &Handle,
    inner: &Arc<Inner>,
    backend: &dyn MediaBackend,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let token = inner.token.clone();
    let backend_id = backend.id();
    let mut notifications = backend.status_notifications();

    handle.spawn(async move {
        loop {
            let next = {
                let cancelled = token.cancelled();
                futures::pin_mut!(cancelled);
                match future::select(cancelled, notifications.next()).await {
                    Either::Left(_) => break,
                    Either::Right((status, _)) => status,
                }
            };
            let Some(status) = next else {
                break;
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.on_status(backend_id, status).await;
        }
        debug!(backend = %backend_id, "Status listener stopped");
    })
}
