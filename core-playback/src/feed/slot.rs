//! Playback slots: fixed owners of one native player each.

use bridge_traits::{
    error::Result as BridgeResult, BackendId, MediaBackend, PlayableItem, RenderSurface, SurfaceId,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Which surface a slot's backend is currently rendered on.
#[derive(Clone)]
pub(crate) struct SurfaceAttachment {
    pub index: usize,
    pub surface_id: SurfaceId,
    pub surface: Weak<dyn RenderSurface>,
}

/// One of the coordinator's two player owners.
///
/// Slots are relabeled between active and prepared; the backend they own is
/// never moved to another slot.
pub struct PlaybackSlot {
    pub(crate) backend: Option<Arc<dyn MediaBackend>>,
    /// Feed index the backend is loaded with.
    pub(crate) bound_index: Option<usize>,
    pub(crate) attachment: Option<SurfaceAttachment>,
    /// Set while the slot holds a look-ahead item that was never shown.
    pub(crate) prepared_at: Option<DateTime<Utc>>,
    pub(crate) ready_reported: bool,
    /// The feed was replaced under the loaded item; the next index change
    /// reloads even if `bound_index` still matches.
    pub(crate) stale: bool,
}

impl PlaybackSlot {
    pub(crate) fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend: Some(backend),
            bound_index: None,
            attachment: None,
            prepared_at: None,
            ready_reported: false,
            stale: false,
        }
    }

    pub fn backend_id(&self) -> Option<BackendId> {
        self.backend.as_ref().map(|b| b.id())
    }

    pub fn bound_index(&self) -> Option<usize> {
        self.bound_index
    }

    pub fn is_live(&self) -> bool {
        self.backend.is_some()
    }

    /// Load `item` for `index` and rewind.
    pub(crate) async fn load(&mut self, item: PlayableItem, index: usize) -> BridgeResult<()> {
        let Some(backend) = self.backend.clone() else {
            return Ok(());
        };
        self.bound_index = None;
        self.prepared_at = None;
        self.ready_reported = false;
        backend.replace_item(Some(item)).await?;
        backend.seek(Duration::ZERO).await?;
        self.bound_index = Some(index);
        self.stale = false;
        Ok(())
    }

    /// Drop the loaded item and leave the backend idle.
    pub(crate) async fn unload(&mut self) {
        self.bound_index = None;
        self.prepared_at = None;
        self.ready_reported = false;
        self.stale = false;
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.replace_item(None).await {
                warn!(backend = %backend.id(), error = %e, "Failed to unload slot");
            }
        }
    }

    pub(crate) async fn play(&self) -> BridgeResult<()> {
        match &self.backend {
            Some(backend) => backend.play().await,
            None => Ok(()),
        }
    }

    pub(crate) async fn pause(&self) {
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.pause().await {
                warn!(backend = %backend.id(), error = %e, "Failed to pause slot");
            }
        }
    }

    /// Whether `surface` is currently showing this slot's backend.
    pub(crate) fn shows_on(&self, surface: &dyn RenderSurface) -> bool {
        self.backend_id().is_some() && surface.attached_backend() == self.backend_id()
    }

    /// Detach from the recorded surface if it still shows this backend.
    pub(crate) fn detach_surface(&mut self) {
        let Some(attachment) = self.attachment.take() else {
            return;
        };
        if let Some(surface) = attachment.surface.upgrade() {
            if self.shows_on(surface.as_ref()) {
                surface.detach();
                debug!(surface = %attachment.surface_id, index = attachment.index, "Detached surface");
            }
        }
    }

    /// Render this backend on `surface`, detaching any prior attachment on
    /// either side first.
    pub(crate) fn attach_surface(
        &mut self,
        index: usize,
        surface: &Arc<dyn RenderSurface>,
    ) -> BridgeResult<()> {
        let Some(backend) = self.backend.clone() else {
            return Ok(());
        };

        if let Some(current) = &self.attachment {
            if current.surface_id == surface.id() && self.shows_on(surface.as_ref()) {
                self.attachment = Some(SurfaceAttachment {
                    index,
                    surface_id: surface.id(),
                    surface: Arc::downgrade(surface),
                });
                return Ok(());
            }
        }

        self.detach_surface();
        if surface.attached_backend().is_some() {
            surface.detach();
        }
        surface.attach(backend)?;
        debug!(surface = %surface.id(), index, "Attached surface");

        self.attachment = Some(SurfaceAttachment {
            index,
            surface_id: surface.id(),
            surface: Arc::downgrade(surface),
        });
        Ok(())
    }

    /// Stop and tear down the backend. Later calls do nothing.
    pub(crate) async fn release(&mut self) {
        self.detach_surface();
        self.bound_index = None;
        self.prepared_at = None;
        if let Some(backend) = self.backend.take() {
            if let Err(e) = backend.pause().await {
                debug!(backend = %backend.id(), error = %e, "Pause before release failed");
            }
            if let Err(e) = backend.release().await {
                warn!(backend = %backend.id(), error = %e, "Failed to release backend");
            }
        }
    }
}

impl std::fmt::Debug for PlaybackSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSlot")
            .field("backend", &self.backend_id())
            .field("bound_index", &self.bound_index)
            .field("stale", &self.stale)
            .field(
                "surface",
                &self.attachment.as_ref().map(|a| a.surface_id.clone()),
            )
            .finish()
    }
}
