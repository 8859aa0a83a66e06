//! Hand-written fakes for the host bridges.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    AssetReference, BackendId, BackendStatus, DownloadTransport, FileMetadata, FileSystemAccess,
    MediaBackend, MediaBackendFactory, MediaDescriptor, MediaSource, PlayableItem, ReferenceStore,
    RenderSurface, SurfaceId, TelemetryProperties, TelemetrySink, TransferOutput,
    TransferRequest,
};
use core_playback::feed::AssetResolver;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Poll `condition` until it holds or a second has passed.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn descriptor(id: &str) -> MediaDescriptor {
    MediaDescriptor::new(id, format!("https://cdn.example.com/{}.mp4", id))
}

pub fn feed(ids: &[&str]) -> Vec<MediaDescriptor> {
    ids.iter().map(|id| descriptor(id)).collect()
}

// ============================================================================
// Media backend
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Replace(Option<String>),
    Play,
    Pause,
    Seek(Duration),
    Volume(f32),
    Preroll,
    Release,
}

pub struct FakeBackend {
    id: BackendId,
    calls: Mutex<Vec<BackendCall>>,
    status: Mutex<BackendStatus>,
    position: Mutex<Duration>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<BackendStatus>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            id: BackendId::new(),
            calls: Mutex::new(Vec::new()),
            status: Mutex::new(BackendStatus::Idle),
            position: Mutex::new(Duration::ZERO),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, call: &BackendCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Descriptor ids passed to `replace_item`, `None` for unloads.
    pub fn replaced(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Replace(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Change the polled status without a notification.
    pub fn set_status(&self, status: BackendStatus) {
        *self.status.lock() = status;
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    /// Change the status and push it to subscribers.
    pub fn notify(&self, status: BackendStatus) {
        *self.status.lock() = status.clone();
        self.subscribers
            .lock()
            .retain(|tx| tx.unbounded_send(status.clone()).is_ok());
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    async fn replace_item(&self, item: Option<PlayableItem>) -> Result<()> {
        self.record(BackendCall::Replace(item.map(|i| i.descriptor.id)));
        *self.position.lock() = Duration::ZERO;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(BackendCall::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(BackendCall::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.record(BackendCall::Seek(position));
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.record(BackendCall::Volume(volume));
        Ok(())
    }

    async fn preroll(&self) -> Result<()> {
        self.record(BackendCall::Preroll);
        Ok(())
    }

    async fn status(&self) -> BackendStatus {
        self.status.lock().clone()
    }

    async fn current_position(&self) -> Duration {
        *self.position.lock()
    }

    fn status_notifications(&self) -> BoxStream<'static, BackendStatus> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().push(tx);
        rx.boxed()
    }

    async fn release(&self) -> Result<()> {
        self.record(BackendCall::Release);
        self.subscribers.lock().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFactory {
    created: Mutex<Vec<Arc<FakeBackend>>>,
}

impl FakeFactory {
    pub fn backend(&self, id: BackendId) -> Arc<FakeBackend> {
        self.created
            .lock()
            .iter()
            .find(|b| b.id() == id)
            .cloned()
            .expect("unknown backend")
    }

    pub fn created(&self) -> Vec<Arc<FakeBackend>> {
        self.created.lock().clone()
    }

    /// The backend that is not `id`.
    pub fn other(&self, id: BackendId) -> Arc<FakeBackend> {
        self.created
            .lock()
            .iter()
            .find(|b| b.id() != id)
            .cloned()
            .expect("only one backend")
    }
}

impl MediaBackendFactory for FakeFactory {
    fn create_backend(&self) -> Result<Arc<dyn MediaBackend>> {
        let backend = Arc::new(FakeBackend::new());
        self.created.lock().push(Arc::clone(&backend));
        Ok(backend)
    }
}

// ============================================================================
// Render surface
// ============================================================================

pub struct FakeSurface {
    id: SurfaceId,
    attached: Mutex<Option<BackendId>>,
    attach_count: Mutex<usize>,
}

impl FakeSurface {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: SurfaceId::new(id),
            attached: Mutex::new(None),
            attach_count: Mutex::new(0),
        })
    }

    pub fn attach_count(&self) -> usize {
        *self.attach_count.lock()
    }
}

impl RenderSurface for FakeSurface {
    fn id(&self) -> SurfaceId {
        self.id.clone()
    }

    fn attach(&self, backend: Arc<dyn MediaBackend>) -> Result<()> {
        let mut attached = self.attached.lock();
        if attached.is_some() {
            return Err(BridgeError::OperationFailed(
                "surface already shows a backend".to_string(),
            ));
        }
        *attached = Some(backend.id());
        *self.attach_count.lock() += 1;
        Ok(())
    }

    fn detach(&self) {
        *self.attached.lock() = None;
    }

    fn attached_backend(&self) -> Option<BackendId> {
        *self.attached.lock()
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<(String, TelemetryProperties)>>,
    timings: Mutex<Vec<(String, u64, TelemetryProperties)>>,
}

impl RecordingTelemetry {
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|(n, _)| n == name).count()
    }

    pub fn events_named(&self, name: &str) -> Vec<TelemetryProperties> {
        self.events
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn timings_named(&self, name: &str) -> Vec<u64> {
        self.timings
            .lock()
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, ms, _)| *ms)
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn event(&self, name: &str, properties: &TelemetryProperties) {
        self.events
            .lock()
            .push((name.to_string(), properties.clone()));
    }

    fn timing(&self, name: &str, duration_ms: u64, properties: &TelemetryProperties) {
        self.timings
            .lock()
            .push((name.to_string(), duration_ms, properties.clone()));
    }
}

// ============================================================================
// Asset resolver
// ============================================================================

#[derive(Default)]
pub struct FakeResolver {
    local: Mutex<HashSet<String>>,
    prefetched: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn mark_local(&self, id: &str) {
        self.local.lock().insert(id.to_string());
    }

    pub fn prefetched(&self) -> Vec<String> {
        self.prefetched.lock().clone()
    }
}

impl AssetResolver for FakeResolver {
    fn resolve(&self, descriptor: &MediaDescriptor) -> MediaSource {
        if self.local.lock().contains(&descriptor.id) {
            MediaSource::LocalFile {
                path: PathBuf::from(format!("/cache/{}", descriptor.asset_title())),
            }
        } else {
            MediaSource::remote(descriptor)
        }
    }

    fn prefetch(&self, descriptor: &MediaDescriptor) {
        self.prefetched.lock().push(descriptor.id.clone());
    }
}

// ============================================================================
// File system
// ============================================================================

pub struct MemoryFileSystem {
    root: PathBuf,
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<HashSet<PathBuf>>,
    /// Moves whose destination starts with this prefix fail.
    fail_moves_into: Mutex<Option<PathBuf>>,
    /// Moves into this directory wait for a permit.
    held_moves: Mutex<Option<(PathBuf, Arc<Semaphore>)>>,
    moves_waiting: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: PathBuf::from("/mem"),
            files: Mutex::new(HashMap::new()),
            dirs: Mutex::new(HashSet::new()),
            fail_moves_into: Mutex::new(None),
            held_moves: Mutex::new(None),
            moves_waiting: AtomicUsize::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, path: impl Into<PathBuf>, bytes: &[u8]) {
        self.files.lock().insert(path.into(), bytes.to_vec());
    }

    pub fn remove(&self, path: &Path) {
        self.files.lock().remove(path);
    }

    pub fn has(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Every file path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn fail_moves_into(&self, prefix: impl Into<PathBuf>) {
        *self.fail_moves_into.lock() = Some(prefix.into());
    }

    /// Block moves whose destination sits directly in `dir` until
    /// [`release_moves`](Self::release_moves).
    pub fn hold_moves_into(&self, dir: impl Into<PathBuf>) {
        *self.held_moves.lock() = Some((dir.into(), Arc::new(Semaphore::new(0))));
    }

    pub fn release_moves(&self, moves: usize) {
        if let Some((_, gate)) = self.held_moves.lock().as_ref() {
            gate.add_permits(moves);
        }
    }

    /// Moves currently blocked by [`hold_moves_into`](Self::hold_moves_into).
    pub fn moves_waiting(&self) -> usize {
        self.moves_waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(self.root.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let files = self.files.lock();
        let bytes = files.get(path).ok_or_else(|| {
            BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            ))
        })?;
        Ok(FileMetadata {
            size: bytes.len() as u64,
            modified_at: None,
            is_directory: false,
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(prefix) = self.fail_moves_into.lock().as_ref() {
            if to.starts_with(prefix) {
                return Err(BridgeError::OperationFailed("disk full".to_string()));
            }
        }
        let held = self
            .held_moves
            .lock()
            .as_ref()
            .filter(|(dir, _)| to.parent() == Some(dir.as_path()))
            .map(|(_, gate)| Arc::clone(gate));
        if let Some(gate) = held {
            self.moves_waiting.fetch_add(1, Ordering::SeqCst);
            let permit = gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
            permit.forget();
            self.moves_waiting.fetch_sub(1, Ordering::SeqCst);
        }
        let mut files = self.files.lock();
        let bytes = files.remove(from).ok_or_else(|| {
            BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                from.display().to_string(),
            ))
        })?;
        files.insert(to.to_path_buf(), bytes);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::OperationFailed(format!("missing {}", path.display())))
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.files.lock().retain(|p, _| !p.starts_with(path));
        self.dirs.lock().retain(|p| !p.starts_with(path));
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Reference store
// ============================================================================

#[derive(Default)]
pub struct MemoryReferenceStore {
    references: Mutex<HashMap<String, AssetReference>>,
}

impl MemoryReferenceStore {
    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<_> = self.references.lock().keys().cloned().collect();
        titles.sort();
        titles
    }

    pub fn contains(&self, title: &str) -> bool {
        self.references.lock().contains_key(title)
    }

    pub fn insert(&self, reference: AssetReference) {
        self.references
            .lock()
            .insert(reference.asset_title.clone(), reference);
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn persist_reference(&self, reference: &AssetReference) -> Result<()> {
        self.insert(reference.clone());
        Ok(())
    }

    async fn resolve_reference(&self, asset_title: &str) -> Result<Option<AssetReference>> {
        Ok(self.references.lock().get(asset_title).cloned())
    }

    async fn remove_reference(&self, asset_title: &str) -> Result<()> {
        self.references.lock().remove(asset_title);
        Ok(())
    }

    async fn list_references(&self) -> Result<Vec<AssetReference>> {
        Ok(self.references.lock().values().cloned().collect())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport whose transfers wait for permits released by the test.
pub struct GatedTransport {
    fs: Arc<MemoryFileSystem>,
    gate: Semaphore,
    /// Per-URL gates checked after the shared one.
    held: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    elevated: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
}

/// Removes the temporary file if the transfer future is dropped.
struct TempFile {
    fs: Arc<MemoryFileSystem>,
    path: PathBuf,
    armed: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            self.fs.remove(&self.path);
        }
    }
}

impl GatedTransport {
    /// Every transfer blocks until [`release`](Self::release) is called.
    pub fn gated(fs: Arc<MemoryFileSystem>) -> Arc<Self> {
        Self::with_permits(fs, 0)
    }

    /// Transfers complete immediately.
    pub fn open(fs: Arc<MemoryFileSystem>) -> Arc<Self> {
        Self::with_permits(fs, 1_000_000)
    }

    fn with_permits(fs: Arc<MemoryFileSystem>, permits: usize) -> Arc<Self> {
        Arc::new(Self {
            fs,
            gate: Semaphore::new(permits),
            held: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            elevated: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        })
    }

    pub fn release(&self, transfers: usize) {
        self.gate.add_permits(transfers);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn elevated(&self) -> Vec<String> {
        self.elevated.lock().clone()
    }

    /// Keep transfers of `url` waiting even when the shared gate is open.
    pub fn hold(&self, url: &str) {
        self.held
            .lock()
            .insert(url.to_string(), Arc::new(Semaphore::new(0)));
    }
}

#[async_trait]
impl DownloadTransport for GatedTransport {
    async fn download(&self, request: TransferRequest) -> Result<TransferOutput> {
        self.calls.lock().push(request.url.clone());

        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        let mut temp = TempFile {
            fs: Arc::clone(&self.fs),
            path: self.fs.root().join("transfers").join(format!("{}.download", id)),
            armed: true,
        };
        self.fs.write(&temp.path, request.url.as_bytes());

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        permit.forget();

        let held = self.held.lock().get(&request.url).cloned();
        if let Some(gate) = held {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
            permit.forget();
        }

        if self.failing.lock().contains(&request.url) {
            return Err(BridgeError::Transfer {
                status: Some(500),
                message: "server error".to_string(),
            });
        }

        temp.armed = false;
        Ok(TransferOutput {
            temp_path: temp.path.clone(),
            bytes: request.url.len() as u64,
        })
    }

    fn elevate_priority(&self, url: &str) {
        self.elevated.lock().push(url.to_string());
    }
}
