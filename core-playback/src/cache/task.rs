//! Single-flight download task bookkeeping.

use core_async::sync::{oneshot, CancellationToken};
use std::path::PathBuf;

use crate::error::{CacheError, CacheResult};

/// Lifecycle of one download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Requested,
    Downloading,
    /// Transfer finished; the file is being moved into place.
    Staging,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Completed | DownloadState::Failed | DownloadState::Cancelled
        )
    }
}

pub(crate) type Waiter = oneshot::Sender<CacheResult<PathBuf>>;

/// In-flight download shared by every caller that asked for the same URL.
#[derive(Debug)]
pub(crate) struct DownloadTask {
    pub url: String,
    pub asset_title: String,
    pub state: DownloadState,
    pub waiters: Vec<Waiter>,
    pub token: CancellationToken,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, asset_title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            asset_title: asset_title.into(),
            state: DownloadState::Requested,
            waiters: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn join(&mut self) -> oneshot::Receiver<CacheResult<PathBuf>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }
}

/// Hand the same result to every waiter. Waiters that stopped listening are
/// skipped.
pub(crate) fn resolve_waiters(waiters: Vec<Waiter>, result: &CacheResult<PathBuf>) {
    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}

/// A dropped sender means the driver went away without resolving.
pub(crate) async fn await_waiter(
    rx: oneshot::Receiver<CacheResult<PathBuf>>,
    url: &str,
) -> CacheResult<PathBuf> {
    rx.await.unwrap_or_else(|_| {
        Err(CacheError::Cancelled {
            url: url.to_string(),
        })
    })
}
