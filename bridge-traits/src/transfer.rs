//! Download transport abstraction.
//!
//! The asset cache hands whole-file transfers to the host's native transport
//! (background `URLSession`, `DownloadManager`, or reqwest on desktop). The
//! transport writes the payload to a location it owns; the cache then moves
//! that file into place itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::Result;

/// One whole-file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Logical asset name; transports may use it to label the transfer.
    pub asset_title: String,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, asset_title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            asset_title: asset_title.into(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Completed transfer, written to a transport-owned temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutput {
    pub temp_path: PathBuf,
    pub bytes: u64,
}

/// Native download transport.
///
/// Dropping the future returned by [`DownloadTransport::download`] must
/// abort the transfer and discard its temporary file.
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    async fn download(&self, request: TransferRequest) -> Result<TransferOutput>;

    /// Best-effort hint to favor the transfer for `url`. Unknown URLs are
    /// ignored.
    fn elevate_priority(&self, _url: &str) {}
}
