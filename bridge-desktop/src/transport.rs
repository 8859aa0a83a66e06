//! Download transport using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    transfer::{DownloadTransport, TransferOutput, TransferRequest},
};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Reqwest-based whole-file downloader
///
/// Streams response bodies into uniquely named files under a transfer
/// directory so concurrent downloads never share a path.
pub struct ReqwestTransport {
    client: Client,
    transfer_dir: PathBuf,
}

impl ReqwestTransport {
    /// Create a transport with default timeouts
    pub fn new(transfer_dir: PathBuf) -> Result<Self> {
        Self::with_timeout(transfer_dir, Duration::from_secs(300))
    }

    /// Create a transport with a custom overall request timeout
    pub fn with_timeout(transfer_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent("shortform-playback/0.1.0")
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            transfer_dir,
        })
    }

    /// Create a transport around an existing client
    pub fn with_client(client: Client, transfer_dir: PathBuf) -> Self {
        Self {
            client,
            transfer_dir,
        }
    }

    fn transfer_error(status: Option<u16>, message: impl Into<String>) -> BridgeError {
        BridgeError::Transfer {
            status,
            message: message.into(),
        }
    }

    async fn stream_to_file(&self, request: &TransferRequest, path: &Path) -> Result<u64> {
        let mut req = self.client.get(&request.url);
        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Self::transfer_error(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::transfer_error(
                Some(status.as_u16()),
                format!("HTTP error: {}", status),
            ));
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(BridgeError::Io)?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::transfer_error(None, e.to_string()))?;
            file.write_all(&chunk).await.map_err(BridgeError::Io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(BridgeError::Io)?;

        Ok(written)
    }
}

/// Deletes the temporary file unless the transfer completed.
///
/// Covers both error returns and the future being dropped on cancellation.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = ?self.path, error = %e, "Failed to remove partial transfer");
                }
            }
        }
    }
}

#[async_trait]
impl DownloadTransport for ReqwestTransport {
    async fn download(&self, request: TransferRequest) -> Result<TransferOutput> {
        tokio::fs::create_dir_all(&self.transfer_dir)
            .await
            .map_err(BridgeError::Io)?;

        let partial = PartialFile {
            path: self
                .transfer_dir
                .join(format!("{}.download", uuid::Uuid::new_v4())),
            armed: true,
        };

        debug!(url = %request.url, asset_title = %request.asset_title, "Starting transfer");
        let bytes = self.stream_to_file(&request, &partial.path).await?;
        let temp_path = partial.keep();
        debug!(url = %request.url, bytes, "Transfer finished");

        Ok(TransferOutput { temp_path, bytes })
    }

    fn elevate_priority(&self, url: &str) {
        // reqwest has no per-request priority; transfers already run in parallel.
        debug!(url, "Priority hint ignored by desktop transport");
    }
}
