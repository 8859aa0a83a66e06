//! # Playback Error Types
//!
//! Error types for the feed coordinator and the download cache.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors raised by the feed playback coordinator.
///
/// Out-of-range indices and stale surface handles are not errors; the
/// coordinator ignores them.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A media backend call failed.
    #[error("Media backend error: {0}")]
    Backend(#[from] BridgeError),

    /// A render surface refused an attachment.
    #[error("Render surface error: {0}")]
    Surface(String),

    /// The coordinator was already released.
    #[error("Coordinator released")]
    Released,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unrecoverable error reported by the native engine for an item.
    #[error("Playback failed ({category}): {message}")]
    Playback {
        category: String,
        code: Option<i64>,
        message: String,
    },

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors delivered to download waiters and cache callers.
///
/// `Clone` so every waiter of a shared download receives the same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The transfer itself failed: network, HTTP status, or timeout.
    #[error("Transfer failed for {url}: {message}")]
    Transfer {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Staging, moving, or removing the file failed.
    #[error("Storage error for {asset_title}: {message}")]
    Storage { asset_title: String, message: String },

    /// The download was cancelled or the manager shut down.
    #[error("Download cancelled: {url}")]
    Cancelled { url: String },

    /// A persisted reference points at a file that no longer exists.
    ///
    /// Lookups purge such references and report a miss; this value is only
    /// logged, never returned.
    #[error("Stale cache reference: {asset_title}")]
    StaleReference { asset_title: String },

    #[error("Cache not initialized")]
    NotInitialized,

    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Short category string used in events and telemetry.
    pub fn category(&self) -> &'static str {
        match self {
            CacheError::Transfer { .. } => "transfer",
            CacheError::Storage { .. } => "storage",
            CacheError::Cancelled { .. } => "cancelled",
            CacheError::StaleReference { .. } => "stale_reference",
            CacheError::NotInitialized => "not_initialized",
            CacheError::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Returns `true` if the error came from the network rather than disk.
    pub fn is_transfer(&self) -> bool {
        matches!(self, CacheError::Transfer { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Cancelled { .. })
    }

    pub(crate) fn transfer(url: &str, error: BridgeError) -> Self {
        match error {
            BridgeError::Transfer { status, message } => CacheError::Transfer {
                url: url.to_string(),
                status,
                message,
            },
            other => CacheError::Transfer {
                url: url.to_string(),
                status: None,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn storage(asset_title: &str, error: impl std::fmt::Display) -> Self {
        CacheError::Storage {
            asset_title: asset_title.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
