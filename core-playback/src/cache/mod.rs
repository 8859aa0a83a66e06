//! # Download Cache Module
//!
//! Local copies of remote feed media.
//!
//! ## Overview
//!
//! - One transfer per URL no matter how many callers ask for it
//! - Finished transfers are staged, then renamed into the cache directory
//! - At most `capacity` assets are kept; the least recently used goes first
//! - References survive restarts through the host `ReferenceStore`
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DownloadCacheManager               │
//! │  - start_download()                    │
//! │  - create_local_asset_if_available()   │
//! │  - cancel_download()                   │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> CacheIndex (LRU, in memory)
//!          ├──> ReferenceStore (persisted references)
//!          ├──> FileSystemAccess (staging + final move)
//!          └──> DownloadTransport (native transfers)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, DownloadCacheManager};
//!
//! # async fn example(manager: &DownloadCacheManager) -> Result<(), Box<dyn std::error::Error>> {
//! manager.initialize().await?;
//!
//! let path = manager
//!     .start_download("https://cdn.example.com/v/1.mp4", "1.mp4")
//!     .await?;
//!
//! assert_eq!(
//!     manager.create_local_asset_if_available("https://cdn.example.com/v/1.mp4"),
//!     Some(path)
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod index;
pub mod manager;
pub mod stats;
pub mod task;

pub use config::CacheConfig;
pub use index::{CacheEntry, CacheIndex};
pub use manager::{AssetLocation, DownloadCacheManager};
pub use stats::CacheStats;
pub use task::DownloadState;
