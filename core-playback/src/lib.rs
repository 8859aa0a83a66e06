//! # Feed Playback & Prefetch Cache
//!
//! Seamless playback across a short-video feed plus a local cache of the
//! media it shows.
//!
//! ## Overview
//!
//! This crate handles:
//! - Alternating two native players between consecutive feed items
//!   ([`feed::FeedPlaybackCoordinator`])
//! - First-frame, rebuffer and preload telemetry ([`telemetry::PlaybackReporter`])
//! - Single-flight downloads with LRU eviction ([`cache::DownloadCacheManager`])
//!
//! Native players, render surfaces, transports and storage are supplied by
//! the host through `bridge-traits`.

pub mod cache;
pub mod error;
pub mod feed;
pub mod telemetry;

pub use cache::{AssetLocation, CacheConfig, CacheStats, DownloadCacheManager, DownloadState};
pub use error::{CacheError, CacheResult, PlaybackError, Result};
pub use feed::{AssetResolver, FeedConfig, FeedPlaybackCoordinator, RemoteResolver};
pub use telemetry::PlaybackReporter;
