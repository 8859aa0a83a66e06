//! # Feed Playback Module
//!
//! Two-slot playback for a vertically scrolling short-video feed.
//!
//! ```text
//!   UI scroll ──> FeedPlaybackCoordinator ──> PlaybackSlot (active)   ──> MediaBackend ──> RenderSurface
//!                        │                 └─> PlaybackSlot (prepared) ──> MediaBackend
//!                        ├──> AssetResolver (local file or remote stream)
//!                        └──> PlaybackReporter ──> TelemetrySink
//! ```

pub mod config;
pub mod coordinator;
pub mod quality;
pub mod resolver;
pub mod slot;

pub use config::FeedConfig;
pub use coordinator::FeedPlaybackCoordinator;
pub use quality::{QualityPhase, QualitySignal, QualityTracker};
pub use resolver::{AssetResolver, RemoteResolver};
pub use slot::PlaybackSlot;
