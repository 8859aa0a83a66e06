//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the short-form playback core:
//! - Logging and tracing setup
//! - Configuration with fail-fast bridge validation
//! - Event bus for playback and cache notifications
//!
//! The feed coordinator and download cache in `core-playback` depend on this
//! crate for their configuration and event types; hosts use it to install
//! logging before bootstrapping the service.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CacheEvent, CoreEvent, EventBus, EventStream, PlaybackEvent};
