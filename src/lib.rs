//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `shortform-workspace`
//! and enable `desktop-shims` without wiring `core-service` and
//! `bridge-desktop` individually.

pub use core_service::{bootstrap, CoreError, FeedCore};
