//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `FileSystemAccess` using `tokio::fs`
//! - `DownloadTransport` using `reqwest` streaming into a transfer directory
//! - `ReferenceStore` using a SQLite-backed table via `sqlx`
//! - `TelemetrySink` forwarding to `tracing`
//!
//! Media backends and render surfaces are never provided here; the host
//! application injects them.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestTransport, SqliteReferenceStore, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let fs = TokioFileSystem::new();
//!     let transport = ReqwestTransport::new(std::env::temp_dir().join("transfers"))?;
//!     let references = SqliteReferenceStore::in_memory().await?;
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod filesystem;
mod references;
mod telemetry;
mod transport;

pub use filesystem::TokioFileSystem;
pub use references::SqliteReferenceStore;
pub use telemetry::TracingTelemetrySink;
pub use transport::ReqwestTransport;
