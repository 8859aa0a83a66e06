//! Synchronization primitives.
//!
//! All primitives are `Send + Sync` and async-aware: holding a [`Mutex`]
//! guard across an `.await` does not block the executor, and waiters are
//! served in FIFO order.
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Mutex};
//!
//! # async fn example() {
//! let state = Mutex::new(0);
//! *state.lock().await += 1;
//!
//! let token = CancellationToken::new();
//! let child = token.child_token();
//! token.cancel();
//! assert!(child.is_cancelled());
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedMutexGuard, RwLock,
    RwLockReadGuard, RwLockWriteGuard, Semaphore,
};
pub use tokio_util::sync::CancellationToken;
