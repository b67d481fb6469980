//! Task spawning abstraction.
//!
//! The coordinator spawns its timers and command fan-outs through
//! [`TaskSpawner`] instead of calling `tokio::spawn` directly, so embedders
//! can route background work onto a runtime they own.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Abstraction for spawning background tasks.
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a detached background task.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Spawns a future that is dropped as soon as `token` is cancelled.
    ///
    /// Used for timer loops, which must all stop together when the timer
    /// group is cancelled.
    fn spawn_until_cancelled<F>(&self, token: CancellationToken, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = future => {}
            }
        });
    }
}

/// Tokio-based spawner.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}
