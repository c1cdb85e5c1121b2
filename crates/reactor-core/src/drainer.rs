//! The reactor's keep-alive discipline: no role-runner task may outlive the [`Reactor`] that
//! spawned it.
//!
//! This is the Rust-native replacement for the original's `auto_drainer_t` / `auto_drainer_t::lock_t`
//! pair: instead of a reference-counted lock object whose destructor blocks the owning drainer's
//! own destructor, this wraps `tokio_util::task::TaskTracker`, which gives the same "spawn, then
//! block on drain" shape natively.
//!
//! [`Reactor`]: crate::reactor::Reactor

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Parents every role-runner task spawned by the reactor. Dropping a [`Drainer`] does not itself
/// wait — call [`Drainer::close_and_drain`] during reactor shutdown to block until every spawned
/// task has actually finished.
#[derive(Debug, Default, Clone)]
pub struct Drainer {
    tracker: TaskTracker,
}

impl Drainer {
    pub fn new() -> Self {
        Drainer { tracker: TaskTracker::new() }
    }

    /// Spawns `future` as a task tracked by this drainer. Equivalent to acquiring an
    /// `auto_drainer_t::lock_t` and holding it for the task's lifetime.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(future)
    }

    /// Closes the tracker to new spawns and waits for every currently-tracked task to finish.
    /// Mirrors `~auto_drainer_t()` blocking until every outstanding lock is released.
    pub async fn close_and_drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}
