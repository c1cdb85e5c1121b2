//! Cooperative cancellation, threaded through every suspension point.
//!
//! `Interruptor` is the Rust-native replacement for the original system's `signal_t`: every
//! runner takes one, every suspension point either races it via [`Interruptor::race`] or is
//! followed by an explicit [`Interruptor::is_pulsed`] check. Pulsing is done by whoever owns the
//! corresponding [`Interruptor`] clone — for role-runners, that's the blueprint reconciler
//! (§4.F), which pulses a region's interruptor the moment its (region, role) assignment changes
//! or disappears.

use tokio_util::sync::CancellationToken;

use crate::error::ReactorError;

/// A cooperative cancellation signal. Cheap to clone; all clones observe the same pulse.
#[derive(Clone, Debug)]
pub struct Interruptor {
    token: CancellationToken,
}

impl Interruptor {
    pub fn new() -> Self {
        Interruptor { token: CancellationToken::new() }
    }

    /// Pulses the signal. Idempotent: pulsing twice has the same effect as once.
    pub fn pulse(&self) {
        self.token.cancel();
    }

    pub fn is_pulsed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Suspends until the signal is pulsed. The original's `interruptor.wait_lazily_unordered()`
    /// — used as the terminal suspension point of every role runner once it has nothing left to
    /// do but watch for a blueprint change.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Races `future` against the interruptor, returning `Err(ReactorError::Interrupted)` if the
    /// signal pulses first. This is the building block every other suspension-point helper in
    /// this crate (`run_until_satisfied`, `wait_for_directory_acks`, backfill awaits) is written
    /// in terms of.
    pub async fn race<F, T>(&self, future: F) -> Result<T, ReactorError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ReactorError::Interrupted),
            value = future => Ok(value),
        }
    }

    /// A child interruptor that is pulsed whenever `self` is, but can also be pulsed
    /// independently without affecting `self`. Used when a runner spawns sub-tasks (e.g.
    /// concurrent backfills) that should all die together on blueprint change, but might also
    /// need to be cancelled individually (a single backfill losing its peer) without tearing
    /// down the whole runner.
    pub fn child(&self) -> Interruptor {
        Interruptor { token: self.token.child_token() }
    }
}

impl Default for Interruptor {
    fn default() -> Self {
        Interruptor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn race_returns_interrupted_when_pulsed_first() {
        let interruptor = Interruptor::new();
        interruptor.pulse();
        let result = interruptor.race(async { 42 }).await;
        assert!(matches!(result, Err(ReactorError::Interrupted)));
    }

    #[tokio::test]
    async fn race_returns_value_when_future_wins() {
        let interruptor = Interruptor::new();
        let result = interruptor.race(async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn child_token_does_not_pulse_parent() {
        let parent = Interruptor::new();
        let child = parent.child();
        child.pulse();
        assert!(child.is_pulsed());
        assert!(!parent.is_pulsed());
    }

    #[tokio::test]
    async fn parent_pulse_propagates_to_child() {
        let parent = Interruptor::new();
        let child = parent.child();
        parent.pulse();
        tokio::time::timeout(Duration::from_millis(100), child.wait())
            .await
            .expect("child should observe parent pulse");
    }
}
