//! Reactor-wide tunables.
//!
//! A plain struct with a `Default` impl and documented fields. The reactor never reads a config
//! file itself — the embedding node is responsible for constructing a `ReactorConfig` from
//! whatever its own configuration layer produces.

use std::time::Duration;

/// Tunables governing how patiently the reactor waits on external collaborators before retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReactorConfig {
    /// How long `be_primary` waits for every connected peer to ack its `primary_when_safe`
    /// publish before treating the wait as stalled and re-checking connectivity.
    pub directory_ack_timeout: Duration,

    /// Maximum number of sub-region backfills a single role runner drives concurrently.
    pub backfill_concurrency_limit: usize,

    /// Base delay before a runner retries after a `ResourceLost` error (peer disappeared
    /// mid-operation). Retries are otherwise driven by directory-change notifications, not a
    /// fixed clock, so this only bounds the case where no further directory change ever arrives.
    pub retry_backoff: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        ReactorConfig {
            directory_ack_timeout: Duration::from_secs(30),
            backfill_concurrency_limit: 4,
            retry_backoff: Duration::from_millis(500),
        }
    }
}
