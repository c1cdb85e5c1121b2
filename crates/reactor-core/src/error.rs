//! Crate-wide error type and the category scheme the safety loop and reconciler use to decide
//! retry vs. bubble-up vs. abort.
//!
//! Mirrors the shape of `CoreError`/`SwitchError` in the crates this one is grounded on: a stable
//! enum of variants with a `Display` impl safe to log, plus a [`category`](ReactorError::category)
//! method that downstream code switches on instead of matching variants directly, so new variants
//! can be added without every call site needing to change.

use crate::region::Region;
use crate::PeerId;

pub type ReactorResult<T> = Result<T, ReactorError>;

/// How a runner or the reconciler should respond to a given error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Expected: blueprint change or node shutdown. Unwind cleanly, do not log as an error.
    Interrupted,
    /// A peer disappeared mid-operation. Retry from the safety loop.
    ResourceLost,
    /// Branch history disagrees about a region's lineage. Refuse to auto-resolve; surface via
    /// directory state for an operator.
    Divergent,
    /// An invariant the rest of the system assumes was violated. Not retryable; the process
    /// should abort with a diagnostic.
    ProgrammerError,
    /// A send didn't ack within the policy window. Retried transparently by the safety loop
    /// re-evaluating on the next directory change.
    Transient,
}

/// The reactor's error domain.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("interrupted")]
    Interrupted,

    #[error("resource lost: peer {peer} disappeared during {during}")]
    ResourceLost { peer: PeerId, during: &'static str },

    #[error("divergent data on region {region}: branch histories cannot be reconciled automatically")]
    DivergentData { region: Region },

    #[error("mailbox send to peer {peer} did not ack within the policy window")]
    AckTimeout { peer: PeerId },

    #[error("programmer error: {0}")]
    ProgrammerError(&'static str),

    #[error("store error: {0}")]
    Store(String),
}

impl ReactorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReactorError::Interrupted => ErrorCategory::Interrupted,
            ReactorError::ResourceLost { .. } => ErrorCategory::ResourceLost,
            ReactorError::DivergentData { .. } => ErrorCategory::Divergent,
            ReactorError::AckTimeout { .. } => ErrorCategory::Transient,
            ReactorError::ProgrammerError(_) => ErrorCategory::ProgrammerError,
            ReactorError::Store(_) => ErrorCategory::ResourceLost,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReactorError::Interrupted)
    }

    pub fn is_resource_lost(&self) -> bool {
        matches!(self.category(), ErrorCategory::ResourceLost)
    }
}
