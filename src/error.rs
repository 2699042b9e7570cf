//! Typed error taxonomy for the simulation core.

use thiserror::Error;

/// Every failure the core can raise.
///
/// `Interrupt` and `Timeout` are not bugs: they are signaling errors injected
/// into a running process by [`crate::Process::interrupt`] or by a timed-out
/// wait/join/take. Catching either is ordinary control flow; letting one
/// escape a process body terminates that process without stopping the
/// scheduler.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    #[error("delay must be non-negative")]
    InvalidDelay,

    #[error("add_at moment is before the current simulation time")]
    TimeInPast,

    #[error("resource count must fall within [1, total]")]
    InvalidCount,

    #[error("cannot release more instances than are currently held")]
    ReleaseExceedsHolding,

    #[error("cannot release a resource that is not held")]
    ReleaseWithoutHold,

    #[error("operation is only valid from within a running process")]
    NotInProcess,

    #[error("process interrupted")]
    Interrupt,

    #[error("wait timed out")]
    Timeout,
}

impl SimError {
    /// True for the two variants that unwind a process body as ordinary
    /// control flow rather than a validation failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, SimError::Interrupt | SimError::Timeout)
    }
}

/// Convenience alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;
