//! The ambient logging gate.
//!
//! Grounded on the source library's `enable_logging`/`disable_logging`
//! pair: simulation-internal log records (scheduling, resumption,
//! interruption, queue/signal/resource activity) are emitted through the
//! `log` facade as usual, but only while this gate is open, so embedding
//! applications that install their own `log::Log` implementation are not
//! flooded by default. A host application still controls the usual
//! level/target filtering on top of this.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Opens the gate: simulation-internal events are logged from this point on.
pub fn enable_logging() {
    ENABLED.store(true, Ordering::SeqCst);
}

/// Closes the gate (the default).
pub fn disable_logging() {
    ENABLED.store(false, Ordering::SeqCst);
}

pub fn is_logging_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

/// Emits `$lvl, $($arg)*` through the `log` facade iff the gate is open.
/// Internal to the crate; callers that want unconditional logging should
/// use `log::*!` directly.
macro_rules! sim_log {
    ($lvl:expr, $($arg:tt)+) => {
        if $crate::logging::is_logging_enabled() {
            log::log!($lvl, $($arg)+);
        }
    };
}

pub(crate) use sim_log;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        // Other tests in the same binary may toggle this global, so only
        // assert the accessor round-trips rather than a fixed initial value.
        let was = is_logging_enabled();
        enable_logging();
        assert!(is_logging_enabled());
        disable_logging();
        assert!(!is_logging_enabled());
        if was {
            enable_logging();
        }
    }
}
