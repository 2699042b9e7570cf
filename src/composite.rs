//! Operations built out of several processes and signals rather than a
//! single primitive: `select`, which waits on several signals at once, and
//! `happens`, which drives a body from a stream of inter-arrival delays.

use std::sync::Arc;

use crate::error::SimResult;
use crate::process::{add, advance};
use crate::sync::Signal;

/// Blocks until at least one of `signals` is on, subject to `timeout`, then
/// returns which ones were on at that moment.
///
/// Implemented the way a single primitive can't be: one helper process per
/// input signal waits on it and flips a private auxiliary signal; the
/// caller just waits on the auxiliary. Helpers left over after `select`
/// returns harmlessly finish (or keep waiting) on their own.
pub fn select(signals: &[Signal], timeout: Option<f64>) -> SimResult<Vec<bool>> {
    let aux = Signal::new();
    for sig in signals {
        let sig = sig.clone();
        let aux = aux.clone();
        add(move || {
            if sig.wait(None).is_ok() {
                aux.turn_on();
            }
        })?;
    }
    aux.wait(timeout)?;
    Ok(signals.iter().map(|s| s.is_on()).collect())
}

/// Builds a driver body that, for each delay yielded by `intervals`,
/// advances by that delay and then spawns a fresh process running `body`.
///
/// Mirrors the source library's arrival-process decorator: `happens`
/// itself does not suspend or touch a scheduler, it just produces a body —
/// the caller schedules the returned driver with `Scheduler::add` (or the
/// process-local `add` free function, if seeding one arrival stream from
/// inside another process), the same way `sim.add(happens(...))` reads in
/// the original. `name`, if given, is set on the driver process's own
/// `local.name` the first time the driver body runs, not any one of the
/// per-arrival processes it spawns.
pub fn happens<I, F>(intervals: I, name: Option<String>, body: F) -> impl FnOnce() + Send + 'static
where
    I: IntoIterator<Item = f64> + Send + 'static,
    F: Fn() + Send + Sync + 'static,
{
    let body = Arc::new(body);
    move || {
        if let Some(n) = name {
            if let Ok(path) = crate::process::local() {
                path.child("name").set(n);
            }
        }
        for interval in intervals {
            if advance(interval).is_err() {
                return;
            }
            let body = body.clone();
            let _ = add(move || (body)());
        }
    }
}
