//! A boolean flag that wakes every waiter when it flips on.
//!
//! Built directly on [`Queue`]: `wait` joins the internal queue when the
//! flag is off, `turn_on` drains it. Draining pops every current waiter one
//! at a time; if a waiter's resumption turns the signal back off before the
//! drain finishes, later waiters in that drain observe the new state and
//! rejoin instead of returning, reproducing the rejoin behaviour of the
//! toggling tests.

use std::sync::{Arc, Mutex};

use crate::error::SimResult;
use crate::sync::queue::Queue;

#[derive(Clone)]
pub struct Signal {
    is_on: Arc<Mutex<bool>>,
    queue: Queue,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    pub fn new() -> Self {
        Signal {
            is_on: Arc::new(Mutex::new(false)),
            queue: Queue::new(),
        }
    }

    /// A signal that starts turned on.
    pub fn new_on() -> Self {
        let s = Self::new();
        *s.is_on.lock().unwrap() = true;
        s
    }

    pub fn is_on(&self) -> bool {
        *self.is_on.lock().unwrap()
    }

    /// Turns the signal on and wakes every current waiter. If a woken
    /// waiter turns the signal back off, waiters later in this same drain
    /// still get popped (the drain runs to completion) but will find the
    /// signal off and rejoin the queue when they actually run.
    pub fn turn_on(&self) {
        *self.is_on.lock().unwrap() = true;
        crate::logging::sim_log!(log::Level::Trace, target: "greensim::signal", "turn_on, waking {} waiters", self.queue.len());
        while !self.queue.is_empty() {
            self.queue.pop();
        }
    }

    pub fn turn_off(&self) {
        *self.is_on.lock().unwrap() = false;
    }

    /// Blocks the current process until the signal is on. Returns
    /// immediately if it already is. If the signal is turned off again
    /// between this waiter being popped and it actually running, it rejoins
    /// automatically.
    pub fn wait(&self, timeout: Option<f64>) -> SimResult<()> {
        loop {
            if self.is_on() {
                return Ok(());
            }
            self.queue.join(timeout)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_off_by_default() {
        let s = Signal::new();
        assert!(!s.is_on());
    }

    #[test]
    fn new_on_starts_on() {
        let s = Signal::new_on();
        assert!(s.is_on());
    }

    #[test]
    fn turn_on_off_toggles_state() {
        let s = Signal::new();
        s.turn_on();
        assert!(s.is_on());
        s.turn_off();
        assert!(!s.is_on());
    }
}
