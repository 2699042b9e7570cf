//! An ordered wait-list of parked processes.
//!
//! Each waiter is ranked by an order token computed from its join sequence
//! number; by default that token is the sequence number itself, giving FIFO
//! discipline, but a custom `get_order_token` closure (set via
//! [`Queue::with_order_token`]) can re-rank waiters on join — e.g. the
//! even/odd interleave in the scheduling-fairness tests. [`crate::Resource`]
//! reuses this structure directly rather than keeping its own wait-list,
//! tagging each waiter with the instance count it is blocked on.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use crate::error::{SimError, SimResult};
use crate::process::{current_process, with_ctx, ProcessId};
use crate::scheduler::{Scheduler, Suspension};

struct WaitEntry {
    token: i64,
    counter: u64,
    tag: i64,
    process: crate::process::Process,
}

impl Eq for WaitEntry {}
impl PartialEq for WaitEntry {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.counter == other.counter
    }
}
impl PartialOrd for WaitEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for WaitEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (token, counter): flip the natural order.
        other
            .token
            .cmp(&self.token)
            .then_with(|| other.counter.cmp(&self.counter))
    }
}

struct QueueInner {
    waiting: BinaryHeap<WaitEntry>,
    counter: u64,
}

impl QueueInner {
    fn remove(&mut self, pid: ProcessId) -> bool {
        let before = self.waiting.len();
        let remaining: Vec<WaitEntry> = self
            .waiting
            .drain()
            .filter(|e| e.process.id() != pid)
            .collect();
        self.waiting.extend(remaining);
        self.waiting.len() != before
    }
}

/// A priority wait-list that processes join and are popped from in
/// order-token order (FIFO by default).
#[derive(Clone)]
pub struct Queue {
    inner: Arc<Mutex<QueueInner>>,
    order_token: Arc<dyn Fn(u64) -> i64 + Send + Sync>,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    pub fn new() -> Self {
        Queue {
            inner: Arc::new(Mutex::new(QueueInner {
                waiting: BinaryHeap::new(),
                counter: 0,
            })),
            order_token: Arc::new(|counter| counter as i64),
        }
    }

    /// A queue whose pop order is determined by `get_order_token(join_seq)`
    /// rather than plain join order.
    pub fn with_order_token(get_order_token: impl Fn(u64) -> i64 + Send + Sync + 'static) -> Self {
        Queue {
            inner: Arc::new(Mutex::new(QueueInner {
                waiting: BinaryHeap::new(),
                counter: 0,
            })),
            order_token: Arc::new(get_order_token),
        }
    }

    /// Joins the queue as the current process and blocks until popped,
    /// interrupted, or `timeout` elapses.
    pub fn join(&self, timeout: Option<f64>) -> SimResult<()> {
        self.join_tagged(timeout, 0)
    }

    /// As [`Queue::join`], but records `tag` alongside the waiter — used by
    /// [`crate::Resource`] to remember how many instances each waiter needs.
    pub(crate) fn join_tagged(&self, timeout: Option<f64>, tag: i64) -> SimResult<()> {
        let process = current_process()?;
        let pid = process.id();
        with_ctx(|ctx| {
            let shared = ctx.shared.upgrade().ok_or(SimError::NotInProcess)?;

            let counter = {
                let mut inner = self.inner.lock().unwrap();
                inner.counter += 1;
                inner.counter
            };
            let token = (self.order_token)(counter);
            self.inner.lock().unwrap().waiting.push(WaitEntry {
                token,
                counter,
                tag,
                process: process.clone(),
            });

            let now = shared.now();
            let timeout_seq = timeout.map(|t| {
                shared.schedule_raw(
                    now + t,
                    Box::new(move |s: &Scheduler| {
                        s.dispatch_timeout(pid);
                    }),
                )
            });

            let queue_inner = self.inner.clone();
            let suspension = Suspension::Waiting {
                timeout_seq,
                remove: Box::new(move || {
                    queue_inner.lock().unwrap().remove(pid);
                }),
            };
            crate::process::park(ctx, suspension)
        })
    }

    /// Removes and resumes the highest-priority waiter, if any. A no-op on
    /// an empty queue.
    pub fn pop(&self) -> Option<crate::process::Process> {
        let entry = self.inner.lock().unwrap().waiting.pop();
        entry.map(|e| {
            e.process.resume();
            e.process
        })
    }

    /// The tag recorded for the head waiter, without removing it.
    pub(crate) fn peek_tag(&self) -> Option<i64> {
        self.inner.lock().unwrap().waiting.peek().map(|e| e.tag)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().waiting.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().waiting.len()
    }
}
