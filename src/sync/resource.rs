//! A fixed pool of interchangeable instances, taken and released in bulk.
//!
//! Waiters queue on the same [`Queue`] structure `crate::sync::queue` uses
//! for plain FIFO parking, tagged with the instance count they are blocked
//! on; `release` only pops the head waiter when enough instances have just
//! become free to satisfy it; that waiter can then itself only take once
//! woken, preserving first-come-first-served admission even when requests
//! ask for varying counts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{SimError, SimResult};
use crate::process::{with_ctx, ProcessId};
use crate::sync::queue::Queue;

struct ResourceInner {
    total: i64,
    free: i64,
    usage: HashMap<ProcessId, i64>,
}

#[derive(Clone)]
pub struct Resource {
    inner: Arc<Mutex<ResourceInner>>,
    waiting: Queue,
}

impl Resource {
    /// A pool of `total` interchangeable instances, all initially free.
    /// `total` must be at least 1.
    pub fn new(total: i64) -> SimResult<Self> {
        if total < 1 {
            return Err(SimError::InvalidCount);
        }
        Ok(Resource {
            inner: Arc::new(Mutex::new(ResourceInner {
                total,
                free: total,
                usage: HashMap::new(),
            })),
            waiting: Queue::new(),
        })
    }

    pub fn capacity(&self) -> i64 {
        self.inner.lock().unwrap().total
    }

    pub fn available(&self) -> i64 {
        self.inner.lock().unwrap().free
    }

    /// Takes `num` instances for the current process, blocking if fewer
    /// than `num` are currently free. Fails validation immediately (without
    /// blocking) if `num` is outside `[1, capacity]`.
    pub fn take(&self, num: i64, timeout: Option<f64>) -> SimResult<()> {
        with_ctx(|ctx| {
            let total = self.inner.lock().unwrap().total;
            if num < 1 || num > total {
                return Err(SimError::InvalidCount);
            }
            let must_wait = self.inner.lock().unwrap().free < num;
            if must_wait {
                self.waiting.join_tagged(timeout, num)?;
            }
            let mut inner = self.inner.lock().unwrap();
            inner.free -= num;
            *inner.usage.entry(ctx.id).or_insert(0) += num;
            crate::logging::sim_log!(log::Level::Debug, target: "greensim::resource", "process={:?} took {} (free now {})", ctx.id, num, inner.free);
            Ok(())
        })
    }

    /// Releases `num` instances previously taken by the current process.
    /// Fails with `ReleaseWithoutHold` if the process holds none, or
    /// `ReleaseExceedsHolding` if `num` exceeds what it holds.
    pub fn release(&self, num: i64) -> SimResult<()> {
        with_ctx(|ctx| {
            let free_now = {
                let mut inner = self.inner.lock().unwrap();
                let held = *inner.usage.get(&ctx.id).unwrap_or(&0);
                if held <= 0 {
                    return Err(SimError::ReleaseWithoutHold);
                }
                if num > held {
                    return Err(SimError::ReleaseExceedsHolding);
                }
                let remaining = held - num;
                if remaining <= 0 {
                    inner.usage.remove(&ctx.id);
                } else {
                    inner.usage.insert(ctx.id, remaining);
                }
                inner.free += num;
                inner.free
            };
            crate::logging::sim_log!(log::Level::Debug, target: "greensim::resource", "process={:?} released {} (free now {})", ctx.id, num, free_now);
            if let Some(next_tag) = self.waiting.peek_tag() {
                if next_tag <= free_now {
                    self.waiting.pop();
                }
            }
            Ok(())
        })
    }

    /// Takes `num` instances, returning a guard that releases them on drop.
    pub fn using(&self, num: i64, timeout: Option<f64>) -> SimResult<ResourceGuard<'_>> {
        self.take(num, timeout)?;
        Ok(ResourceGuard {
            resource: self,
            num,
        })
    }
}

/// RAII guard returned by [`Resource::using`]; releases its instances when
/// dropped.
pub struct ResourceGuard<'a> {
    resource: &'a Resource,
    num: i64,
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        let _ = self.resource.release(self.num);
    }
}
