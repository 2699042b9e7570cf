//! The process handle and the thread-local "current process" context.
//!
//! Each process body runs on its own OS thread, parked on a private
//! rendezvous channel until the scheduler hands it a token; see
//! [`crate::scheduler::Scheduler::dispatch_resume`] for the other half of
//! the protocol. The free functions here (`now`, `advance`, `pause`, `stop`,
//! `add`, `local`, ...) are how a process body addresses *itself* without
//! threading a handle through every call — the same shape as the source
//! library's `Process.current()` lookup, localized to this thread instead of
//! a process-local stack since here each process well and truly owns a
//! thread of its own.

use std::cell::RefCell;
use std::sync::Weak;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{SimError, SimResult};
use crate::local::LocalValue;
use crate::scheduler::{ResumeSignal, Scheduler, SchedulerShared, Suspension, Yielded};
use crate::tags::TagSet;

/// Opaque identifier for a process, unique within the scheduler that
/// created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub(crate) u64);

/// An external handle to a process: resumable, interruptible, inspectable
/// from any thread, cheap to clone (an id plus a weak backlink).
///
/// A `Process` does not keep its scheduler alive. Once the scheduler is
/// dropped, every method becomes a no-op (or returns `NotInProcess` where a
/// result is expected).
#[derive(Clone)]
pub struct Process {
    id: ProcessId,
    shared: Weak<SchedulerShared>,
}

impl Process {
    pub(crate) fn new(id: ProcessId, shared: Weak<SchedulerShared>) -> Self {
        Process { id, shared }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// True if called from this process's own body.
    pub fn is_current(&self) -> bool {
        CURRENT.with(|c| c.borrow().as_ref().map(|ctx| ctx.id) == Some(self.id))
    }

    /// Schedules a normal (non-error) resumption of this process at the
    /// current simulation time. A no-op if the process is not currently
    /// parked or the scheduler is gone.
    pub fn resume(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.wake(self.id, ResumeSignal::Go);
        }
    }

    /// Delivers `err` to this process as soon as the scheduler next runs,
    /// detaching it from whatever queue/signal/resource it may be parked
    /// on first.
    pub fn interrupt(&self, err: SimError) {
        if let Some(shared) = self.shared.upgrade() {
            shared.interrupt_process(self.id, err);
        }
    }

    pub fn tags(&self) -> TagSet {
        self.shared
            .upgrade()
            .map(|s| s.tags_of(self.id))
            .unwrap_or_default()
    }

    /// A cursor onto this process's local attribute namespace, usable from
    /// any thread (not just the process's own).
    pub fn local(&self) -> LocalPath {
        LocalPath {
            shared: self.shared.clone(),
            pid: self.id,
            path: Vec::new(),
        }
    }
}

/// A path into a process's [`LocalValue`] tree, addressable without holding
/// a reference into the scheduler's lock across calls.
///
/// Obtained from [`Process::local`] or the free function [`local`].
#[derive(Clone)]
pub struct LocalPath {
    shared: Weak<SchedulerShared>,
    pid: ProcessId,
    path: Vec<String>,
}

impl LocalPath {
    pub fn child(&self, key: &str) -> LocalPath {
        let mut path = self.path.clone();
        path.push(key.to_string());
        LocalPath {
            shared: self.shared.clone(),
            pid: self.pid,
            path,
        }
    }

    pub fn get(&self) -> LocalValue {
        let Some(shared) = self.shared.upgrade() else {
            return LocalValue::Unset;
        };
        shared
            .with_local(self.pid, |root| {
                let mut cursor = crate::local::LocalCursor::new(root);
                for key in &self.path {
                    cursor = cursor.child(key);
                }
                cursor.get()
            })
            .unwrap_or(LocalValue::Unset)
    }

    pub fn set(&self, value: impl Into<LocalValue>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let value = value.into();
        shared.with_local(self.pid, |root| {
            let mut cursor = crate::local::LocalCursor::new(root);
            for key in &self.path {
                cursor = cursor.child(key);
            }
            cursor.set(value);
        });
    }
}

/// The state visible only from a process's own thread.
pub(crate) struct ProcessContext {
    pub(crate) id: ProcessId,
    pub(crate) shared: Weak<SchedulerShared>,
    pub(crate) resume_rx: Receiver<ResumeSignal>,
    pub(crate) yield_tx: Sender<Yielded>,
}

thread_local! {
    static CURRENT: RefCell<Option<ProcessContext>> = const { RefCell::new(None) };
}

pub(crate) fn with_ctx<T>(f: impl FnOnce(&ProcessContext) -> SimResult<T>) -> SimResult<T> {
    CURRENT.with(|c| match &*c.borrow() {
        Some(ctx) => f(ctx),
        None => Err(SimError::NotInProcess),
    })
}

/// Blocks this process's thread until the scheduler hands it back a token,
/// reporting what it sent first (so a blocking Queue/Signal/Resource wait
/// can also observe the Suspended handoff).
pub(crate) fn suspend_and_wait(ctx: &ProcessContext) -> SimResult<()> {
    ctx.yield_tx
        .send(Yielded::Suspended(ctx.id))
        .map_err(|_| SimError::Interrupt)?;
    match ctx.resume_rx.recv() {
        Ok(ResumeSignal::Go) => Ok(()),
        Ok(ResumeSignal::Interrupt(e)) => Err(e),
        Err(_) => Err(SimError::Interrupt),
    }
}

/// Marks this process as parked on `suspension`, then blocks until resumed
/// or interrupted. Used by everything that can suspend a process: `advance`
/// records an `Advancing` suspension, Queue/Signal/Resource a `Waiting` one.
pub(crate) fn park(ctx: &ProcessContext, suspension: Suspension) -> SimResult<()> {
    if let Some(shared) = ctx.shared.upgrade() {
        shared.set_suspension(ctx.id, suspension);
    }
    suspend_and_wait(ctx)
}

/// Spawns the OS thread backing a new process: parks it on its own
/// `resume_rx` until the scheduler sends the first `Go`, installs the
/// thread-local context, runs `body`, then reports termination.
///
/// `body` runs under `catch_unwind`: a bug in a body (anything other than
/// the controlled `Interrupt`/`Timeout` error return) must escape `run()`
/// on the scheduler's own thread per spec §7, not hang the rendezvous or
/// vanish on this process's thread.
pub(crate) fn spawn_process_thread(
    pid: ProcessId,
    ctx: ProcessContext,
    body: impl FnOnce() + Send + 'static,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("process-{}", pid.0))
        .spawn(move || {
            match ctx.resume_rx.recv() {
                Ok(ResumeSignal::Go) => {}
                _ => {
                    let _ = ctx.yield_tx.send(Yielded::Terminated(pid));
                    return;
                }
            }
            let yield_tx = ctx.yield_tx.clone();
            CURRENT.with(|c| *c.borrow_mut() = Some(ctx));
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body));
            CURRENT.with(|c| *c.borrow_mut() = None);
            let _ = match result {
                Ok(()) => yield_tx.send(Yielded::Terminated(pid)),
                Err(payload) => yield_tx.send(Yielded::Panicked(pid, payload)),
            };
        })
        .expect("failed to spawn process thread")
}

/// The tag set of the currently running process, or empty if called outside
/// any process. Used by `Scheduler::add` to compute the tag set a new
/// process inherits.
pub(crate) fn current_tags() -> TagSet {
    CURRENT.with(|c| match &*c.borrow() {
        Some(ctx) => ctx
            .shared
            .upgrade()
            .map(|s| s.tags_of(ctx.id))
            .unwrap_or_default(),
        None => TagSet::default(),
    })
}

/// The current simulation time. Fails with `NotInProcess` outside a process
/// body — use [`Scheduler::now`] there instead.
pub fn now() -> SimResult<f64> {
    with_ctx(|ctx| {
        let shared = ctx.shared.upgrade().ok_or(SimError::NotInProcess)?;
        Ok(shared.now())
    })
}

/// Suspends the current process for `delay` simulated time units. Fails
/// immediately with `InvalidDelay` if `delay < 0.0`, without suspending.
pub fn advance(delay: f64) -> SimResult<()> {
    if delay < 0.0 {
        return Err(SimError::InvalidDelay);
    }
    with_ctx(|ctx| {
        let shared = ctx.shared.upgrade().ok_or(SimError::NotInProcess)?;
        let now = shared.now();
        let pid = ctx.id;
        let seq = shared.schedule_raw(
            now + delay,
            Box::new(move |s: &Scheduler| s.dispatch_resume(pid, ResumeSignal::Go)),
        );
        park(ctx, Suspension::Advancing { seq })
    })
}

/// Suspends the current process indefinitely. Only an external
/// [`Process::resume`] or [`Process::interrupt`] wakes it back up.
pub fn pause() -> SimResult<()> {
    with_ctx(|ctx| suspend_and_wait(ctx))
}

/// Stops the scheduler's run loop after the current event finishes.
pub fn stop() -> SimResult<()> {
    with_ctx(|ctx| {
        let shared = ctx.shared.upgrade().ok_or(SimError::NotInProcess)?;
        shared.set_running(false);
        Ok(())
    })
}

fn current_scheduler() -> SimResult<Scheduler> {
    with_ctx(|ctx| {
        let shared = ctx.shared.upgrade().ok_or(SimError::NotInProcess)?;
        Ok(Scheduler::from_shared(shared))
    })
}

/// Spawns a new process, starting immediately, as a child of the current
/// one (inheriting its tags).
pub fn add<F>(body: F) -> SimResult<Process>
where
    F: FnOnce() + Send + 'static,
{
    current_scheduler()?.add(body)
}

/// As [`add`], unioning `declared` into the new process's tag set on top of
/// whatever it inherits from the current process.
pub fn add_tagged<F>(declared: TagSet, body: F) -> SimResult<Process>
where
    F: FnOnce() + Send + 'static,
{
    current_scheduler()?.add_tagged(declared, body)
}

/// Spawns a new process, starting after `delay` simulated time units.
pub fn add_in<F>(delay: f64, body: F) -> SimResult<Process>
where
    F: FnOnce() + Send + 'static,
{
    current_scheduler()?.add_in(delay, body)
}

/// As [`add_in`], with declared tags (see [`add_tagged`]).
pub fn add_in_tagged<F>(delay: f64, declared: TagSet, body: F) -> SimResult<Process>
where
    F: FnOnce() + Send + 'static,
{
    current_scheduler()?.add_in_tagged(delay, declared, body)
}

/// Spawns a new process, starting at absolute virtual time `moment`.
pub fn add_at<F>(moment: f64, body: F) -> SimResult<Process>
where
    F: FnOnce() + Send + 'static,
{
    current_scheduler()?.add_at(moment, body)
}

/// As [`add_at`], with declared tags (see [`add_tagged`]).
pub fn add_at_tagged<F>(moment: f64, declared: TagSet, body: F) -> SimResult<Process>
where
    F: FnOnce() + Send + 'static,
{
    current_scheduler()?.add_at_tagged(moment, declared, body)
}

/// A cursor onto the current process's local attribute namespace, rooted at
/// the empty path.
pub fn local() -> SimResult<LocalPath> {
    with_ctx(|ctx| {
        Ok(LocalPath {
            shared: ctx.shared.clone(),
            pid: ctx.id,
            path: Vec::new(),
        })
    })
}

/// A handle to the process currently running on this thread.
pub fn current_process() -> SimResult<Process> {
    with_ctx(|ctx| Ok(Process::new(ctx.id, ctx.shared.clone())))
}
