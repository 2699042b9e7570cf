//! Owns the virtual clock and the event heap, and drains events in order.
//!
//! A `Scheduler` is the run loop: `BinaryHeap`-backed timestamp ordering is
//! delegated to [`crate::event::EventHeap`] exactly as in a cycle-accurate
//! event scheduler. What's new here is that "executing an event" for a
//! process continuation means handing a rendezvous token to that process's
//! own OS thread and waiting for it to hand control back — see
//! [`crate::process`] for that protocol. Because only one token is ever in
//! flight, the whole table of processes behaves as a single logical thread
//! of execution even though each process body runs on real one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{SimError, SimResult};
use crate::event::{Action, EventHeap, Seq};
use crate::local::LocalValue;
use crate::process::{Process, ProcessId};
use crate::tags::TagSet;

/// What a parked process is waiting on, so that [`SchedulerShared::wake`]
/// and [`SchedulerShared::interrupt_process`] know what bookkeeping to
/// unwind.
pub(crate) enum Suspension {
    /// Parked in `advance`: a single continuation event is pending.
    Advancing { seq: Seq },
    /// Parked in a Queue/Signal/Resource wait. `remove` detaches the
    /// process from whatever structure it joined; `timeout_seq`, if set, is
    /// the scheduled timeout event to cancel on any other wakeup path.
    Waiting {
        timeout_seq: Option<Seq>,
        remove: Box<dyn FnOnce() + Send>,
    },
}

pub(crate) enum ResumeSignal {
    Go,
    Interrupt(SimError),
}

pub(crate) enum Yielded {
    Suspended(ProcessId),
    Terminated(ProcessId),
    /// The body panicked. Carries the `catch_unwind` payload so the
    /// scheduler thread can `resume_unwind` it once back on `run`'s own
    /// stack, per spec §7: a bug in a body escapes `run()` rather than
    /// being swallowed.
    Panicked(ProcessId, Box<dyn std::any::Any + Send + 'static>),
}

pub(crate) struct ProcessEntry {
    pub(crate) resume_tx: Sender<ResumeSignal>,
    pub(crate) thread: Option<JoinHandle<()>>,
    pub(crate) local: LocalValue,
    pub(crate) tags: TagSet,
    pub(crate) suspension: Option<Suspension>,
}

struct Inner {
    now: f64,
    heap: EventHeap,
    running: bool,
    next_pid: u64,
    current: Option<ProcessId>,
    table: HashMap<ProcessId, ProcessEntry>,
    name: Option<String>,
}

/// The state shared between a [`Scheduler`] handle and every [`Process`] it
/// has spawned, reachable from processes only through a [`std::sync::Weak`]
/// backlink (§9 of the design notes: dropping the last owning `Scheduler`
/// tears the simulation down).
pub(crate) struct SchedulerShared {
    inner: Mutex<Inner>,
    yield_tx: Sender<Yielded>,
    yield_rx: Receiver<Yielded>,
}

impl SchedulerShared {
    pub(crate) fn now(&self) -> f64 {
        self.inner.lock().unwrap().now
    }

    pub(crate) fn schedule_raw(&self, fire_at: f64, action: Action) -> Seq {
        self.inner.lock().unwrap().heap.push(fire_at, action)
    }

    pub(crate) fn cancel_event(&self, seq: Seq) {
        self.inner.lock().unwrap().heap.cancel(seq);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.inner.lock().unwrap().running = running;
    }

    pub(crate) fn set_suspension(&self, pid: ProcessId, suspension: Suspension) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.table.get_mut(&pid) {
            entry.suspension = Some(suspension);
        }
    }

    pub(crate) fn tags_of(&self, pid: ProcessId) -> TagSet {
        self.inner
            .lock()
            .unwrap()
            .table
            .get(&pid)
            .map(|e| e.tags.clone())
            .unwrap_or_default()
    }

    pub(crate) fn with_local<T>(&self, pid: ProcessId, f: impl FnOnce(&mut LocalValue) -> T) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        inner.table.get_mut(&pid).map(|e| f(&mut e.local))
    }

    /// Normal (non-error) wakeup: unwind any outstanding suspension
    /// bookkeeping (cancelling a stale timeout if the process was parked
    /// with one) and schedule the resume.
    pub(crate) fn wake(&self, pid: ProcessId, signal: ResumeSignal) {
        let now = self.now();
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(entry) = inner.table.get_mut(&pid) {
                if let Some(susp) = entry.suspension.take() {
                    match susp {
                        Suspension::Advancing { seq } => inner.heap.cancel(seq),
                        Suspension::Waiting { timeout_seq, .. } => {
                            if let Some(s) = timeout_seq {
                                inner.heap.cancel(s);
                            }
                        }
                    }
                }
            }
        }
        crate::logging::sim_log!(log::Level::Trace, target: "greensim::scheduler", "wake process={:?} at t={}", pid, now);
        self.schedule_raw(now, Box::new(move |s: &Scheduler| s.dispatch_resume(pid, signal)));
    }

    /// Interrupt a process: cancel its pending continuation or detach it
    /// from whatever it is waiting on, then deliver `err` as a zero-delay
    /// continuation.
    pub(crate) fn interrupt_process(&self, pid: ProcessId, err: SimError) {
        let now = self.now();
        let mut remover: Option<Box<dyn FnOnce() + Send>> = None;
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(entry) = inner.table.get_mut(&pid) {
                if let Some(susp) = entry.suspension.take() {
                    match susp {
                        Suspension::Advancing { seq } => inner.heap.cancel(seq),
                        Suspension::Waiting { timeout_seq, remove } => {
                            if let Some(s) = timeout_seq {
                                inner.heap.cancel(s);
                            }
                            remover = Some(remove);
                        }
                    }
                }
            }
        }
        if let Some(remove) = remover {
            remove();
        }
        crate::logging::sim_log!(log::Level::Debug, target: "greensim::scheduler", "interrupt process={:?} at t={} err={}", pid, now, err);
        self.schedule_raw(
            now,
            Box::new(move |s: &Scheduler| s.dispatch_resume(pid, ResumeSignal::Interrupt(err))),
        );
    }
}

impl Drop for SchedulerShared {
    fn drop(&mut self) {
        let entries: Vec<_> = {
            let mut inner = self.inner.lock().unwrap();
            inner.table.drain().collect()
        };
        for (pid, entry) in entries {
            if entry
                .resume_tx
                .send(ResumeSignal::Interrupt(SimError::Interrupt))
                .is_ok()
            {
                // Wait for the process to observe teardown and finish; a
                // well-behaved body does not re-suspend once it sees this.
                let _ = self.yield_rx.recv();
            }
            crate::logging::sim_log!(log::Level::Trace, target: "greensim::scheduler", "tearing down process={:?}", pid);
            if let Some(handle) = entry.thread {
                let _ = handle.join();
            }
        }
    }
}

/// Scheduler construction knobs. A plain struct with a `Default` impl,
/// mirroring how this codebase's configuration types are shaped; there is
/// no file to load since the core is a library, not an application.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Optional human-readable name, surfaced by [`Scheduler::name`] and the
    /// `Debug` impl.
    pub name: Option<String>,
}

/// Drains the event heap in timestamp order, owns the virtual clock, and
/// hosts `run`/`step`/`stop`.
///
/// Cloning a `Scheduler` is cheap (it is an `Arc` handle); all clones refer
/// to the same simulation. The simulation tears down — interrupting any
/// still-suspended processes — when the last clone is dropped.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) shared: Arc<SchedulerShared>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let (yield_tx, yield_rx) = bounded(0);
        let shared = Arc::new(SchedulerShared {
            inner: Mutex::new(Inner {
                now: 0.0,
                heap: EventHeap::new(),
                running: false,
                next_pid: 0,
                current: None,
                table: HashMap::new(),
                name: config.name,
            }),
            yield_tx,
            yield_rx,
        });
        Scheduler { shared }
    }

    pub(crate) fn from_shared(shared: Arc<SchedulerShared>) -> Self {
        Scheduler { shared }
    }

    pub fn name(&self) -> Option<String> {
        self.shared.inner.lock().unwrap().name.clone()
    }

    pub fn now(&self) -> f64 {
        self.shared.now()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Pending event timestamps, earliest first is not guaranteed by this
    /// view; it is read-only inspection, not a queue.
    pub fn events(&self) -> Vec<f64> {
        self.shared.inner.lock().unwrap().heap.pending_times()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.inner.lock().unwrap().heap.len()
    }

    /// Schedules `f` to run at `now + delay`, receiving this scheduler.
    /// Fails with `InvalidDelay` if `delay < 0.0`.
    pub fn schedule<F>(&self, delay: f64, f: F) -> SimResult<Seq>
    where
        F: FnOnce(&Scheduler) + Send + 'static,
    {
        if delay < 0.0 {
            return Err(SimError::InvalidDelay);
        }
        let now = self.shared.now();
        Ok(self.shared.schedule_raw(now + delay, Box::new(f)))
    }

    pub fn cancel(&self, seq: Seq) {
        self.shared.cancel_event(seq);
    }

    /// Creates a new process bound to this scheduler, starting immediately
    /// (delay 0).
    pub fn add<F>(&self, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_with_delay(0.0, TagSet::new(), body)
    }

    /// As [`Scheduler::add`], but `declared` is unioned with the spawning
    /// process's tags (if any) to form the new process's tag set — the
    /// Rust-level stand-in for the source library's `@tagged` decorator,
    /// which is read off the body function at `add` time.
    pub fn add_tagged<F>(&self, declared: TagSet, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_with_delay(0.0, declared, body)
    }

    /// Creates a new process, starting after `delay` simulated time units.
    pub fn add_in<F>(&self, delay: f64, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        if delay < 0.0 {
            return Err(SimError::InvalidDelay);
        }
        self.add_with_delay(delay, TagSet::new(), body)
    }

    /// As [`Scheduler::add_in`], with declared tags (see [`Scheduler::add_tagged`]).
    pub fn add_in_tagged<F>(&self, delay: f64, declared: TagSet, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        if delay < 0.0 {
            return Err(SimError::InvalidDelay);
        }
        self.add_with_delay(delay, declared, body)
    }

    /// Creates a new process, starting at absolute virtual time `moment`.
    /// Fails with `TimeInPast` if `moment` is before `now`.
    pub fn add_at<F>(&self, moment: f64, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        let now = self.shared.now();
        if moment < now {
            return Err(SimError::TimeInPast);
        }
        self.add_with_delay(moment - now, TagSet::new(), body)
    }

    /// As [`Scheduler::add_at`], with declared tags (see [`Scheduler::add_tagged`]).
    pub fn add_at_tagged<F>(&self, moment: f64, declared: TagSet, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        let now = self.shared.now();
        if moment < now {
            return Err(SimError::TimeInPast);
        }
        self.add_with_delay(moment - now, declared, body)
    }

    fn add_with_delay<F>(&self, delay: f64, declared: TagSet, body: F) -> SimResult<Process>
    where
        F: FnOnce() + Send + 'static,
    {
        use crate::process::{spawn_process_thread, ProcessContext};
        use std::collections::HashMap as Map;

        let pid = {
            let mut inner = self.shared.inner.lock().unwrap();
            let id = ProcessId(inner.next_pid);
            inner.next_pid += 1;
            id
        };

        let parent_tags = crate::process::current_tags();
        let tags = TagSet::inherit(Some(&parent_tags), &declared);
        let mut local_root = LocalValue::Node(Map::new());
        crate::local::LocalCursor::new(&mut local_root)
            .child("name")
            .set(format!("process-{}", pid.0));

        let (resume_tx, resume_rx) = bounded::<ResumeSignal>(0);
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.table.insert(
                pid,
                ProcessEntry {
                    resume_tx,
                    thread: None,
                    local: local_root,
                    tags,
                    suspension: None,
                },
            );
        }

        let sched_weak = Arc::downgrade(&self.shared);
        let yield_tx = self.shared.yield_tx.clone();
        let ctx = ProcessContext {
            id: pid,
            shared: sched_weak,
            resume_rx,
            yield_tx,
        };
        let handle = spawn_process_thread(pid, ctx, body);
        if let Some(entry) = self.shared.inner.lock().unwrap().table.get_mut(&pid) {
            entry.thread = Some(handle);
        }

        crate::logging::sim_log!(log::Level::Debug, target: "greensim::scheduler", "add process={:?} delay={}", pid, delay);
        let now = self.shared.now();
        self.shared
            .schedule_raw(now + delay, Box::new(move |s: &Scheduler| s.dispatch_resume(pid, ResumeSignal::Go)));

        Ok(Process::new(pid, Arc::downgrade(&self.shared)))
    }

    /// Runs exactly one pop+execute cycle. Returns `false` if the heap was
    /// empty.
    pub fn step(&self) -> bool {
        let next = { self.shared.inner.lock().unwrap().heap.pop() };
        match next {
            Some((fire_at, action)) => {
                {
                    self.shared.inner.lock().unwrap().now = fire_at;
                }
                action(self);
                true
            }
            None => false,
        }
    }

    /// Runs until the heap is empty, `stop()` is called, or (if `duration`
    /// is finite) `duration` virtual-time units have elapsed.
    pub fn run(&self, duration: f64) {
        let stop_seq = if duration.is_finite() {
            let now = self.shared.now();
            Some(
                self.shared
                    .schedule_raw(now + duration, Box::new(|s: &Scheduler| s.stop())),
            )
        } else {
            None
        };

        self.shared.inner.lock().unwrap().running = true;
        loop {
            if !self.shared.inner.lock().unwrap().running {
                break;
            }
            if !self.step() {
                break;
            }
        }
        self.shared.inner.lock().unwrap().running = false;

        if let Some(seq) = stop_seq {
            self.shared.cancel_event(seq);
        }
    }

    /// Convenience for `run(f64::INFINITY)`.
    pub fn run_to_completion(&self) {
        self.run(f64::INFINITY)
    }

    pub fn stop(&self) {
        self.shared.inner.lock().unwrap().running = false;
    }

    /// Delivers a timeout to `pid` — used by the timeout event a
    /// Queue/Signal/Resource wait schedules alongside parking.
    pub(crate) fn dispatch_timeout(&self, pid: ProcessId) {
        self.shared.interrupt_process(pid, SimError::Timeout);
    }

    /// Resumes the process identified by `pid` with the rendezvous protocol
    /// described in the module docs, blocking until it yields or
    /// terminates. Called only from within `step`, as the action body of a
    /// continuation event.
    pub(crate) fn dispatch_resume(&self, pid: ProcessId, signal: ResumeSignal) {
        let resume_tx = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.current = Some(pid);
            inner.table.get(&pid).map(|e| e.resume_tx.clone())
        };
        let resume_tx = match resume_tx {
            Some(tx) => tx,
            None => {
                self.shared.inner.lock().unwrap().current = None;
                return;
            }
        };
        if resume_tx.send(signal).is_err() {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.table.remove(&pid);
            inner.current = None;
            return;
        }
        match self.shared.yield_rx.recv() {
            Ok(Yielded::Suspended(_)) => {
                self.shared.inner.lock().unwrap().current = None;
            }
            Ok(Yielded::Terminated(p)) => {
                let mut inner = self.shared.inner.lock().unwrap();
                inner.current = None;
                inner.table.remove(&p);
            }
            Ok(Yielded::Panicked(p, payload)) => {
                let mut inner = self.shared.inner.lock().unwrap();
                inner.current = None;
                inner.table.remove(&p);
                drop(inner);
                crate::logging::sim_log!(log::Level::Error, target: "greensim::scheduler", "process={:?} panicked", p);
                std::panic::resume_unwind(payload);
            }
            Err(_) => {}
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock().unwrap();
        f.debug_struct("Scheduler")
            .field("name", &inner.name)
            .field("now", &inner.now)
            .field("running", &inner.running)
            .field("pending", &inner.heap.len())
            .finish()
    }
}
