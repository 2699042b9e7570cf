//! A cooperative discrete-event simulation core.
//!
//! A [`Scheduler`] owns a virtual clock and a heap of pending events; each
//! simulated [`Process`] runs its body on its own OS thread, but at most one
//! body is ever actually executing — the rest are parked on rendezvous
//! channels waiting for the scheduler to hand them a token. From inside a
//! process body, the free functions in this crate root ([`now`],
//! [`advance`], [`pause`], [`add`], [`local`], ...) address the calling
//! process implicitly, the way the source library's `Process.current()`
//! lookup does.
//!
//! ```no_run
//! use greensim::{Scheduler, advance, now};
//!
//! let sim = Scheduler::new();
//! sim.add(|| {
//!     advance(1.0).unwrap();
//!     println!("woke at {}", now().unwrap());
//! }).unwrap();
//! sim.run_to_completion();
//! ```

mod composite;
mod error;
mod event;
mod local;
mod logging;
mod process;
mod scheduler;
mod sync;
mod tags;

pub use composite::{happens, select};
pub use error::{SimError, SimResult};
pub use local::LocalValue;
pub use logging::{disable_logging, enable_logging, is_logging_enabled};
pub use process::{
    add, add_at, add_at_tagged, add_in, add_in_tagged, add_tagged, advance, current_process,
    local, now, pause, stop,
};
pub use process::{LocalPath, Process, ProcessId};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use sync::{Queue, Resource, ResourceGuard, Signal};
pub use tags::{Tag, TagSet};
