//! Coordination primitives built on [`crate::process`]'s suspend/resume
//! protocol: a wait-list ([`queue::Queue`]), a broadcast flag
//! ([`signal::Signal`]), and a counted pool ([`resource::Resource`]).

pub mod queue;
pub mod resource;
pub mod signal;

pub use queue::Queue;
pub use resource::{Resource, ResourceGuard};
pub use signal::Signal;
