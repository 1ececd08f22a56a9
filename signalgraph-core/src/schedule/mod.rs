//! Deferred Work
//!
//! A general-purpose mechanism for running work later, in priority order,
//! without monopolizing the host loop. It knows nothing about signals;
//! [`Reaction`](crate::reactive::Reaction) is the bridge.
//!
//! - [`PriorityQueue`]: highest priority first, FIFO among equals, sorted
//!   lazily.
//! - [`Scheduler`]: drains the queue in passes bounded by a timeslice,
//!   yielding to the executor between passes.

mod config;
mod queue;
mod scheduler;

pub use config::{SchedulerConfig, DEFAULT_TIMESLICE_MILLIS};
pub use queue::{Priority, PriorityQueue};
pub use scheduler::{Completion, Scheduler, Work};
