//! Signalgraph Core
//!
//! This crate provides the reactive engine underneath a UI toolkit's
//! property bindings and widgets. It implements:
//!
//! - Dependency-tracking signals (values and memoized formulas)
//! - Lazy, incremental recomputation with precise re-subscription
//! - Weakly-held subscriber links, so unused formulas can be dropped
//! - A time-sliced cooperative scheduler for deferred work
//!
//! Everything is single-threaded. Graph state lives behind `Rc`/`RefCell`
//! and the scheduler runs on a tokio [`LocalSet`](tokio::task::LocalSet).
//!
//! # Architecture
//!
//! - `reactive`: values, formulas, the tracker and reactions
//! - `schedule`: the priority queue and the scheduler
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use signalgraph_core::reactive::{Formula, Tracker, Value};
//!
//! let tracker = Tracker::new();
//! let count = Value::new(&tracker, 2);
//!
//! let doubled = Formula::try_new(&tracker, {
//!     let count = count.clone();
//!     move || Ok(count.get()? * 2)
//! });
//! assert_eq!(doubled.get()?, 4);
//!
//! // Writing marks `doubled` dirty; the next read recomputes it.
//! count.set(5)?;
//! assert!(doubled.is_dirty());
//! assert_eq!(doubled.get()?, 10);
//! # Ok::<(), signalgraph_core::ReactiveError>(())
//! ```

pub mod error;
pub mod reactive;
pub mod schedule;

pub use error::{ConfigError, ReactiveError};
