//! Reactive Primitives
//!
//! This module implements the dependency-tracking signal graph: plain
//! values, memoized formulas, and the tracker that wires them together.
//!
//! # Concepts
//!
//! ## Values
//!
//! A [`Value`] holds mutable state. Writing it synchronously marks every
//! formula that read it as dirty, transitively, without recomputing
//! anything.
//!
//! ## Formulas
//!
//! A [`Formula`] caches the result of a compute function and recomputes
//! lazily, on the next read after one of its inputs changed. Its inputs are
//! discovered, not declared: whatever the function read during its last
//! successful run.
//!
//! ## Tracker
//!
//! The [`Tracker`] holds the stack of formulas currently recomputing, so
//! that each read can be attributed to the innermost one. A graph owns its
//! tracker explicitly; nothing here is global.
//!
//! # Memory
//!
//! Signals keep their dependents in a [`WeakRegistry`]. Formulas own their
//! inputs strongly and their dependents not at all, so an unreachable
//! formula is dropped and detaches itself from the graph.

mod formula;
mod node;
mod reaction;
mod registry;
mod tracker;
mod value;

pub use formula::{Formula, WeakFormula};
pub use node::{Signal, SignalId, SignalNode};
pub use reaction::Reaction;
pub use registry::{Entries, WeakRegistry};
pub use tracker::{ReadLock, Reads, TraceEvent, Tracker};
pub use value::Value;
