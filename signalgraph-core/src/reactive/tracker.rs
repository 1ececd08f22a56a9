//! Dependency Tracker
//!
//! The tracker records which signals the currently recomputing formula reads.
//! This is what makes dependency discovery automatic: a formula never lists
//! its inputs, it just reads them, and the reads land on the tracker's stack.
//!
//! # Frames
//!
//! Each recomputation pushes a frame `(reader, collected reads)`. Because a
//! compute function may read another formula that in turn recomputes, frames
//! nest; the stack depth equals the recomputation nesting depth, and a read
//! is always attributed to the top frame.
//!
//! # Read Lock
//!
//! While reads are locked, every signal read fails with
//! [`ReactiveError::TrackingViolation`]. Invalidation propagation holds the
//! lock so that no new dependency edge can appear while dirty flags are
//! being pushed through the graph.
//!
//! # Ownership
//!
//! There is no global tracker. Each graph owns an `Rc<Tracker>` and every
//! signal is created against one. Independent graphs (for example in tests)
//! simply use independent trackers.
//!
//! A signal only ever reports reads to its own tracker. A formula created on
//! one tracker that reads a signal created on another records nothing for
//! that read and will not be invalidated when the signal changes. Signals
//! that feed each other must share a tracker.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use super::node::{Signal, SignalId, SignalNode};
use crate::error::ReactiveError;

/// Signals collected by one tracking frame, in read order. May contain
/// duplicates.
pub type Reads = SmallVec<[Rc<dyn Signal>; 8]>;

/// Diagnostic event delivered to the trace hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent<'a> {
    /// A formula started recomputing.
    Enter {
        reader: SignalId,
        name: Option<&'a str>,
    },
    /// The current formula read a signal.
    Use { reader: SignalId, signal: SignalId },
    /// A formula finished recomputing, successfully or not.
    Leave {
        reader: SignalId,
        name: Option<&'a str>,
        reads: usize,
    },
}

type TraceHook = Rc<dyn Fn(&TraceEvent<'_>)>;

struct Frame {
    /// `None` for an untracked section; reads inside it are dropped.
    reader: Option<SignalId>,
    reads: Reads,
}

/// Records reads against the currently recomputing formula.
pub struct Tracker {
    stack: RefCell<Vec<Frame>>,
    reads_locked: Cell<bool>,
    hook: RefCell<Option<TraceHook>>,
}

impl Tracker {
    /// Create a new tracker for an independent graph.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            stack: RefCell::new(Vec::new()),
            reads_locked: Cell::new(false),
            hook: RefCell::new(None),
        })
    }

    /// Record a read of `signal`.
    ///
    /// Outside any frame this is a legal no-op: a bare read simply does not
    /// register a dependency.
    pub fn read<S: Signal>(&self, signal: &Rc<S>) -> Result<(), ReactiveError> {
        if self.reads_locked.get() {
            return Err(ReactiveError::TrackingViolation {
                signal: signal.id(),
            });
        }

        let reader = {
            let mut stack = self.stack.borrow_mut();
            let Some(frame) = stack.last_mut() else {
                return Ok(());
            };
            let Some(reader) = frame.reader else {
                return Ok(());
            };
            frame.reads.push(Rc::clone(signal) as Rc<dyn Signal>);
            reader
        };

        trace!(reader = %reader, signal = %signal.id(), "tracked read");
        self.emit(&TraceEvent::Use {
            reader,
            signal: signal.id(),
        });
        Ok(())
    }

    /// Run `action` inside a fresh frame for `reader`.
    ///
    /// The frame is popped whether `action` succeeds, fails or panics. After
    /// popping, `cleanup` receives the collected reads and the error, if
    /// any, before the result is handed back.
    pub fn track<R, A, C>(
        &self,
        reader: &SignalNode,
        action: A,
        cleanup: C,
    ) -> Result<R, ReactiveError>
    where
        A: FnOnce() -> Result<R, ReactiveError>,
        C: FnOnce(Reads, Option<&ReactiveError>),
    {
        trace!(reader = %reader.id(), name = ?reader.name(), depth = self.depth(), "enter frame");
        self.emit(&TraceEvent::Enter {
            reader: reader.id(),
            name: reader.name(),
        });

        let guard = FrameGuard::push(self, Some(reader.id()));
        let result = action();
        let reads = guard.pop();

        trace!(reader = %reader.id(), reads = reads.len(), ok = result.is_ok(), "leave frame");
        self.emit(&TraceEvent::Leave {
            reader: reader.id(),
            name: reader.name(),
            reads: reads.len(),
        });

        cleanup(reads, result.as_ref().err());
        result
    }

    /// Run `f` without attributing any of its reads to the current formula.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = FrameGuard::push(self, None);
        let result = f();
        drop(guard);
        result
    }

    /// Forbid all reads until [`unlock_reads`](Self::unlock_reads).
    pub fn lock_reads(&self) {
        self.reads_locked.set(true);
    }

    pub fn unlock_reads(&self) {
        self.reads_locked.set(false);
    }

    /// Lock reads until the returned guard is dropped, then restore the
    /// previous lock state. Nests correctly.
    pub fn lock_reads_scoped(&self) -> ReadLock<'_> {
        let previous = self.reads_locked.replace(true);
        ReadLock {
            tracker: self,
            previous,
        }
    }

    pub fn reads_locked(&self) -> bool {
        self.reads_locked.get()
    }

    /// The reader owning the top frame, or `None` when nothing is being
    /// tracked.
    pub fn active(&self) -> Option<SignalId> {
        self.stack.borrow().last().and_then(|frame| frame.reader)
    }

    /// Whether a read right now would register a dependency.
    pub fn is_tracking(&self) -> bool {
        self.active().is_some()
    }

    /// Current frame nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Install a diagnostic hook receiving enter/use/leave events.
    pub fn set_trace_hook(&self, hook: impl Fn(&TraceEvent<'_>) + 'static) {
        *self.hook.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn clear_trace_hook(&self) {
        self.hook.borrow_mut().take();
    }

    fn emit(&self, event: &TraceEvent<'_>) {
        // Clone out so the hook may itself touch the tracker.
        let hook = self.hook.borrow().clone();
        if let Some(hook) = hook {
            hook(event);
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("depth", &self.depth())
            .field("active", &self.active())
            .field("reads_locked", &self.reads_locked())
            .finish()
    }
}

/// Pops its frame on drop, so the stack stays balanced across panics.
struct FrameGuard<'a> {
    tracker: &'a Tracker,
    depth: usize,
    armed: bool,
}

impl<'a> FrameGuard<'a> {
    fn push(tracker: &'a Tracker, reader: Option<SignalId>) -> Self {
        let mut stack = tracker.stack.borrow_mut();
        stack.push(Frame {
            reader,
            reads: SmallVec::new(),
        });
        Self {
            tracker,
            depth: stack.len(),
            armed: true,
        }
    }

    fn pop(mut self) -> Reads {
        self.armed = false;
        self.take_frame().map(|frame| frame.reads).unwrap_or_default()
    }

    fn take_frame(&self) -> Option<Frame> {
        let mut stack = self.tracker.stack.borrow_mut();
        debug_assert_eq!(stack.len(), self.depth, "tracker frames popped out of order");
        stack.pop()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.take_frame();
        }
    }
}

/// Scoped read lock returned by [`Tracker::lock_reads_scoped`].
pub struct ReadLock<'a> {
    tracker: &'a Tracker,
    previous: bool,
}

impl Drop for ReadLock<'_> {
    fn drop(&mut self) {
        self.tracker.reads_locked.set(self.previous);
    }
}
