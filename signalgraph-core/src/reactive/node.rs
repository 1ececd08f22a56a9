//! Signal Nodes
//!
//! Every reactive cell, plain [`Value`](super::Value) or computed
//! [`Formula`](super::Formula), embeds a [`SignalNode`]. The node carries the
//! cell's identity, the tracker it belongs to, and the weak set of formulas
//! that read it during their last successful recomputation.
//!
//! # Invalidation
//!
//! Invalidating a node walks its live dependents one level deep and calls
//! [`Signal::invalidate`] on each. Deeper propagation happens because a
//! formula, on its own `Clean -> Dirty` transition, invalidates its own
//! dependents in turn. A formula reached along two paths is told twice, but
//! its dirty flag turns the second call into a no-op.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::debug;

use super::registry::WeakRegistry;
use super::tracker::Tracker;
use crate::error::ReactiveError;

/// Process-unique, monotonically increasing signal identifier.
///
/// Ids order signals by creation and label them in logs. Equality of
/// signals is identity; the id is just its printable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(u64);

impl SignalId {
    /// Allocate the next id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SignalId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reactive cell that formulas can depend on.
pub trait Signal: 'static {
    /// The shared node state of this cell.
    fn node(&self) -> &SignalNode;

    /// This signal's id.
    fn id(&self) -> SignalId {
        self.node().id()
    }

    /// Tell every live dependent that this signal changed.
    ///
    /// Formulas override this to mark themselves dirty first.
    fn invalidate(&self) -> Result<(), ReactiveError> {
        self.node().invalidate_dependents()
    }
}

/// Identity, tracker handle and dependent set shared by all signals.
pub struct SignalNode {
    id: SignalId,
    name: Option<Cow<'static, str>>,
    tracker: Rc<Tracker>,
    dependents: RefCell<WeakRegistry<SignalId, dyn Signal>>,
}

impl SignalNode {
    pub(crate) fn new(tracker: &Rc<Tracker>, name: Option<Cow<'static, str>>) -> Self {
        Self {
            id: SignalId::next(),
            name,
            tracker: Rc::clone(tracker),
            dependents: RefCell::new(WeakRegistry::new()),
        }
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Debug name, if one was given at construction.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The tracker this signal records its reads on.
    pub fn tracker(&self) -> &Rc<Tracker> {
        &self.tracker
    }

    /// Number of live dependents. Prunes dead entries first.
    pub fn dependent_count(&self) -> usize {
        let mut dependents = self.dependents.borrow_mut();
        dependents.sweep();
        dependents.len()
    }

    /// Ids of live dependents, in no particular order.
    pub fn dependent_ids(&self) -> Vec<SignalId> {
        self.dependents.borrow_mut().keys().collect()
    }

    /// Add `dependent` to the weak dependent set.
    ///
    /// Only the formula reconciliation step calls this; dependents are never
    /// attached from outside the tracking protocol.
    pub(crate) fn register(&self, id: SignalId, dependent: Weak<dyn Signal>) {
        self.dependents.borrow_mut().insert_weak(id, dependent);
    }

    pub(crate) fn unregister(&self, id: SignalId) {
        self.dependents.borrow_mut().remove(&id);
    }

    /// Invalidate every live dependent with reads locked.
    ///
    /// The live set is collected before any dependent runs, because a
    /// dependent may end up dropping a formula that unregisters from this
    /// very node. Every dependent is visited even if an earlier one fails;
    /// the first failure is returned.
    pub fn invalidate_dependents(&self) -> Result<(), ReactiveError> {
        let live: SmallVec<[Rc<dyn Signal>; 4]> =
            self.dependents.borrow_mut().values().collect();
        if live.is_empty() {
            return Ok(());
        }

        debug!(
            signal = %self.id,
            name = ?self.name,
            dependents = live.len(),
            "invalidating dependents"
        );

        let _lock = self.tracker.lock_reads_scoped();
        let mut first_error = None;
        for dependent in live {
            if let Err(err) = dependent.invalidate() {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SignalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependents", &self.dependents.borrow().len())
            .finish()
    }
}
