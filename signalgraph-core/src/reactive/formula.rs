//! Formula Implementation
//!
//! A Formula is a memoized value computed by a user function. It is both a
//! signal (other formulas may depend on it) and a reader (it depends on the
//! signals its function reads), which makes the dependency relation a graph
//! whose edges are rediscovered on every recomputation.
//!
//! # State Machine
//!
//! - `Clean`: the cached value is current. `get` returns it without running
//!   anything.
//! - `Dirty`: some input changed since the last computation. `get`
//!   recomputes.
//! - `Computing`: the compute function is running. Invalidating the formula
//!   now is an error ([`ReactiveError::ReentrantInvalidation`]), and so is
//!   reading it ([`ReactiveError::CyclicRead`]).
//!
//! Invalidation only flips `Clean -> Dirty` and forwards the news to
//! dependents; nothing is recomputed until somebody reads.
//!
//! A computation that fails leaves the formula `Dirty` and marks it failed.
//! The next invalidation of a failed formula is not forwarded to dependents,
//! which were told on the original transition, but it does fire the
//! `on_invalidate` listeners again so that a deferred reader can retry.
//!
//! # Reconciliation
//!
//! After a successful computation the newly collected reads are deduplicated
//! and diffed against the previous set. The formula unregisters from signals
//! it stopped reading and registers with signals it started reading, so a
//! write to a signal the formula no longer reads leaves it alone.
//!
//! # Lifetime
//!
//! Signals hold their dependents weakly. When the last handle to a formula is
//! dropped it unregisters from every signal it read; [`Formula::dispose`]
//! does the same eagerly.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::map::Entry;
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use super::node::{Signal, SignalId, SignalNode};
use super::tracker::{Reads, Tracker};
use crate::error::ReactiveError;

type ComputeFn<T> = Box<dyn Fn() -> Result<T, ReactiveError>>;
type Listener = Rc<dyn Fn()>;

struct FormulaInner<T> {
    node: SignalNode,
    compute: ComputeFn<T>,
    dirty: Cell<bool>,
    active: Cell<bool>,
    /// The last computation failed and no listener has heard about a write since.
    failed: Cell<bool>,
    /// Signals read by the last successful computation, deduplicated.
    refs: RefCell<IndexMap<SignalId, Rc<dyn Signal>>>,
    value: RefCell<Option<T>>,
    listeners: RefCell<Vec<Listener>>,
    recomputes: Cell<u64>,
}

impl<T: 'static> Signal for FormulaInner<T> {
    fn node(&self) -> &SignalNode {
        &self.node
    }

    fn invalidate(&self) -> Result<(), ReactiveError> {
        if self.active.get() {
            return Err(ReactiveError::ReentrantInvalidation {
                formula: self.node.id(),
            });
        }
        if self.dirty.get() {
            if self.failed.replace(false) {
                debug!(formula = %self.node.id(), "failed formula saw an input change");
                self.notify_listeners();
            }
            return Ok(());
        }

        self.dirty.set(true);
        debug!(formula = %self.node.id(), name = ?self.node.name(), "formula invalidated");
        self.notify_listeners();
        self.node.invalidate_dependents()
    }
}

impl<T> FormulaInner<T> {
    fn notify_listeners(&self) {
        let listeners: SmallVec<[Listener; 2]> =
            self.listeners.borrow().iter().cloned().collect();
        if listeners.is_empty() {
            return;
        }

        let _lock = self.node.tracker().lock_reads_scoped();
        for listener in listeners {
            listener();
        }
    }
}

impl<T> Drop for FormulaInner<T> {
    fn drop(&mut self) {
        let id = self.node.id();
        for signal in self.refs.get_mut().values() {
            signal.node().unregister(id);
        }
    }
}

/// Resets the formula if its compute function unwinds.
struct ComputeGuard<'a> {
    active: &'a Cell<bool>,
    dirty: &'a Cell<bool>,
    failed: &'a Cell<bool>,
    armed: bool,
}

impl Drop for ComputeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.active.set(false);
            self.dirty.set(true);
            self.failed.set(true);
        }
    }
}

/// A lazily recomputed, memoized signal.
///
/// Cloning a `Formula` yields another handle to the same formula. The
/// formula lives as long as any strong handle does; signals it reads do not
/// keep it alive.
pub struct Formula<T: 'static> {
    inner: Rc<FormulaInner<T>>,
}

impl<T: 'static> Formula<T> {
    /// Create a formula from an infallible compute function.
    ///
    /// Nothing runs until the first `get`.
    pub fn new<F>(tracker: &Rc<Tracker>, compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(tracker, None, Box::new(move || Ok(compute())))
    }

    /// Create a named formula from an infallible compute function.
    pub fn named<F>(tracker: &Rc<Tracker>, name: impl Into<Cow<'static, str>>, compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(tracker, Some(name.into()), Box::new(move || Ok(compute())))
    }

    /// Create a formula whose compute function may fail.
    ///
    /// Reads of other signals inside `compute` can be propagated with `?`.
    pub fn try_new<F>(tracker: &Rc<Tracker>, compute: F) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        Self::build(tracker, None, Box::new(compute))
    }

    pub fn try_named<F>(
        tracker: &Rc<Tracker>,
        name: impl Into<Cow<'static, str>>,
        compute: F,
    ) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        Self::build(tracker, Some(name.into()), Box::new(compute))
    }

    fn build(
        tracker: &Rc<Tracker>,
        name: Option<Cow<'static, str>>,
        compute: ComputeFn<T>,
    ) -> Self {
        Self {
            inner: Rc::new(FormulaInner {
                node: SignalNode::new(tracker, name),
                compute,
                dirty: Cell::new(true),
                active: Cell::new(false),
                failed: Cell::new(false),
                refs: RefCell::new(IndexMap::new()),
                value: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
                recomputes: Cell::new(0),
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.node.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.node.name()
    }

    /// Whether the cached value is known to be stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Whether the compute function is running right now.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// How many times the compute function has completed successfully.
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.get()
    }

    /// Ids of the signals read by the last successful computation, in
    /// first-read order.
    pub fn dependency_ids(&self) -> Vec<SignalId> {
        self.inner.refs.borrow().keys().copied().collect()
    }

    /// Number of formulas that read this one in their last computation.
    pub fn dependent_count(&self) -> usize {
        self.inner.node.dependent_count()
    }

    /// Mark the formula dirty and notify its dependents.
    ///
    /// A no-op when already dirty, except that a formula whose last
    /// computation failed re-fires its listeners once. Fails if the formula
    /// is computing.
    pub fn invalidate(&self) -> Result<(), ReactiveError> {
        self.inner.invalidate()
    }

    /// Register a callback fired on every `Clean -> Dirty` transition, and
    /// on the first invalidation after a failed computation.
    ///
    /// Callbacks run with reads locked; any signal read inside one fails
    /// with [`ReactiveError::TrackingViolation`].
    pub fn on_invalidate(&self, listener: impl Fn() + 'static) {
        self.inner.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Invalidate, then detach from every input and drop the cached value.
    ///
    /// The formula stays usable: the next `get` recomputes and re-registers.
    pub fn dispose(&self) -> Result<(), ReactiveError> {
        self.inner.invalidate()?;

        let id = self.id();
        let refs = mem::take(&mut *self.inner.refs.borrow_mut());
        for signal in refs.values() {
            signal.node().unregister(id);
        }
        self.inner.value.borrow_mut().take();
        debug!(formula = %id, released = refs.len(), "formula disposed");
        Ok(())
    }

    /// A handle that does not keep the formula alive.
    pub fn downgrade(&self) -> WeakFormula<T> {
        WeakFormula {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Type-erased handle to this formula as a signal.
    pub fn as_signal(&self) -> Rc<dyn Signal> {
        Rc::clone(&self.inner) as Rc<dyn Signal>
    }

    /// Deduplicate `reads` and diff them against the previous dependency
    /// set, registering and unregistering with each signal at most once.
    fn reconcile(&self, reads: Reads) {
        let id = self.id();
        let mut next: IndexMap<SignalId, Rc<dyn Signal>> = IndexMap::with_capacity(reads.len());
        for signal in reads {
            next.entry(signal.id()).or_insert(signal);
        }

        let previous = mem::replace(&mut *self.inner.refs.borrow_mut(), next);
        let refs = self.inner.refs.borrow();
        let this = Rc::downgrade(&self.inner) as Weak<dyn Signal>;

        let mut removed = 0usize;
        for (signal_id, signal) in &previous {
            if !refs.contains_key(signal_id) {
                signal.node().unregister(id);
                removed += 1;
            }
        }

        let mut added = 0usize;
        for (signal_id, signal) in refs.iter() {
            if !previous.contains_key(signal_id) {
                signal.node().register(id, Weak::clone(&this));
                added += 1;
            }
        }

        if added > 0 || removed > 0 {
            debug!(formula = %id, added, removed, total = refs.len(), "dependencies reconciled");
        }

        drop(refs);
        drop(previous);
    }

    /// Register with the signals a failed computation read before failing.
    ///
    /// The previous dependency set is kept as is, so a write to any input of
    /// either computation reaches the formula.
    fn absorb(&self, reads: Reads) {
        let id = self.id();
        let this = Rc::downgrade(&self.inner) as Weak<dyn Signal>;
        let mut refs = self.inner.refs.borrow_mut();

        let mut added = 0usize;
        for signal in reads {
            if let Entry::Vacant(slot) = refs.entry(signal.id()) {
                signal.node().register(id, Weak::clone(&this));
                slot.insert(signal);
                added += 1;
            }
        }

        if added > 0 {
            debug!(formula = %id, added, total = refs.len(), "dependencies kept after failure");
        }
    }
}

impl<T: Clone + 'static> Formula<T> {
    /// Read the value, recomputing first if dirty.
    ///
    /// The read is recorded against the formula currently being computed,
    /// if any. A failed computation leaves this formula dirty so the next
    /// `get` tries again.
    pub fn get(&self) -> Result<T, ReactiveError> {
        let inner = &self.inner;
        if inner.active.get() {
            return Err(ReactiveError::CyclicRead {
                formula: inner.node.id(),
            });
        }

        inner.node.tracker().read(inner)?;

        if !inner.dirty.get() {
            if let Some(value) = inner.value.borrow().as_ref() {
                return Ok(value.clone());
            }
        }

        self.recompute()
    }

    /// Read the value without recording a dependency on it.
    pub fn get_untracked(&self) -> Result<T, ReactiveError> {
        let tracker = Rc::clone(self.inner.node.tracker());
        tracker.untracked(|| self.get())
    }

    fn recompute(&self) -> Result<T, ReactiveError> {
        let inner = &self.inner;
        let tracker = Rc::clone(inner.node.tracker());

        // Cleared before running so that an input changing mid-compute hits
        // the active guard instead of silently re-dirtying the formula.
        inner.dirty.set(false);
        inner.active.set(true);
        let mut guard = ComputeGuard {
            active: &inner.active,
            dirty: &inner.dirty,
            failed: &inner.failed,
            armed: true,
        };

        let mut collected = Reads::new();
        let result = tracker.track(
            &inner.node,
            || (inner.compute)(),
            |reads, err| {
                inner.active.set(false);
                if let Some(err) = err {
                    inner.dirty.set(true);
                    debug!(formula = %inner.node.id(), error = %err, "formula computation failed");
                }
                collected = reads;
            },
        );
        guard.armed = false;

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                inner.failed.set(true);
                self.absorb(collected);
                return Err(err);
            }
        };
        inner.failed.set(false);
        self.reconcile(collected);
        inner.recomputes.set(inner.recomputes.get() + 1);
        *inner.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }
}

impl<T: 'static> Clone for Formula<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Formula<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("dirty", &self.is_dirty())
            .field("active", &self.is_active())
            .field("value", &*self.inner.value.borrow())
            .field("dependencies", &self.dependency_ids())
            .finish()
    }
}

/// Non-owning handle to a [`Formula`].
pub struct WeakFormula<T: 'static> {
    inner: Weak<FormulaInner<T>>,
}

impl<T: 'static> WeakFormula<T> {
    /// Recover a strong handle if the formula is still alive.
    pub fn upgrade(&self) -> Option<Formula<T>> {
        self.inner.upgrade().map(|inner| Formula { inner })
    }
}

impl<T: 'static> Clone for WeakFormula<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Value;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    fn bump(count: &Rc<Cell<u32>>) {
        count.set(count.get() + 1);
    }

    #[test]
    fn formula_computes_on_first_access() {
        let tracker = Tracker::new();
        let calls = counter();
        let formula = Formula::new(&tracker, {
            let calls = Rc::clone(&calls);
            move || {
                bump(&calls);
                42
            }
        });

        assert!(formula.is_dirty());
        assert_eq!(calls.get(), 0);

        assert_eq!(formula.get().unwrap(), 42);
        assert_eq!(calls.get(), 1);
        assert!(!formula.is_dirty());
    }

    #[test]
    fn clean_formula_is_memoized() {
        let tracker = Tracker::new();
        let calls = counter();
        let formula = Formula::new(&tracker, {
            let calls = Rc::clone(&calls);
            move || {
                bump(&calls);
                "cached"
            }
        });

        formula.get().unwrap();
        formula.get().unwrap();
        formula.get().unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(formula.recompute_count(), 1);
    }

    #[test]
    fn value_write_marks_reader_dirty_without_recomputing() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 2);
        let calls = counter();
        let doubled = Formula::try_new(&tracker, {
            let base = base.clone();
            let calls = Rc::clone(&calls);
            move || {
                bump(&calls);
                Ok(base.get()? * 2)
            }
        });

        assert_eq!(doubled.get().unwrap(), 4);
        assert_eq!(base.dependent_count(), 1);

        base.set(5).unwrap();
        assert!(doubled.is_dirty());
        assert_eq!(calls.get(), 1);

        assert_eq!(doubled.get().unwrap(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 1);
        let fired = counter();
        let formula = Formula::try_new(&tracker, {
            let base = base.clone();
            move || base.get()
        });
        formula.on_invalidate({
            let fired = Rc::clone(&fired);
            move || bump(&fired)
        });

        formula.get().unwrap();
        base.set(2).unwrap();
        base.set(3).unwrap();
        formula.invalidate().unwrap();
        assert_eq!(fired.get(), 1);

        formula.get().unwrap();
        base.set(4).unwrap();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn duplicate_reads_register_once() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 3);
        let formula = Formula::try_new(&tracker, {
            let base = base.clone();
            move || Ok(base.get()? + base.get()? + base.get()?)
        });

        assert_eq!(formula.get().unwrap(), 9);
        assert_eq!(formula.dependency_ids(), vec![base.id()]);
        assert_eq!(base.dependent_count(), 1);
    }

    #[test]
    fn conditional_reads_prune_stale_dependencies() {
        let tracker = Tracker::new();
        let cond = Value::new(&tracker, true);
        let a = Value::new(&tracker, "a");
        let b = Value::new(&tracker, "b");
        let pick = Formula::try_new(&tracker, {
            let (cond, a, b) = (cond.clone(), a.clone(), b.clone());
            move || if cond.get()? { a.get() } else { b.get() }
        });

        assert_eq!(pick.get().unwrap(), "a");
        assert_eq!(pick.dependency_ids(), vec![cond.id(), a.id()]);

        cond.set(false).unwrap();
        assert_eq!(pick.get().unwrap(), "b");
        assert_eq!(pick.dependency_ids(), vec![cond.id(), b.id()]);
        assert_eq!(a.dependent_count(), 0);

        a.set("ignored").unwrap();
        assert!(!pick.is_dirty());
        b.set("bee").unwrap();
        assert!(pick.is_dirty());
    }

    #[test]
    fn self_invalidation_while_computing_is_rejected() {
        let tracker = Tracker::new();
        let slot: Rc<RefCell<Option<WeakFormula<i32>>>> = Rc::new(RefCell::new(None));
        let observed = Rc::new(RefCell::new(None));

        let formula = Formula::new(&tracker, {
            let slot = Rc::clone(&slot);
            let observed = Rc::clone(&observed);
            move || {
                let me = slot.borrow().as_ref().and_then(WeakFormula::upgrade);
                if let Some(me) = me {
                    *observed.borrow_mut() = Some(me.invalidate());
                }
                1
            }
        });
        *slot.borrow_mut() = Some(formula.downgrade());

        assert_eq!(formula.get().unwrap(), 1);
        assert!(matches!(
            observed.borrow_mut().take(),
            Some(Err(ReactiveError::ReentrantInvalidation { .. }))
        ));

        assert!(!formula.is_active());
        assert!(!formula.is_dirty());
        assert_eq!(formula.get().unwrap(), 1);
        assert_eq!(formula.recompute_count(), 1);
    }

    #[test]
    fn writing_an_input_from_inside_compute_surfaces_the_error() {
        let tracker = Tracker::new();
        let input = Value::new(&tracker, 0);
        let formula = Formula::try_new(&tracker, {
            let input = input.clone();
            move || {
                let current = input.get()?;
                if current > 0 {
                    input.set(current + 1)?;
                }
                Ok(current)
            }
        });

        assert_eq!(formula.get().unwrap(), 0);
        input.set(1).unwrap();

        let err = formula.get().unwrap_err();
        assert!(matches!(
            err,
            ReactiveError::ReentrantInvalidation { formula: id } if id == formula.id()
        ));
        assert!(formula.is_dirty());
        assert!(!formula.is_active());
    }

    #[test]
    fn reading_self_while_computing_is_a_cycle() {
        let tracker = Tracker::new();
        let slot: Rc<RefCell<Option<WeakFormula<i32>>>> = Rc::new(RefCell::new(None));
        let formula = Formula::try_new(&tracker, {
            let slot = Rc::clone(&slot);
            move || {
                let me = slot.borrow().as_ref().and_then(WeakFormula::upgrade);
                match me {
                    Some(me) => me.get(),
                    None => Ok(0),
                }
            }
        });
        *slot.borrow_mut() = Some(formula.downgrade());

        assert!(matches!(formula.get(), Err(ReactiveError::CyclicRead { .. })));
        assert!(formula.is_dirty());
    }

    #[test]
    fn compute_error_leaves_formula_dirty_and_retries() {
        let tracker = Tracker::new();
        let input = Value::new(&tracker, -1);
        let calls = counter();
        let sqrt = Formula::try_new(&tracker, {
            let input = input.clone();
            let calls = Rc::clone(&calls);
            move || {
                bump(&calls);
                let n = input.get()?;
                if n < 0 {
                    return Err(ReactiveError::compute(format!("negative input {n}")));
                }
                Ok((n as f64).sqrt())
            }
        });

        assert!(matches!(sqrt.get(), Err(ReactiveError::Compute(_))));
        assert!(sqrt.is_dirty());
        assert!(!sqrt.is_active());

        assert!(sqrt.get().is_err());
        assert_eq!(calls.get(), 2);

        input.set(16).unwrap();
        assert_eq!(sqrt.get().unwrap(), 4.0);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn failed_formula_refires_listeners_but_not_dependents() {
        let tracker = Tracker::new();
        let input = Value::new(&tracker, 1);
        let heard = counter();
        let checked = Formula::try_new(&tracker, {
            let input = input.clone();
            move || match input.get()? {
                0 => Err(ReactiveError::compute("zero")),
                n => Ok(n),
            }
        });
        let downstream_runs = counter();
        let downstream = Formula::try_new(&tracker, {
            let (checked, downstream_runs) = (checked.clone(), Rc::clone(&downstream_runs));
            move || {
                bump(&downstream_runs);
                Ok(checked.get()? * 2)
            }
        });
        checked.on_invalidate({
            let heard = Rc::clone(&heard);
            move || bump(&heard)
        });

        assert_eq!(downstream.get().unwrap(), 2);
        input.set(0).unwrap();
        assert_eq!(heard.get(), 1);
        assert!(checked.get().is_err());

        input.set(3).unwrap();
        assert_eq!(heard.get(), 2);
        input.set(4).unwrap();
        assert_eq!(heard.get(), 2);
        assert_eq!(downstream_runs.get(), 1);

        assert_eq!(downstream.get().unwrap(), 8);
        input.set(5).unwrap();
        assert_eq!(heard.get(), 3);
    }

    #[test]
    fn first_failure_still_subscribes_to_inputs_read() {
        let tracker = Tracker::new();
        let input = Value::new(&tracker, 0);
        let heard = counter();
        let formula = Formula::try_new(&tracker, {
            let input = input.clone();
            move || match input.get()? {
                0 => Err(ReactiveError::compute("not ready")),
                n => Ok(n),
            }
        });
        formula.on_invalidate({
            let heard = Rc::clone(&heard);
            move || bump(&heard)
        });

        assert!(formula.get().is_err());
        assert_eq!(formula.dependency_ids(), vec![input.id()]);

        input.set(7).unwrap();
        assert_eq!(heard.get(), 1);
        assert_eq!(formula.get().unwrap(), 7);
    }

    #[test]
    fn panicking_compute_leaves_formula_dirty() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let tracker = Tracker::new();
        let explode = Rc::new(Cell::new(true));
        let formula = Formula::new(&tracker, {
            let explode = Rc::clone(&explode);
            move || {
                if explode.get() {
                    panic!("compute exploded");
                }
                7
            }
        });

        let outcome = catch_unwind(AssertUnwindSafe(|| formula.get()));
        assert!(outcome.is_err());
        assert!(formula.is_dirty());
        assert!(!formula.is_active());
        assert_eq!(tracker.depth(), 0);

        explode.set(false);
        assert_eq!(formula.get().unwrap(), 7);
    }

    #[test]
    fn dropping_formula_unregisters_from_inputs() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 1);
        let formula = Formula::try_new(&tracker, {
            let base = base.clone();
            move || base.get()
        });

        formula.get().unwrap();
        assert_eq!(base.dependent_count(), 1);

        drop(formula);
        assert_eq!(base.dependent_count(), 0);
        base.set(2).unwrap();
    }

    #[test]
    fn weak_dependents_do_not_keep_formulas_alive() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 1);
        let formula = Formula::try_new(&tracker, {
            let base = base.clone();
            move || base.get()
        });
        formula.get().unwrap();

        let weak = formula.downgrade();
        drop(formula);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn dispose_detaches_and_allows_reuse() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 1);
        let formula = Formula::try_new(&tracker, {
            let base = base.clone();
            move || base.get()
        });

        formula.get().unwrap();
        formula.dispose().unwrap();
        assert_eq!(base.dependent_count(), 0);
        assert!(formula.is_dirty());
        assert!(formula.dependency_ids().is_empty());

        assert_eq!(formula.get().unwrap(), 1);
        assert_eq!(base.dependent_count(), 1);
    }

    #[test]
    fn listeners_run_with_reads_locked() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 1);
        let formula = Formula::try_new(&tracker, {
            let base = base.clone();
            move || base.get()
        });
        let attempted = Rc::new(RefCell::new(None));
        formula.on_invalidate({
            let base = base.clone();
            let attempted = Rc::clone(&attempted);
            move || *attempted.borrow_mut() = Some(base.get())
        });

        formula.get().unwrap();
        base.set(2).unwrap();

        assert!(matches!(
            attempted.borrow_mut().take(),
            Some(Err(ReactiveError::TrackingViolation { .. }))
        ));
        assert!(!tracker.reads_locked());
    }

    #[test]
    fn untracked_read_does_not_create_a_dependency() {
        let tracker = Tracker::new();
        let base = Value::new(&tracker, 1);
        let inner = Formula::try_new(&tracker, {
            let base = base.clone();
            move || base.get()
        });
        let outer = Formula::try_new(&tracker, {
            let inner = inner.clone();
            move || inner.get_untracked()
        });

        assert_eq!(outer.get().unwrap(), 1);
        assert!(outer.dependency_ids().is_empty());
        assert_eq!(inner.dependent_count(), 0);
        assert_eq!(inner.dependency_ids(), vec![base.id()]);
    }
}
