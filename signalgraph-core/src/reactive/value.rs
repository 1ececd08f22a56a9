//! Value Implementation
//!
//! A Value is the leaf of the graph: a signal holding a plain value. Reading
//! it inside a formula records a dependency; writing it invalidates every
//! formula that read it, synchronously, before `set` returns.
//!
//! # Equality Policy
//!
//! [`Value::new`] invalidates on every `set`, even if the new value equals
//! the old one. [`Value::distinct`] compares with `PartialEq` and skips
//! invalidation when nothing changed.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::node::{Signal, SignalId, SignalNode};
use super::tracker::Tracker;
use crate::error::ReactiveError;

type EqualFn<T> = fn(&T, &T) -> bool;

struct ValueInner<T> {
    node: SignalNode,
    value: RefCell<T>,
    equal: Option<EqualFn<T>>,
}

impl<T: 'static> Signal for ValueInner<T> {
    fn node(&self) -> &SignalNode {
        &self.node
    }
}

/// A writable reactive cell.
///
/// Cloning a `Value` yields another handle to the same cell.
pub struct Value<T: 'static> {
    inner: Rc<ValueInner<T>>,
}

impl<T: 'static> Value<T> {
    /// Create a value that invalidates dependents on every write.
    pub fn new(tracker: &Rc<Tracker>, value: T) -> Self {
        Self::build(tracker, None, value, None)
    }

    /// Create a value with a debug name.
    pub fn named(tracker: &Rc<Tracker>, name: impl Into<Cow<'static, str>>, value: T) -> Self {
        Self::build(tracker, Some(name.into()), value, None)
    }

    /// Create a value that uses `equal` to skip no-op writes.
    pub fn with_equality(tracker: &Rc<Tracker>, value: T, equal: fn(&T, &T) -> bool) -> Self {
        Self::build(tracker, None, value, Some(equal))
    }

    fn build(
        tracker: &Rc<Tracker>,
        name: Option<Cow<'static, str>>,
        value: T,
        equal: Option<EqualFn<T>>,
    ) -> Self {
        Self {
            inner: Rc::new(ValueInner {
                node: SignalNode::new(tracker, name),
                value: RefCell::new(value),
                equal,
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.node.id()
    }

    /// Read the value through a borrow, recording a dependency.
    ///
    /// The borrow is held while `f` runs; writing this value from inside `f`
    /// fails.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, ReactiveError> {
        self.inner.node.tracker().read(&self.inner)?;
        Ok(f(&*self.inner.value.borrow()))
    }

    /// Read the value through a borrow without recording a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Overwrite the value and invalidate dependents.
    ///
    /// With an equality policy installed, writing an equal value does
    /// nothing.
    ///
    /// Fails with [`ReactiveError::WriteWhileBorrowed`] when called from
    /// inside a [`with`](Self::with) or [`update`](Self::update) closure on
    /// the same value.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        {
            let mut slot = self.inner.value.try_borrow_mut().map_err(|_| {
                ReactiveError::WriteWhileBorrowed {
                    signal: self.inner.node.id(),
                }
            })?;
            if let Some(equal) = self.inner.equal {
                if equal(&*slot, &value) {
                    return Ok(());
                }
            }
            *slot = value;
        }
        self.inner.invalidate()
    }

    /// Replace the value using a function of the current one.
    ///
    /// `f` runs while the value is borrowed, so it must not write it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), ReactiveError> {
        let next = f(&*self.inner.value.borrow());
        self.set(next)
    }

    /// Invalidate dependents without changing the value.
    pub fn invalidate(&self) -> Result<(), ReactiveError> {
        self.inner.invalidate()
    }

    /// Number of formulas that read this value in their last recomputation.
    pub fn dependent_count(&self) -> usize {
        self.inner.node.dependent_count()
    }

    /// Type-erased handle, for code that handles values and formulas alike.
    pub fn as_signal(&self) -> Rc<dyn Signal> {
        Rc::clone(&self.inner) as Rc<dyn Signal>
    }
}

impl<T: Clone + 'static> Value<T> {
    /// Read the value, recording a dependency on the current formula.
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.with(T::clone)
    }

    /// Read the value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Value<T> {
    /// Create a value whose writes are skipped when equal to the current one.
    pub fn distinct(tracker: &Rc<Tracker>, value: T) -> Self {
        Self::build(tracker, None, value, Some(<T as PartialEq>::eq))
    }
}

impl<T: 'static> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("id", &self.id())
            .field("name", &self.inner.node.name())
            .field("value", &*self.inner.value.borrow())
            .field("dependents", &self.dependent_count())
            .finish()
    }
}
