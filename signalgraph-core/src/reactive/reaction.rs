//! Reactions
//!
//! A Reaction couples a [`Formula`] with a [`Scheduler`]. Whenever the
//! formula goes dirty, the reaction queues one deferred re-read; when that
//! work runs, the fresh value is handed to an effect callback. Any number of
//! writes between two drains collapse into a single run, because the
//! formula only reports the first `Clean -> Dirty` transition.
//!
//! A run whose recompute fails is logged and skipped. The next write to any
//! input the formula read queues a fresh run.
//!
//! Dropping the reaction drops its formula. Work already queued for it
//! becomes a no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::formula::{Formula, WeakFormula};
use super::tracker::Tracker;
use crate::error::ReactiveError;
use crate::schedule::{Priority, Scheduler};

/// A formula whose changes are delivered to an effect through a scheduler.
pub struct Reaction<T: Clone + 'static> {
    formula: Formula<T>,
    runs: Rc<Cell<u64>>,
}

impl<T: Clone + 'static> Reaction<T> {
    /// Create the reaction and queue its first run.
    pub fn new<C, E>(
        tracker: &Rc<Tracker>,
        scheduler: &Scheduler,
        priority: Priority,
        compute: C,
        effect: E,
    ) -> Self
    where
        C: Fn() -> Result<T, ReactiveError> + 'static,
        E: FnMut(T) + 'static,
    {
        let formula = Formula::try_new(tracker, compute);
        let runs = Rc::new(Cell::new(0));
        let run = Rc::new(Runner {
            formula: formula.downgrade(),
            effect: RefCell::new(effect),
            runs: Rc::clone(&runs),
        });

        formula.on_invalidate({
            let scheduler = scheduler.clone();
            let run = Rc::clone(&run);
            move || {
                let run = Rc::clone(&run);
                scheduler.add(move || run.run(), priority);
            }
        });
        scheduler.add(move || run.run(), priority);

        Self { formula, runs }
    }

    /// The underlying formula.
    pub fn formula(&self) -> &Formula<T> {
        &self.formula
    }

    /// How many times the effect has been invoked.
    pub fn runs(&self) -> u64 {
        self.runs.get()
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Reaction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("formula", &self.formula)
            .field("runs", &self.runs())
            .finish()
    }
}

struct Runner<T: 'static, E> {
    formula: WeakFormula<T>,
    effect: RefCell<E>,
    runs: Rc<Cell<u64>>,
}

impl<T: Clone + 'static, E: FnMut(T)> Runner<T, E> {
    fn run(&self) {
        let Some(formula) = self.formula.upgrade() else {
            return;
        };

        match formula.get() {
            Ok(value) => {
                self.runs.set(self.runs.get() + 1);
                let mut effect = self.effect.borrow_mut();
                (*effect)(value);
            }
            Err(err) => {
                warn!(formula = %formula.id(), error = %err, "reaction failed to recompute");
            }
        }
    }
}
