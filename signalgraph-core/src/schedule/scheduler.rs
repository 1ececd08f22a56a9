//! Cooperative Scheduler
//!
//! The scheduler defers work to a later turn of the host loop and runs it in
//! priority order under a wall-clock budget. Consumers use it to coalesce
//! many invalidations into one later pass, for example a single re-render
//! after a burst of writes.
//!
//! # Drain Passes
//!
//! The first `add` of a burst arms a drain pass with
//! [`tokio::task::spawn_local`], so it runs after the current synchronous
//! code returns control to the executor. A pass dequeues and runs items
//! until the queue is empty or the timeslice is spent; in the latter case it
//! arms the next pass and yields. `pending` stays true across all passes of
//! one burst and clears only when a pass finds the queue empty.
//!
//! # Asynchronous Work
//!
//! Work items return a [`Completion`]. `Completion::Pending` carries a
//! future that the pass awaits before moving on, so a single item may
//! suspend the pass. The budget bounds how much is drained per pass, not
//! how long one item may take.
//!
//! # Requirements
//!
//! Adding work arms passes with `spawn_local`, so it must happen inside a
//! [`tokio::task::LocalSet`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::SchedulerConfig;
use super::queue::{Priority, PriorityQueue};

/// Outcome of invoking a work item.
pub enum Completion {
    /// The item finished synchronously.
    Done,
    /// The item continues asynchronously; the pass awaits it.
    Pending(LocalBoxFuture<'static, ()>),
}

/// A deferred unit of work.
pub type Work = Box<dyn FnOnce() -> Completion>;

struct Shared {
    queue: RefCell<PriorityQueue<Work>>,
    config: SchedulerConfig,
    cycles: Cell<u64>,
    pending: Cell<bool>,
    idle: Notify,
}

/// Time-sliced, priority-ordered runner for deferred work.
///
/// Cloning a `Scheduler` yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    shared: Rc<Shared>,
}

impl Scheduler {
    /// Create a scheduler with the default 10ms timeslice.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                queue: RefCell::new(PriorityQueue::new()),
                config,
                cycles: Cell::new(0),
                pending: Cell::new(false),
                idle: Notify::new(),
            }),
        }
    }

    /// Queue a synchronous work item.
    pub fn add(&self, work: impl FnOnce() + 'static, priority: Priority) {
        self.add_work(
            Box::new(move || {
                work();
                Completion::Done
            }),
            priority,
        );
    }

    /// Queue a work item whose body is asynchronous.
    pub fn add_async<F, Fut>(&self, work: F, priority: Priority)
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.add_work(Box::new(move || Completion::Pending(work().boxed_local())), priority);
    }

    /// Queue a raw work item, arming a drain pass if none is pending.
    pub fn add_work(&self, work: Work, priority: Priority) {
        let armed = {
            let mut queue = self.shared.queue.borrow_mut();
            queue.enqueue(work, priority);
            !self.shared.pending.get() && !queue.is_empty()
        };

        if armed {
            self.shared.pending.set(true);
            arm(Rc::clone(&self.shared));
        }
    }

    /// Number of drain passes started so far.
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.get()
    }

    /// Whether a burst is in progress: work was added and the queue has not
    /// yet been seen empty at the end of a pass.
    pub fn is_pending(&self) -> bool {
        self.shared.pending.get()
    }

    /// Number of queued, not yet started items.
    pub fn queued(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Resolve once the current burst, if any, has drained.
    pub async fn idle(&self) {
        while self.shared.pending.get() {
            self.shared.idle.notified().await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("cycles", &self.cycles())
            .field("pending", &self.is_pending())
            .field("queued", &self.queued())
            .finish()
    }
}

fn arm(shared: Rc<Shared>) {
    tokio::task::spawn_local(drain_pass(shared));
}

/// Ends a pass that did not hand off to a successor. If items are still
/// queued, which happens when a work item panics, the next pass is armed and
/// the burst stays pending. Otherwise `pending` clears and `idle` waiters
/// wake.
struct PassGuard {
    shared: Rc<Shared>,
    handed_off: bool,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        if self.handed_off {
            return;
        }

        let remaining = self.shared.queue.borrow().len();
        if remaining > 0 {
            warn!(remaining, "drain pass aborted, re-arming for queued work");
            arm(Rc::clone(&self.shared));
            return;
        }

        self.shared.pending.set(false);
        self.shared.idle.notify_waiters();
    }
}

async fn drain_pass(shared: Rc<Shared>) {
    let cycle = shared.cycles.get() + 1;
    shared.cycles.set(cycle);

    let budget = shared.config.max_timeslice();
    let start = Instant::now();
    let mut ran = 0usize;
    let mut guard = PassGuard {
        shared: Rc::clone(&shared),
        handed_off: false,
    };

    loop {
        let next = shared.queue.borrow_mut().dequeue();
        let Some(work) = next else {
            debug!(cycle, ran, elapsed = ?start.elapsed(), "drain pass finished, queue empty");
            return;
        };

        if let Completion::Pending(future) = work() {
            future.await;
        }
        ran += 1;

        if start.elapsed() >= budget {
            let remaining = shared.queue.borrow().len();
            if remaining == 0 {
                debug!(cycle, ran, elapsed = ?start.elapsed(), "drain pass finished at budget");
                return;
            }

            debug!(
                cycle,
                ran,
                remaining,
                elapsed = ?start.elapsed(),
                "timeslice exhausted, re-arming"
            );
            guard.handed_off = true;
            arm(Rc::clone(&shared));
            return;
        }
    }
}
