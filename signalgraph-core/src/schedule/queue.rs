//! Priority Queue
//!
//! A work queue ordered by priority, highest first, with FIFO order among
//! equal priorities.
//!
//! # Lazy Sorting
//!
//! Entries are kept physically in dequeue order: highest priority at the
//! front, lowest at the back. An enqueue that fits at the tail (its priority
//! is not above the current tail's) keeps that order for free. Anything else
//! only raises the `dirty` flag; the stable sort runs once, right before the
//! next read. Enqueueing in non-increasing priority order never sorts.

use std::collections::VecDeque;
use std::fmt;

/// Priority of a queued item. Larger runs earlier.
pub type Priority = i32;

/// FIFO-stable priority queue with deferred sorting.
pub struct PriorityQueue<T> {
    entries: VecDeque<(Priority, T)>,
    dirty: bool,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            dirty: false,
        }
    }

    /// Append `item`. Marks the queue dirty if it sorts ahead of the tail.
    pub fn enqueue(&mut self, item: T, priority: Priority) {
        if let Some((tail, _)) = self.entries.back() {
            if priority > *tail {
                self.dirty = true;
            }
        }
        self.entries.push_back((priority, item));
    }

    /// Remove and return the highest-priority item.
    pub fn dequeue(&mut self) -> Option<T> {
        self.ensure_sorted();
        self.entries.pop_front().map(|(_, item)| item)
    }

    /// The item `dequeue` would return next.
    pub fn peek(&mut self) -> Option<&T> {
        self.ensure_sorted();
        self.entries.front().map(|(_, item)| item)
    }

    /// Priority of the item `dequeue` would return next.
    pub fn peek_priority(&mut self) -> Option<Priority> {
        self.ensure_sorted();
        self.entries.front().map(|(priority, _)| *priority)
    }

    /// Remove and return the lowest-priority item.
    ///
    /// Among equal lowest priorities this is the most recently enqueued.
    pub fn pull(&mut self) -> Option<T> {
        self.ensure_sorted();
        self.entries.pop_back().map(|(_, item)| item)
    }

    /// Iterate in dequeue order. Reverse it for lowest-first.
    pub fn iter(&mut self) -> impl DoubleEndedIterator<Item = (Priority, &T)> + '_ {
        self.ensure_sorted();
        self.entries.iter().map(|(priority, item)| (*priority, item))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a sort is pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = false;
    }

    fn ensure_sorted(&mut self) {
        if self.dirty {
            // slice::sort_by is stable, which keeps FIFO among equals.
            self.entries
                .make_contiguous()
                .sort_by(|(a, _), (b, _)| b.cmp(a));
            self.dirty = false;
        }
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("len", &self.entries.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
