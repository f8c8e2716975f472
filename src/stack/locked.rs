//! Lock-Based Stack
//!
//! The baseline: a plain linked stack and its operation counter behind one
//! `parking_lot::Mutex`. Every operation, `counter()` included, runs inside a
//! single self-contained critical section, so there is no retry logic, no ABA
//! hazard and no way to deadlock.

use crate::metrics::{AtomicMetrics, MetricsCollector, StackMetrics};
use crate::stack::{ConcurrentStack, StackVariant};
use core::fmt;
use parking_lot::{Mutex, MutexGuard};

struct Node<T> {
    value: T,
    next: Option<Box<Node<T>>>,
}

struct Inner<T> {
    head: Option<Box<Node<T>>>,
    len: usize,
    counter: u64,
}

/// A linearizable stack serialized by a single mutex
///
/// Observable behavior matches [`LockFreeStack`](crate::stack::LockFreeStack)
/// for any single-threaded sequence of calls. Under contention callers block
/// on the lock instead of retrying.
///
/// ```rust
/// use treiber_stack::stack::LockedStack;
///
/// let stack = LockedStack::new();
/// stack.push("a");
/// stack.push("b");
/// assert_eq!(stack.pop(), Some("b"));
/// assert_eq!(stack.len(), 1);
/// assert_eq!(stack.counter(), 3);
/// ```
pub struct LockedStack<T> {
    inner: Mutex<Inner<T>>,
    metrics: AtomicMetrics,
}

impl<T> LockedStack<T> {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                head: None,
                len: 0,
                counter: 0,
            }),
            metrics: AtomicMetrics::default(),
        }
    }

    /// Take the lock, recording a contention event if someone else holds it
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        match self.inner.try_lock() {
            Some(guard) => guard,
            None => {
                self.metrics.record_contention();
                self.inner.lock()
            }
        }
    }

    /// Push a value onto the stack
    pub fn push(&self, value: T) {
        // allocate outside the critical section
        let mut node = Box::new(Node { value, next: None });
        {
            let mut inner = self.lock();
            node.next = inner.head.take();
            inner.head = Some(node);
            inner.len += 1;
            inner.counter += 1;
        }
        self.metrics.record_push();
    }

    /// Pop a value from the stack, `None` if it is empty
    ///
    /// An empty pop still increments the counter.
    pub fn pop(&self) -> Option<T> {
        let node = {
            let mut inner = self.lock();
            inner.counter += 1;
            match inner.head.take() {
                Some(mut node) => {
                    inner.head = node.next.take();
                    inner.len -= 1;
                    Some(node)
                }
                None => None,
            }
        };
        self.metrics.record_pop(node.is_some());
        node.map(|node| node.value)
    }

    /// Number of completed `push` and `pop` calls
    ///
    /// Takes the lock, so the value is exact at the instant it is read.
    #[doc(alias = "get_counter")]
    pub fn counter(&self) -> u64 {
        self.inner.lock().counter
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().head.is_none()
    }

    /// Exact number of elements in the stack
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// Pop up to `max_count` elements, stopping at the first empty pop
    pub fn pop_batch(&self, max_count: usize) -> Vec<T> {
        let mut result = Vec::with_capacity(max_count.min(self.len()));

        for _ in 0..max_count {
            match self.pop() {
                Some(value) => result.push(value),
                None => break,
            }
        }

        result
    }

    /// Push every element of `values`; the last one ends up on top
    pub fn push_batch<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.push(value);
        }
    }
}

impl<T> Default for LockedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LockedStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LockedStack")
            .field("len", &inner.len)
            .field("counter", &inner.counter)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for LockedStack<T> {
    fn drop(&mut self) {
        // unlink iteratively; the default Box drop recurses once per node
        let mut head = self.inner.get_mut().head.take();
        while let Some(mut node) = head {
            head = node.next.take();
        }
    }
}

impl<T: Send> ConcurrentStack<T> for LockedStack<T> {
    fn push(&self, value: T) {
        LockedStack::push(self, value)
    }

    fn pop(&self) -> Option<T> {
        LockedStack::pop(self)
    }

    fn counter(&self) -> u64 {
        LockedStack::counter(self)
    }

    fn is_empty(&self) -> bool {
        LockedStack::is_empty(self)
    }

    fn variant(&self) -> StackVariant {
        StackVariant::Locked
    }
}

impl<T> MetricsCollector for LockedStack<T> {
    fn metrics(&self) -> StackMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics.set_enabled(enabled);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics.enabled()
    }
}
