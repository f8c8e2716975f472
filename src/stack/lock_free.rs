//! Lock-Free Stack Implementation
//!
//! A lock-free stack based on Treiber's algorithm.
//!
//! ## Memory Ordering
//!
//! ```text
//! push                                   pop
//! ----                                   ---
//! write node.next (Relaxed)
//! CAS head -> node (Release)  ---->      load head (Acquire)
//!                                        read node.next, node.data
//!                                        CAS head -> next (AcqRel)
//! ```
//!
//! The successful CAS is the linearization point of both operations. The
//! counter is bumped after it, so a completed call is always counted.
//!
//! ## Reclamation
//!
//! A popper that lost the race may still hold a pointer to a node another
//! thread already unlinked. Nodes are therefore retired through
//! `crossbeam-epoch` and only freed once every thread pinned at the time of the
//! unlink has unpinned, so a stale pointer is never reused for a new node and
//! the loser's CAS simply fails.

use crate::metrics::{AtomicMetrics, MetricsCollector, StackMetrics};
use crate::stack::{ConcurrentStack, StackVariant};
use crate::util::BackoffPolicy;
use core::fmt;
use core::mem::ManuallyDrop;
use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};
use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::CachePadded;

/// A node in the lock-free stack
///
/// `data` is moved out by the popping thread with `ptr::read`, so the node
/// itself must never drop it.
struct Node<T> {
    data: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

/// A lock-free stack implementation using Treiber's algorithm
///
/// This stack provides:
/// - Lock-free push and pop: some contending thread always completes
/// - ABA safety through epoch-based reclamation
/// - An exact, non-blocking operation counter
/// - Optional metrics on pops and contention
///
/// # Examples
///
/// ```rust
/// use treiber_stack::stack::LockFreeStack;
///
/// let stack = LockFreeStack::new();
///
/// stack.push(1);
/// stack.push(2);
/// stack.push(3);
///
/// assert_eq!(stack.pop(), Some(3));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// assert_eq!(stack.counter(), 7);
/// ```
pub struct LockFreeStack<T> {
    /// The head pointer of the stack
    head: CachePadded<Atomic<Node<T>>>,
    /// Completed push and pop calls
    counter: CachePadded<AtomicU64>,
    /// Pause applied after a lost CAS
    backoff: BackoffPolicy,
    metrics: AtomicMetrics,
}

// SAFETY: values are only ever moved between threads, never shared: a value
// is written by one pusher and read out by exactly one popper. The head and
// counter are atomics.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

impl<T> LockFreeStack<T> {
    /// Create a new empty lock-free stack with the default backoff
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiber_stack::stack::LockFreeStack;
    ///
    /// let stack: LockFreeStack<i32> = LockFreeStack::new();
    /// assert!(stack.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_backoff(BackoffPolicy::default())
    }

    /// Create a new empty stack that pauses according to `backoff` after a lost CAS
    ///
    /// ```rust
    /// use treiber_stack::stack::LockFreeStack;
    /// use treiber_stack::util::BackoffPolicy;
    ///
    /// let stack: LockFreeStack<u64> = LockFreeStack::with_backoff(BackoffPolicy::PARK_MIN);
    /// assert_eq!(stack.backoff(), BackoffPolicy::PARK_MIN);
    /// ```
    pub fn with_backoff(backoff: BackoffPolicy) -> Self {
        Self {
            head: CachePadded::new(Atomic::null()),
            counter: CachePadded::new(AtomicU64::new(0)),
            backoff,
            metrics: AtomicMetrics::default(),
        }
    }

    /// The backoff policy used on CAS failure
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Push a value onto the stack
    ///
    /// Never fails. Under contention the call retries, pausing briefly after
    /// each lost race; it does not block on any lock.
    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            data: ManuallyDrop::new(value),
            next: Atomic::null(),
        });
        let backoff = self.backoff.start();
        let guard = epoch::pin();

        loop {
            let head = self.head.load(Ordering::Relaxed, &guard);
            // not yet visible to other threads
            node.next.store(head, Ordering::Relaxed);

            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => break,
                Err(err) => {
                    node = err.new;
                    self.metrics.record_contention();
                    backoff.pause();
                }
            }
        }

        self.counter.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_push();
    }

    /// Pop a value from the stack
    ///
    /// Returns `None` if the stack was empty when observed. That call still
    /// counts as an operation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiber_stack::stack::LockFreeStack;
    ///
    /// let stack: LockFreeStack<i32> = LockFreeStack::new();
    /// assert_eq!(stack.pop(), None);
    /// assert_eq!(stack.counter(), 1);
    /// ```
    pub fn pop(&self) -> Option<T> {
        let backoff = self.backoff.start();
        let guard = epoch::pin();

        let value = loop {
            let head = self.head.load(Ordering::Acquire, &guard);

            // SAFETY: the guard keeps any node reachable at load time alive.
            let node = match unsafe { head.as_ref() } {
                Some(node) => node,
                None => break None,
            };
            let next = node.next.load(Ordering::Relaxed, &guard);

            match self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, &guard)
            {
                Ok(_) => {
                    // SAFETY: the successful CAS unlinked `head`, so this thread
                    // is the only one that will read `data`; the node is freed
                    // only after every currently pinned thread unpins.
                    unsafe {
                        guard.defer_destroy(head);
                        break Some(ManuallyDrop::into_inner(ptr::read(&node.data)));
                    }
                }
                Err(_) => {
                    self.metrics.record_contention();
                    backoff.pause();
                }
            }
        };

        self.counter.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_pop(value.is_some());
        value
    }

    /// Number of completed `push` and `pop` calls
    ///
    /// Never blocks. Calls still in flight may be missing from the value.
    #[doc(alias = "get_counter")]
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Check if the stack is empty
    ///
    /// This is a snapshot and may be stale as soon as it returns.
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Get the approximate number of elements in the stack
    ///
    /// Traverses the whole chain. Use only for debugging or monitoring.
    ///
    /// ```rust
    /// use treiber_stack::stack::LockFreeStack;
    ///
    /// let stack = LockFreeStack::new();
    /// stack.push(1);
    /// stack.push(2);
    /// assert_eq!(stack.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        let guard = epoch::pin();
        let mut count = 0;
        let mut current = self.head.load(Ordering::Acquire, &guard);

        // SAFETY: every node reachable while pinned stays allocated.
        while let Some(node) = unsafe { current.as_ref() } {
            count += 1;
            current = node.next.load(Ordering::Acquire, &guard);
        }

        count
    }

    /// Pop up to `max_count` elements, stopping at the first empty pop
    ///
    /// Each element is a separate pop call and is counted as such.
    pub fn pop_batch(&self, max_count: usize) -> Vec<T> {
        // max_count is a bound, not a size hint
        let mut result = Vec::new();

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

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LockFreeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeStack")
            .field("counter", &self.counter())
            .field("is_empty", &self.is_empty())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the chain.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);

            while let Some(node) = current.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                let mut owned = current.into_owned();
                ManuallyDrop::drop(&mut owned.data);
                current = next;
            }
        }
    }
}

impl<T: Send> ConcurrentStack<T> for LockFreeStack<T> {
    fn push(&self, value: T) {
        LockFreeStack::push(self, value)
    }

    fn pop(&self) -> Option<T> {
        LockFreeStack::pop(self)
    }

    fn counter(&self) -> u64 {
        LockFreeStack::counter(self)
    }

    fn is_empty(&self) -> bool {
        LockFreeStack::is_empty(self)
    }

    fn variant(&self) -> StackVariant {
        StackVariant::LockFree
    }
}

impl<T> MetricsCollector for LockFreeStack<T> {
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
