//! Performance Metrics Module
//!
//! Optional per-stack breakdown of what the operation counter counts: how many
//! calls were pushes, how many pops found a value, how many found the stack
//! empty, and how often a caller hit contention (a lost CAS race in the
//! lock-free stack, a lock that was already held in the locked one).
//!
//! The operation counter itself lives on the stacks and is always exact. These
//! metrics can be switched off at runtime to take their extra atomics off the
//! hot path.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use crossbeam_utils::CachePadded;

/// Point-in-time snapshot of a stack's metrics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StackMetrics {
    /// Completed push calls
    pub pushes: u64,
    /// Pop calls that returned a value
    pub pops: u64,
    /// Pop calls that found the stack empty
    pub empty_pops: u64,
    /// Lost CAS races or contended lock acquisitions
    pub contention_events: u64,
}

impl StackMetrics {
    /// All recorded push and pop calls
    pub fn total_operations(&self) -> u64 {
        self.pushes + self.pops + self.empty_pops
    }

    /// Percentage of pop calls that returned a value
    pub fn pop_hit_rate(&self) -> f64 {
        let attempts = self.pops + self.empty_pops;
        if attempts == 0 {
            0.0
        } else {
            (self.pops as f64 / attempts as f64) * 100.0
        }
    }

    /// Contention events per hundred operations
    ///
    /// Can exceed 100 when a single call retries several times.
    pub fn contention_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            0.0
        } else {
            (self.contention_events as f64 / total as f64) * 100.0
        }
    }
}

/// Internal atomic metrics collection
///
/// Pushers and poppers bump different counters, so each one sits on its own
/// cache line.
#[derive(Debug)]
pub struct AtomicMetrics {
    enabled: AtomicBool,
    pushes: CachePadded<AtomicU64>,
    pops: CachePadded<AtomicU64>,
    empty_pops: CachePadded<AtomicU64>,
    contention_events: CachePadded<AtomicU64>,
}

impl Default for AtomicMetrics {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            pushes: CachePadded::new(AtomicU64::new(0)),
            pops: CachePadded::new(AtomicU64::new(0)),
            empty_pops: CachePadded::new(AtomicU64::new(0)),
            contention_events: CachePadded::new(AtomicU64::new(0)),
        }
    }
}

impl AtomicMetrics {
    #[inline]
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record a completed push
    #[inline]
    pub fn record_push(&self) {
        if self.is_enabled() {
            self.pushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed pop, `hit` being whether it returned a value
    #[inline]
    pub fn record_pop(&self, hit: bool) {
        if !self.is_enabled() {
            return;
        }
        if hit {
            self.pops.fetch_add(1, Ordering::Relaxed);
        } else {
            self.empty_pops.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one contention event
    #[inline]
    pub fn record_contention(&self) {
        if self.is_enabled() {
            self.contention_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> StackMetrics {
        StackMetrics {
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            empty_pops: self.empty_pops.load(Ordering::Relaxed),
            contention_events: self.contention_events.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.pushes.store(0, Ordering::Relaxed);
        self.pops.store(0, Ordering::Relaxed);
        self.empty_pops.store(0, Ordering::Relaxed);
        self.contention_events.store(0, Ordering::Relaxed);
    }

    /// Enable or disable collection
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether collection is currently enabled
    pub fn enabled(&self) -> bool {
        self.is_enabled()
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> StackMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
