//! Throughput Driver
//!
//! Runs a fixed number of pushing and popping threads against one shared stack
//! for a fixed wall-clock window and reports how many operations the stack
//! completed.
//!
//! ```rust
//! use std::time::Duration;
//! use treiber_stack::driver::{run_variant, DriverConfig, StackVariant};
//!
//! let config = DriverConfig {
//!     duration: Duration::from_millis(20),
//!     prefill: 1_000,
//!     ..DriverConfig::default()
//! };
//! let report = run_variant(StackVariant::LockFree, &config)?;
//! assert!(report.window_operations > 0);
//! # Ok::<(), treiber_stack::Error>(())
//! ```

use crate::metrics::{MetricsCollector, StackMetrics};
use crate::stack::{ConcurrentStack, LockFreeStack, LockedStack};
use crate::util::BackoffPolicy;
use crate::{Error, Result};
use core::fmt;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use crate::stack::StackVariant;

/// Parameters of one throughput run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Threads calling `push` in a loop
    pub pushers: usize,
    /// Threads calling `pop` in a loop
    pub poppers: usize,
    /// Length of the measured window
    pub duration: Duration,
    /// Random values pushed before the workers start
    pub prefill: usize,
    /// Backoff used by the lock-free stack
    pub backoff: BackoffPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            pushers: 2,
            poppers: 2,
            duration: Duration::from_secs(10),
            prefill: 100_000,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl DriverConfig {
    /// Reject configurations that cannot produce a measurement
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(Error::InvalidConfig("duration must be non-zero".into()));
        }
        match self.pushers.checked_add(self.poppers) {
            None => Err(Error::InvalidConfig(format!(
                "{} pushers and {} poppers is too many workers",
                self.pushers, self.poppers
            ))),
            Some(0) => Err(Error::InvalidConfig(
                "at least one pusher or popper is required".into(),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Whether a worker pushed or popped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    /// Calls `push` with random values
    Pusher,
    /// Calls `pop`
    Popper,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Pusher => f.write_str("pusher"),
            WorkerRole::Popper => f.write_str("popper"),
        }
    }
}

/// What a single worker did during the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Thread name, e.g. `pusher-0`
    pub name: String,
    /// Push or pop
    pub role: WorkerRole,
    /// Stack calls this worker completed
    pub calls: u64,
    /// Pops that found the stack empty (always 0 for pushers)
    pub empty_pops: u64,
}

/// Result of one throughput run
#[derive(Debug, Clone)]
pub struct ThroughputReport {
    /// Stack implementation measured
    pub variant: StackVariant,
    /// Raw stack counter after all workers joined, prefill included
    pub counter: u64,
    /// Operations completed by the workers
    pub window_operations: u64,
    /// Configured window length
    pub duration: Duration,
    /// Measured time from start signal to last join
    pub elapsed: Duration,
    /// Per-worker breakdown
    pub workers: Vec<WorkerReport>,
    /// Metrics breakdown collected by the stack
    pub metrics: StackMetrics,
}

impl ThroughputReport {
    /// Worker operations per second of measured time
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.window_operations as f64 / secs
        }
    }
}

impl fmt::Display for ThroughputReport {
    /// Counts worker operations only; the prefill is in `counter`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} operations were performed in ",
            group_thousands(self.window_operations)
        )?;
        if self.duration.subsec_nanos() == 0 {
            write!(f, "{} seconds", self.duration.as_secs())
        } else if self.duration < Duration::from_millis(1) {
            // three decimals would print 0.000
            write!(f, "{:?}", self.duration)
        } else {
            write!(f, "{:.3} seconds", self.duration.as_secs_f64())
        }
    }
}

/// Format `n` with `,` between groups of three digits
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Build the requested stack and run it with `config`
pub fn run_variant(variant: StackVariant, config: &DriverConfig) -> Result<ThroughputReport> {
    match variant {
        StackVariant::LockFree => {
            run_throughput(Arc::new(LockFreeStack::with_backoff(config.backoff)), config)
        }
        StackVariant::Locked => run_throughput(Arc::new(LockedStack::new()), config),
    }
}

/// Run `config.pushers` pushing and `config.poppers` popping threads on `stack`
///
/// The stack is prefilled, the workers are released together, and after
/// `config.duration` a stop flag is raised. Every worker finishes its
/// in-flight call before it is joined, so the returned counter is exact.
pub fn run_throughput<S>(stack: Arc<S>, config: &DriverConfig) -> Result<ThroughputReport>
where
    S: ConcurrentStack<i32> + MetricsCollector + 'static,
{
    config.validate()?;
    let variant = stack.variant();

    let mut rng = rand::rng();
    for _ in 0..config.prefill {
        stack.push(rng.random());
    }
    let baseline = stack.counter();
    debug!(%variant, prefill = config.prefill, baseline, "stack prefilled");

    info!(
        %variant,
        pushers = config.pushers,
        poppers = config.poppers,
        duration = ?config.duration,
        backoff = %config.backoff,
        "starting throughput run"
    );

    let go = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));
    let roles = std::iter::repeat(WorkerRole::Pusher)
        .take(config.pushers)
        .chain(std::iter::repeat(WorkerRole::Popper).take(config.poppers));

    let mut handles = Vec::new();
    let mut spawn_error = None;
    let (mut pusher_id, mut popper_id) = (0, 0);
    for role in roles {
        let name = match role {
            WorkerRole::Pusher => {
                pusher_id += 1;
                format!("pusher-{}", pusher_id - 1)
            }
            WorkerRole::Popper => {
                popper_id += 1;
                format!("popper-{}", popper_id - 1)
            }
        };
        let stack = Arc::clone(&stack);
        let go_flag = Arc::clone(&go);
        let stop_flag = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&*stack, role, &go_flag, &stop_flag));
        match spawned {
            Ok(handle) => handles.push((name, role, handle)),
            Err(err) => {
                spawn_error = Some(err);
                break;
            }
        }
    }

    let start = Instant::now();
    if spawn_error.is_none() {
        go.store(true, Ordering::Release);
        thread::sleep(config.duration);
    }
    stop.store(true, Ordering::Relaxed);

    let mut workers = Vec::with_capacity(handles.len());
    let mut panicked = None;
    for (name, role, handle) in handles {
        match handle.join() {
            Ok((calls, empty_pops)) => {
                debug!(worker = %name, calls, empty_pops, "worker finished");
                workers.push(WorkerReport {
                    name,
                    role,
                    calls,
                    empty_pops,
                });
            }
            Err(_) => {
                warn!(worker = %name, "worker panicked");
                panicked.get_or_insert(name);
            }
        }
    }
    let elapsed = start.elapsed();

    if let Some(err) = spawn_error {
        return Err(Error::Spawn(err));
    }
    if let Some(name) = panicked {
        return Err(Error::WorkerPanicked(name));
    }

    let counter = stack.counter();
    let window_operations = counter - baseline;
    let issued: u64 = workers.iter().map(|w| w.calls).sum();
    if issued != window_operations {
        warn!(
            %variant,
            issued,
            counted = window_operations,
            "stack counter disagrees with worker call counts"
        );
    }

    let report = ThroughputReport {
        variant,
        counter,
        window_operations,
        duration: config.duration,
        elapsed,
        workers,
        metrics: stack.metrics(),
    };
    info!(
        %variant,
        operations = report.window_operations,
        ops_per_sec = report.ops_per_sec() as u64,
        elapsed = ?report.elapsed,
        "throughput run finished"
    );
    Ok(report)
}

/// Returns (calls, empty pops)
fn worker_loop<S>(stack: &S, role: WorkerRole, go: &AtomicBool, stop: &AtomicBool) -> (u64, u64)
where
    S: ConcurrentStack<i32> + ?Sized,
{
    while !go.load(Ordering::Acquire) {
        if stop.load(Ordering::Relaxed) {
            return (0, 0);
        }
        thread::yield_now();
    }

    let mut calls = 0u64;
    let mut empty_pops = 0u64;
    match role {
        WorkerRole::Pusher => {
            let mut rng = rand::rng();
            while !stop.load(Ordering::Relaxed) {
                stack.push(rng.random());
                calls += 1;
            }
        }
        WorkerRole::Popper => {
            while !stop.load(Ordering::Relaxed) {
                if stack.pop().is_none() {
                    empty_pops += 1;
                }
                calls += 1;
            }
        }
    }
    (calls, empty_pops)
}
