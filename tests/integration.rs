//! Integration tests for treiber-stack
//!
//! These drive both stacks through the public API the way the throughput
//! driver does: many threads, no coordination between pushers and poppers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use treiber_stack::metrics::MetricsCollector;
use treiber_stack::util::BackoffPolicy;
use treiber_stack::{
    run_throughput, run_variant, ConcurrentStack, DriverConfig, LockFreeStack, LockedStack,
    StackVariant,
};

fn hammer<S: ConcurrentStack<u64>>(stack: &S, threads: u64, per_thread: u64) -> (Vec<u64>, u64) {
    let stop_popping = AtomicBool::new(false);

    let (popped, pop_calls) = crossbeam::thread::scope(|scope| {
        let pushers: Vec<_> = (0..threads)
            .map(|t| {
                scope.spawn(move |_| {
                    for i in 0..per_thread {
                        stack.push(t * per_thread + i);
                    }
                })
            })
            .collect();

        let poppers: Vec<_> = (0..threads)
            .map(|_| {
                let stop_popping = &stop_popping;
                scope.spawn(move |_| {
                    let mut popped = Vec::new();
                    let mut calls = 0u64;
                    while !stop_popping.load(Ordering::Relaxed) {
                        calls += 1;
                        if let Some(value) = stack.pop() {
                            popped.push(value);
                        }
                    }
                    (popped, calls)
                })
            })
            .collect();

        for pusher in pushers {
            pusher.join().unwrap();
        }
        stop_popping.store(true, Ordering::Relaxed);

        let mut popped = Vec::new();
        let mut calls = 0;
        for popper in poppers {
            let (values, n) = popper.join().unwrap();
            popped.extend(values);
            calls += n;
        }
        (popped, calls)
    })
    .unwrap();

    (popped, pop_calls)
}

fn check_conservation<S: ConcurrentStack<u64>>(stack: &S) {
    let threads = 4;
    let per_thread = 10_000;
    let (mut popped, pop_calls) = hammer(stack, threads, per_thread);

    assert_eq!(stack.counter(), threads * per_thread + pop_calls);

    while let Some(value) = stack.pop() {
        popped.push(value);
    }

    let unique: HashSet<_> = popped.iter().copied().collect();
    assert_eq!(unique.len(), popped.len(), "{} popped a value twice", stack.variant());
    assert_eq!(unique, (0..threads * per_thread).collect::<HashSet<_>>(), "{}", stack.variant());
}

#[test]
fn test_lock_free_conservation() {
    check_conservation(&LockFreeStack::new());
}

#[test]
fn test_lock_free_conservation_with_spin_backoff() {
    check_conservation(&LockFreeStack::with_backoff(BackoffPolicy::Spin));
}

#[test]
fn test_locked_conservation() {
    check_conservation(&LockedStack::new());
}

#[test]
fn test_counter_readable_while_running() {
    let stack = LockFreeStack::new();
    let done = AtomicBool::new(false);

    crossbeam::thread::scope(|scope| {
        for t in 0..2u64 {
            let stack = &stack;
            scope.spawn(move |_| {
                for i in 0..20_000 {
                    stack.push(t * 20_000 + i);
                    stack.pop();
                }
            });
        }

        let reader = scope.spawn(|_| {
            let mut last = 0;
            while !done.load(Ordering::Relaxed) {
                let now = stack.counter();
                assert!(now >= last, "counter went backwards");
                last = now;
            }
            last
        });

        // the scope joins the workers before returning; stop the reader once they are done
        scope.spawn(|_| {
            while stack.counter() < 80_000 {
                std::thread::yield_now();
            }
            done.store(true, Ordering::Relaxed);
        });

        assert!(reader.join().unwrap() <= 80_000);
    })
    .unwrap();

    assert_eq!(stack.counter(), 80_000);
    assert_eq!(stack.metrics().total_operations(), 80_000);
}

#[test]
fn test_liveness_under_load() {
    let config = DriverConfig {
        pushers: 4,
        poppers: 4,
        duration: Duration::from_millis(200),
        prefill: 10_000,
        backoff: BackoffPolicy::Snooze,
    };

    for variant in StackVariant::ALL {
        let report = run_variant(variant, &config).unwrap();
        assert!(report.counter > 10_000, "{} made no progress", variant);
        assert_eq!(report.workers.len(), 8);
        assert!(report.workers.iter().all(|w| w.calls > 0), "{} starved a worker", variant);

        let pushes: u64 = report
            .workers
            .iter()
            .filter(|w| w.name.starts_with("pusher"))
            .map(|w| w.calls)
            .sum();
        let pop_hits: u64 = report
            .workers
            .iter()
            .filter(|w| w.name.starts_with("popper"))
            .map(|w| w.calls - w.empty_pops)
            .sum();
        // nothing popped that was never pushed
        assert!(pop_hits <= 10_000 + pushes);
        assert_eq!(report.metrics.pops, pop_hits);
    }
}

#[test]
fn test_driver_against_shared_stack() {
    let stack = Arc::new(LockedStack::new());
    let config = DriverConfig {
        pushers: 1,
        poppers: 0,
        duration: Duration::from_millis(30),
        prefill: 0,
        backoff: BackoffPolicy::default(),
    };

    let report = run_throughput(Arc::clone(&stack), &config).unwrap();
    assert_eq!(stack.len() as u64, report.window_operations);
    assert_eq!(stack.counter(), report.counter);
    assert!(report
        .to_string()
        .ends_with("operations were performed in 0.030 seconds"));
}
